//! Precedence resolution for settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`QIX_LOG_LEVEL`, `QIX_LOG_FILE`, `JIRA_BASE_URL`)
//! 3. config.kdl in the data directory
//! 4. Built-in defaults

use std::path::PathBuf;

use crate::config::schema::{DEFAULT_DATE_FORMAT, DEFAULT_LOG_LEVEL, OutputFormat, QixConfig};
use crate::config::DataPaths;
use crate::models::Priority;

/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "QIX_LOG_LEVEL";

/// Environment variable overriding the log file.
pub const LOG_FILE_ENV: &str = "QIX_LOG_FILE";

/// Environment variable overriding the Jira base URL.
pub const JIRA_BASE_URL_ENV: &str = "JIRA_BASE_URL";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    ConfigFile,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI-level overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_format: Option<OutputFormat>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }
}

/// Fully resolved settings with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub output_format: Resolved<OutputFormat>,
    pub date_format: Resolved<String>,
    pub log_level: Resolved<String>,
    pub log_file: Resolved<PathBuf>,
    pub jira_base_url: Option<Resolved<String>>,
    pub default_priority: Resolved<Priority>,
}

impl ResolvedSettings {
    /// Render a Jira issue as a link when a base URL is configured.
    pub fn jira_link(&self, issue: &str) -> Option<String> {
        self.jira_base_url
            .as_ref()
            .map(|base| format!("{}/browse/{}", base.value, issue))
    }
}

/// Resolve settings using the process environment.
pub fn resolve_settings(
    paths: &DataPaths,
    file: &QixConfig,
    overrides: &ConfigOverrides,
) -> ResolvedSettings {
    resolve_settings_with_env(paths, file, overrides, |name| {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    })
}

/// Resolve settings with an explicit environment lookup.
pub fn resolve_settings_with_env<F>(
    paths: &DataPaths,
    file: &QixConfig,
    overrides: &ConfigOverrides,
    env: F,
) -> ResolvedSettings
where
    F: Fn(&str) -> Option<String>,
{
    let output_format = if let Some(format) = overrides.output_format {
        Resolved::new(format, ValueSource::CliFlag)
    } else if let Some(format) = file.output_format {
        Resolved::new(format, ValueSource::ConfigFile)
    } else {
        Resolved::new(OutputFormat::default(), ValueSource::Default)
    };

    let date_format = match file.date_format {
        Some(ref format) => Resolved::new(format.clone(), ValueSource::ConfigFile),
        None => Resolved::new(DEFAULT_DATE_FORMAT.to_string(), ValueSource::Default),
    };

    let log_level = if let Some(ref level) = overrides.log_level {
        Resolved::new(level.to_lowercase(), ValueSource::CliFlag)
    } else if let Some(level) = env(LOG_LEVEL_ENV) {
        Resolved::new(
            level.to_lowercase(),
            ValueSource::EnvVar(LOG_LEVEL_ENV.to_string()),
        )
    } else if let Some(ref level) = file.log_level {
        Resolved::new(level.clone(), ValueSource::ConfigFile)
    } else {
        Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default)
    };

    let log_file = if let Some(path) = env(LOG_FILE_ENV) {
        Resolved::new(
            PathBuf::from(path),
            ValueSource::EnvVar(LOG_FILE_ENV.to_string()),
        )
    } else if let Some(ref path) = file.log_file {
        Resolved::new(path.clone(), ValueSource::ConfigFile)
    } else {
        Resolved::new(paths.default_log_file(), ValueSource::Default)
    };

    let jira_base_url = if let Some(url) = env(JIRA_BASE_URL_ENV) {
        Some(Resolved::new(
            url.trim_end_matches('/').to_string(),
            ValueSource::EnvVar(JIRA_BASE_URL_ENV.to_string()),
        ))
    } else {
        file.jira_base_url
            .as_ref()
            .map(|url| Resolved::new(url.clone(), ValueSource::ConfigFile))
    };

    let default_priority = match file.default_priority {
        Some(priority) => Resolved::new(priority, ValueSource::ConfigFile),
        None => Resolved::new(Priority::default(), ValueSource::Default),
    };

    ResolvedSettings {
        output_format,
        date_format,
        log_level,
        log_file,
        jira_base_url,
        default_priority,
    }
}
