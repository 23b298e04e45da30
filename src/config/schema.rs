//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The Rust struct representing config.kdl
//! - Conversion to and from a KDL document
//! - Validation and merging
//!
//! # KDL Schema
//!
//! ```kdl
//! output-format "human"  // or "json"
//! date-format "%Y-%m-%d"
//! log-level "info"
//! log-file "/home/me/.qix/qix.log"
//! jira-base-url "https://example.atlassian.net"
//! default-priority "medium"
//! ```

use chrono::format::{Item, StrftimeItems};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::Priority;

/// Required permissions for config.kdl (Unix: owner read/write only).
#[cfg(unix)]
pub const CONFIG_FILE_MODE: u32 = 0o600;

/// Default date format for human output.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences stored in config.kdl. Unset keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QixConfig {
    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// strftime pattern used to render dates in human output
    pub date_format: Option<String>,

    /// Log filter level (trace, debug, info, warn, error)
    pub log_level: Option<String>,

    /// Log file location
    pub log_file: Option<PathBuf>,

    /// Base URL used to render Jira issue links
    pub jira_base_url: Option<String>,

    /// Priority given to new tasks when none is specified
    pub default_priority: Option<Priority>,
}

impl QixConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The config written on first run.
    pub fn initial(log_file: PathBuf) -> Self {
        Self {
            output_format: Some(OutputFormat::Json),
            date_format: Some(DEFAULT_DATE_FORMAT.to_string()),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            log_file: Some(log_file),
            jira_base_url: None,
            default_priority: Some(Priority::Medium),
        }
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref level) = self.log_level {
            if !is_valid_log_level(level) {
                return Err(format!(
                    "log-level must be one of {}, got {}",
                    LOG_LEVELS.join(", "),
                    level
                ));
            }
        }
        if let Some(ref format) = self.date_format {
            if format.trim().is_empty() {
                return Err("date-format must not be empty".to_string());
            }
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(format!("date-format is not a valid strftime pattern: {}", format));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown or malformed values are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(s) = first_string(doc, "output-format") {
            config.output_format = OutputFormat::parse(s);
        }

        if let Some(s) = first_string(doc, "date-format") {
            config.date_format = Some(s.to_string());
        }

        if let Some(s) = first_string(doc, "log-level") {
            config.log_level = Some(s.to_lowercase());
        }

        if let Some(s) = first_string(doc, "log-file") {
            config.log_file = Some(PathBuf::from(s));
        }

        if let Some(s) = first_string(doc, "jira-base-url") {
            config.jira_base_url = Some(s.trim_end_matches('/').to_string());
        }

        if let Some(s) = first_string(doc, "default-priority") {
            config.default_priority = Priority::parse(s);
        }

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref format) = self.output_format {
            push_string(&mut doc, "output-format", format.as_str());
        }
        if let Some(ref format) = self.date_format {
            push_string(&mut doc, "date-format", format);
        }
        if let Some(ref level) = self.log_level {
            push_string(&mut doc, "log-level", level);
        }
        if let Some(ref path) = self.log_file {
            push_string(&mut doc, "log-file", &path.to_string_lossy());
        }
        if let Some(ref url) = self.jira_base_url {
            push_string(&mut doc, "jira-base-url", url);
        }
        if let Some(priority) = self.default_priority {
            push_string(&mut doc, "default-priority", priority.as_str());
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &QixConfig) {
        if other.output_format.is_some() {
            self.output_format = other.output_format;
        }
        if other.date_format.is_some() {
            self.date_format = other.date_format.clone();
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level.clone();
        }
        if other.log_file.is_some() {
            self.log_file = other.log_file.clone();
        }
        if other.jira_base_url.is_some() {
            self.jira_base_url = other.jira_base_url.clone();
        }
        if other.default_priority.is_some() {
            self.default_priority = other.default_priority;
        }
    }
}

/// Whether `level` is a recognised log level name.
pub fn is_valid_log_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_lowercase().as_str())
}

fn first_string<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a str> {
    doc.get(name)?.entries().first()?.value().as_string()
}

fn push_string(doc: &mut KdlDocument, name: &str, value: &str) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    doc.nodes_mut().push(node);
}
