//! Configuration and data directory layout for qix.
//!
//! ## Data directory
//!
//! Everything qix persists lives under one directory, chosen by
//! `--dir` > `QIX_DIR` > `~/.qix`:
//!
//! ```text
//! <root>/
//!   projects/<name>.json   one document per project
//!   index.json             task index snapshot
//!   tracking.json          active session and session history
//!   backups/               reserved for backup tooling
//!   config.kdl             user preferences
//!   qix.log                default log file
//! ```
//!
//! ## config.kdl
//!
//! Written with defaults on first run. See [`schema`] for the keys and
//! [`resolver`] for how they combine with flags and environment variables.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, JIRA_BASE_URL_ENV, LOG_FILE_ENV, LOG_LEVEL_ENV, Resolved, ResolvedSettings,
    ValueSource, resolve_settings, resolve_settings_with_env,
};
#[cfg(unix)]
pub use schema::CONFIG_FILE_MODE;
pub use schema::{OutputFormat, QixConfig};

use kdl::KdlDocument;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Environment variable selecting the data directory.
pub const DATA_DIR_ENV: &str = "QIX_DIR";

/// Directory name used under the home directory when nothing else is set.
pub const DEFAULT_DIR_NAME: &str = ".qix";

/// Permissions for directories qix creates (Unix: owner only).
#[cfg(unix)]
pub const DATA_DIR_MODE: u32 = 0o700;

/// Every path qix reads or writes, derived from the data directory root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Pick the data directory: explicit path, then `QIX_DIR`, then `~/.qix`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(dir));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(Self::new(home.join(DEFAULT_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    pub fn project_file(&self, name: &str) -> PathBuf {
        self.projects_dir().join(format!("{}.json", name))
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join("index.json")
    }

    pub fn tracking_file(&self) -> PathBuf {
        self.root.join("tracking.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.kdl")
    }

    pub fn default_log_file(&self) -> PathBuf {
        self.root.join("qix.log")
    }

    /// Create the root, projects and backups directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.projects_dir(), self.backups_dir()] {
            create_private_dir(&dir).map_err(|source| Error::IoAt { path: dir, source })?;
        }
        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DATA_DIR_MODE);
    }
    builder.create(dir)
}

/// Read config.kdl. Returns `None` when the file does not exist.
pub fn read_config(path: &Path) -> Result<Option<QixConfig>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::IoAt {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let doc: KdlDocument = content
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {}: {}", path.display(), e)))?;
    let config = QixConfig::from_kdl(&doc);
    config
        .validate()
        .map_err(|e| Error::Config(format!("Invalid {}: {}", path.display(), e)))?;
    Ok(Some(config))
}

/// Write config.kdl, owner read/write only.
pub fn write_config(path: &Path, config: &QixConfig) -> Result<()> {
    let io_err = |source: io::Error| Error::IoAt {
        path: path.to_path_buf(),
        source,
    };
    fs::write(path, config.to_kdl().to_string()).map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(CONFIG_FILE_MODE)).map_err(io_err)?;
    }
    Ok(())
}

/// Read config.kdl, writing the defaults first if it does not exist yet.
pub fn load_or_init_config(paths: &DataPaths) -> Result<QixConfig> {
    let path = paths.config_file();
    if let Some(config) = read_config(&path)? {
        return Ok(config);
    }
    let config = QixConfig::initial(paths.default_log_file());
    write_config(&path, &config)?;
    tracing::debug!(path = %path.display(), "wrote default config");
    Ok(config)
}

/// Resolved configuration for one process run.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: DataPaths,
    pub file: QixConfig,
    pub settings: ResolvedSettings,
}

impl Config {
    /// Locate the data directory, create it if needed, and resolve settings.
    pub fn load(dir: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let paths = DataPaths::resolve(dir)?;
        paths.ensure_dirs()?;
        let file = load_or_init_config(&paths)?;
        let settings = resolve_settings(&paths, &file, overrides);
        Ok(Self {
            paths,
            file,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_paths_layout() {
        let paths = DataPaths::new("/data/qix");
        assert_eq!(paths.root(), Path::new("/data/qix"));
        assert_eq!(
            paths.project_file("demo"),
            PathBuf::from("/data/qix/projects/demo.json")
        );
        assert_eq!(paths.index_file(), PathBuf::from("/data/qix/index.json"));
        assert_eq!(paths.tracking_file(), PathBuf::from("/data/qix/tracking.json"));
        assert_eq!(paths.config_file(), PathBuf::from("/data/qix/config.kdl"));
        assert_eq!(paths.backups_dir(), PathBuf::from("/data/qix/backups"));
    }

    #[test]
    fn test_resolve_prefers_explicit_dir() {
        let paths = DataPaths::resolve(Some(Path::new("/explicit"))).unwrap();
        assert_eq!(paths.root(), Path::new("/explicit"));
    }

    #[test]
    #[serial]
    fn test_resolve_reads_env() {
        // SAFETY: serialized with every other env-mutating test.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/from/env");
        }
        let paths = DataPaths::resolve(None);
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
        assert_eq!(paths.unwrap().root(), Path::new("/from/env"));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp = TempDir::new().unwrap();
        let paths = DataPaths::new(temp.path().join("qix"));
        paths.ensure_dirs().unwrap();
        assert!(paths.projects_dir().is_dir());
        assert!(paths.backups_dir().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(paths.projects_dir()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, DATA_DIR_MODE);
        }

        // Idempotent.
        paths.ensure_dirs().unwrap();
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let paths = DataPaths::new(temp.path());
        assert!(!paths.config_file().exists());

        let config = load_or_init_config(&paths).unwrap();
        assert!(paths.config_file().exists());
        assert_eq!(config.output_format, Some(OutputFormat::Json));
        assert_eq!(config.log_file, Some(paths.default_log_file()));

        let reread = read_config(&paths.config_file()).unwrap().unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn test_existing_config_is_not_overwritten() {
        let temp = TempDir::new().unwrap();
        let paths = DataPaths::new(temp.path());
        fs::write(paths.config_file(), "output-format \"human\"\n").unwrap();

        let config = load_or_init_config(&paths).unwrap();
        assert_eq!(config.output_format, Some(OutputFormat::Human));
        assert_eq!(config.log_level, None);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.kdl");
        fs::write(&path, "log-level \"loud\"\n").unwrap();
        assert!(matches!(read_config(&path), Err(Error::Config(_))));

        fs::write(&path, "output-format {{{").unwrap();
        assert!(matches!(read_config(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_load_creates_layout() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let config = Config::load(
            Some(root.as_path()),
            &ConfigOverrides::new().with_output_format(OutputFormat::Human),
        )
        .unwrap();

        assert!(root.join("projects").is_dir());
        assert!(root.join("config.kdl").exists());
        assert_eq!(config.settings.output_format.value, OutputFormat::Human);
    }
}
