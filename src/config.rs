// Optional YAML configuration for the CLI

use crate::kv::{FileKv, KeyValueStore, SqliteKv};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "organizer";

/// Which key-value backend holds the slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One JSON file per slot
    #[default]
    File,
    /// `organizer.db` with one row per slot
    Sqlite,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::File => write!(f, "file"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where slots are stored; defaults to the platform data dir
    pub data_dir: Option<PathBuf>,
    pub backend: Backend,
    /// tracing filter directive, e.g. "info" or "organizer=debug"
    pub log_level: Option<String>,
}

impl Config {
    /// `~/.config/organizer/config.yaml` on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.yaml"))
    }

    /// Load from `path`, or from the default location when `None`
    ///
    /// A missing file yields the defaults; a file that exists but doesn't
    /// parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(p) => p,
            None => return Ok(Self::default()),
        };

        // Logging isn't set up yet; main reports the effective config instead
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read config {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Configured data dir, else the platform default
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .ok_or_else(|| eyre!("No platform data directory; set data_dir in the config"))
    }

    /// Open the configured backend
    pub fn open_backend(&self) -> Result<Box<dyn KeyValueStore>> {
        let dir = self.resolved_data_dir()?;
        let kv: Box<dyn KeyValueStore> = match self.backend {
            Backend::File => Box::new(FileKv::open(&dir)?),
            Backend::Sqlite => Box::new(SqliteKv::open(&dir)?),
        };
        Ok(kv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let yaml = "data_dir: /tmp/org\nbackend: sqlite\nlog_level: debug\n";
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/org")));
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_parse_partial_and_empty() {
        let config = Config::parse("backend: file\n").unwrap();
        assert_eq!(config, Config::default());

        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        assert!(Config::parse("colour: purple\n").is_err());
        assert!(Config::parse("backend: postgres\n").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(Some(temp.path().join("nope.yaml").as_path())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "backend: [not, a, backend").unwrap();

        assert!(Config::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::File.to_string(), "file");
        assert_eq!(Backend::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_open_backend_in_data_dir() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            data_dir: Some(temp.path().to_path_buf()),
            backend: Backend::Sqlite,
            log_level: None,
        };

        let mut kv = config.open_backend().unwrap();
        kv.set("tasks", "[]").unwrap();
        assert!(temp.path().join("organizer.db").exists());
    }
}
