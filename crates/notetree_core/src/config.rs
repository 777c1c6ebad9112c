//! Engine configuration.
//!
//! # Responsibility
//! - Deserialize `EngineConfig` from a JSON file.
//! - Validate the log level and path constraints once, at load time.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - `log_dir` must be absolute; other relative paths resolve against the
//!   config file's directory.

use crate::logging::{self, normalize_level, LoggingError};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    InvalidLevel(String),
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::InvalidLevel(level) => write!(f, "unsupported log level `{level}`"),
            Self::RelativeLogDir(path) => {
                write!(f, "log_dir must be absolute, got `{}`", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub log_level: String,
    /// File logging is disabled when absent.
    pub log_dir: Option<PathBuf>,
    /// SQLite file; front ends fall back to an in-memory store when absent.
    pub database_path: Option<PathBuf>,
    pub expansion_state_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: logging::default_log_level().to_string(),
            log_dir: None,
            database_path: None,
            expansion_state_path: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a config from JSON text. Relative paths other
    /// than `log_dir` resolve against `base_dir`.
    pub fn from_json(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: EngineConfig = serde_json::from_str(text)?;
        config.log_level = normalize_level(&config.log_level)
            .map_err(|_| ConfigError::InvalidLevel(config.log_level.clone()))?
            .to_string();

        if let Some(log_dir) = &config.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(log_dir.clone()));
            }
        }
        config.database_path = config.database_path.map(|path| resolve(base_dir, path));
        config.expansion_state_path = config
            .expansion_state_path
            .map(|path| resolve(base_dir, path));
        Ok(config)
    }

    /// Starts file logging when `log_dir` is set. Returns whether logging
    /// is active afterwards.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        logging::init_logging(&self.log_level, &log_dir.to_string_lossy())?;
        Ok(true)
    }
}

/// Reads and validates the config file at `path`.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let config = EngineConfig::from_json(&text, base_dir)?;
    info!(
        "event=config_load module=config status=ok level={} has_db={} has_log_dir={}",
        config.log_level,
        config.database_path.is_some(),
        config.log_dir.is_some()
    );
    Ok(config)
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use std::path::{Path, PathBuf};

    #[test]
    fn empty_object_uses_defaults() {
        let config = EngineConfig::from_json("{}", Path::new("/etc/notetree")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let config = EngineConfig::from_json(
            r#"{ "log_level": "WARNING", "database_path": "tree.db" }"#,
            Path::new("/srv/notes"),
        )
        .unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.database_path, Some(PathBuf::from("/srv/notes/tree.db")));
    }

    #[test]
    fn rejects_bad_level_relative_log_dir_and_unknown_keys() {
        let base = Path::new("/srv");
        assert!(matches!(
            EngineConfig::from_json(r#"{ "log_level": "chatty" }"#, base),
            Err(ConfigError::InvalidLevel(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "log_dir": "logs" }"#, base),
            Err(ConfigError::RelativeLogDir(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "colour": "red" }"#, base),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn logging_stays_off_without_log_dir() {
        assert!(!EngineConfig::default().init_logging().unwrap());
    }
}
