//! Environment-driven runtime configuration.
//!
//! # Variables
//! - `STOCKFLOW_DB_PATH`: stock database file (required).
//! - `STOCKFLOW_LOG_LEVEL`: `trace|debug|info|warn|error`; defaults to
//!   `default_log_level()`.
//! - `STOCKFLOW_LOG_DIR`: absolute log directory; logging stays off when
//!   unset.

use crate::logging::{default_log_level, init_logging, LoggingError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "STOCKFLOW_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "STOCKFLOW_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "STOCKFLOW_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(var) => write!(f, "{var} is required"),
            Self::Invalid { var, message } => write!(f, "{var} is invalid: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let db_path = read(DB_PATH_VAR)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(DB_PATH_VAR))?;
        let log_level = read(LOG_LEVEL_VAR)
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_else(|| default_log_level().to_string());
        let log_dir = match read(LOG_DIR_VAR) {
            Some(value) => {
                let path = PathBuf::from(value.trim());
                if !path.is_absolute() {
                    return Err(ConfigError::Invalid {
                        var: LOG_DIR_VAR,
                        message: format!("`{}` is not an absolute path", path.display()),
                    });
                }
                Some(path)
            }
            None => None,
        };

        Ok(Self {
            db_path,
            log_level,
            log_dir,
        })
    }

    /// Starts rolling-file logging when a log directory is configured.
    ///
    /// Returns `Ok(false)` when logging is disabled.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        let Some(log_dir) = self.log_dir.as_ref() else {
            return Ok(false);
        };
        init_logging(&self.log_level, &log_dir.to_string_lossy())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DB_PATH_VAR, LOG_DIR_VAR, LOG_LEVEL_VAR};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |var| values.get(var).cloned()
    }

    #[test]
    fn db_path_is_required() {
        let err = CoreConfig::from_lookup(lookup_from(&[(DB_PATH_VAR, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(DB_PATH_VAR));
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_unset() {
        let config = CoreConfig::from_lookup(lookup_from(&[(DB_PATH_VAR, "stock.db")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("stock.db"));
        assert!(!config.log_level.is_empty());
        assert_eq!(config.log_dir, None);
        assert_eq!(config.init_logging(), Ok(false));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let err = CoreConfig::from_lookup(lookup_from(&[
            (DB_PATH_VAR, "stock.db"),
            (LOG_LEVEL_VAR, "WARN"),
            (LOG_DIR_VAR, "logs"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == LOG_DIR_VAR));
    }
}
