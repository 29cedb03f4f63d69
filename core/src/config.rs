use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::consts;
use crate::error::{FreighterError, Result};

/// Freighter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreighterConfig {
    /// Freighter home directory (default `~/.freighter`)
    pub freighter_dir: PathBuf,

    /// Content store root (default `<freighter_dir>/store`)
    pub store_dir: PathBuf,

    /// Scratch directory for in-flight transfers
    pub temp_dir: PathBuf,

    /// Downgrade interim retry failures to warnings
    pub ignore_errors: bool,

    /// Attempts made by the retry orchestrator
    pub retries: u32,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for FreighterConfig {
    fn default() -> Self {
        let freighter_dir = default_freighter_dir();
        Self {
            store_dir: freighter_dir.join(consts::DEFAULT_STORE_NAME),
            temp_dir: std::env::temp_dir().join(consts::DEFAULT_FREIGHTER_TEMP_DIR_NAME),
            freighter_dir,
            ignore_errors: false,
            retries: consts::DEFAULT_RETRIES,
            log_level: LogLevel::Info,
        }
    }
}

impl FreighterConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// `FREIGHTER_STORE_DIR` wins over the store derived from `FREIGHTER_DIR`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(consts::ENV_FREIGHTER_DIR).filter(|v| !v.is_empty()) {
            config.freighter_dir = PathBuf::from(dir);
            config.store_dir = config.freighter_dir.join(consts::DEFAULT_STORE_NAME);
        }
        if let Some(dir) = lookup(consts::ENV_FREIGHTER_STORE_DIR).filter(|v| !v.is_empty()) {
            config.store_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(consts::ENV_FREIGHTER_TEMP_DIR).filter(|v| !v.is_empty()) {
            config.temp_dir = PathBuf::from(dir);
        }
        if lookup(consts::ENV_FREIGHTER_IGNORE_ERRORS).as_deref() == Some("true") {
            config.ignore_errors = true;
        }

        config
    }

    /// Point the configuration at a different freighter home.
    pub fn with_freighter_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.freighter_dir = dir.into();
        self.store_dir = self.freighter_dir.join(consts::DEFAULT_STORE_NAME);
        self
    }
}

fn default_freighter_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(consts::DEFAULT_FREIGHTER_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(consts::DEFAULT_FREIGHTER_DIR_NAME))
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = FreighterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(FreighterError::ConfigError(format!(
                "unknown log level: '{}' (supported: trace, debug, info, warn, error)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FreighterConfig::from_lookup(lookup(&[]));
        assert!(config.freighter_dir.ends_with(".freighter"));
        assert_eq!(config.store_dir, config.freighter_dir.join("store"));
        assert_eq!(config.retries, 3);
        assert!(!config.ignore_errors);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_freighter_dir_moves_store() {
        let config = FreighterConfig::from_lookup(lookup(&[("FREIGHTER_DIR", "/opt/fr")]));
        assert_eq!(config.freighter_dir, PathBuf::from("/opt/fr"));
        assert_eq!(config.store_dir, PathBuf::from("/opt/fr/store"));
    }

    #[test]
    fn test_store_dir_overrides_freighter_dir() {
        let config = FreighterConfig::from_lookup(lookup(&[
            ("FREIGHTER_DIR", "/opt/fr"),
            ("FREIGHTER_STORE_DIR", "/data/store"),
            ("FREIGHTER_TEMP_DIR", "/scratch"),
        ]));
        assert_eq!(config.store_dir, PathBuf::from("/data/store"));
        assert_eq!(config.temp_dir, PathBuf::from("/scratch"));
    }

    #[test]
    fn test_ignore_errors_only_on_true() {
        let on = FreighterConfig::from_lookup(lookup(&[("FREIGHTER_IGNORE_ERRORS", "true")]));
        assert!(on.ignore_errors);
        let off = FreighterConfig::from_lookup(lookup(&[("FREIGHTER_IGNORE_ERRORS", "yes")]));
        assert!(!off.ignore_errors);
    }

    #[test]
    fn test_with_freighter_dir() {
        let config = FreighterConfig::default().with_freighter_dir("/tmp/fr");
        assert_eq!(config.store_dir, PathBuf::from("/tmp/fr/store"));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}
