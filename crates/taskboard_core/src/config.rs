//! Board settings file.
//!
//! # Responsibility
//! - Load `taskboard.json`-style settings with per-field defaults.
//! - Validate values before they reach the sweep, resolver or logger.
//!
//! # Invariants
//! - A missing file yields defaults; an unreadable or malformed one is an error.
//! - `log_dir`, when set, must be absolute.

use crate::dnd::resolver::DEFAULT_TASK_END_OFFSET_PX;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardConfig {
    pub retention_hours: u32,
    pub sweep_interval_minutes: u32,
    pub task_end_offset_px: f64,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            sweep_interval_minutes: 60,
            task_end_offset_px: DEFAULT_TASK_END_OFFSET_PX,
            log_level: None,
            log_dir: None,
            database_path: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_json::Error),
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read settings file: {err}"),
            Self::Parse(err) => write!(f, "failed to parse settings: {err}"),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid setting `{field}`: {message}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Read(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl BoardConfig {
    /// Reads settings from `path`, or defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_hours == 0 {
            return Err(invalid("retentionHours", "must be greater than zero"));
        }
        if self.sweep_interval_minutes == 0 {
            return Err(invalid("sweepIntervalMinutes", "must be greater than zero"));
        }
        if !self.task_end_offset_px.is_finite() || self.task_end_offset_px < 0.0 {
            return Err(invalid("taskEndOffsetPx", "must be a finite, non-negative number"));
        }
        if let Some(level) = self.log_level.as_deref() {
            if !matches!(level, "trace" | "debug" | "info" | "warn" | "error") {
                return Err(invalid(
                    "logLevel",
                    "must be one of trace, debug, info, warn, error",
                ));
            }
        }
        if let Some(dir) = self.log_dir.as_deref() {
            if !dir.is_absolute() {
                return Err(invalid("logDir", "must be an absolute path"));
            }
        }
        Ok(())
    }

    pub fn retention_ms(&self) -> i64 {
        i64::from(self.retention_hours) * HOUR_MS
    }

    pub fn sweep_interval_ms(&self) -> i64 {
        i64::from(self.sweep_interval_minutes) * MINUTE_MS
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config = BoardConfig::from_json(r#"{ "retentionHours": 48 }"#).unwrap();
        assert_eq!(config.retention_hours, 48);
        assert_eq!(config.sweep_interval_minutes, 60);
        assert_eq!(config.retention_ms(), 48 * HOUR_MS);
    }

    #[test]
    fn zero_retention_is_rejected() {
        let err = BoardConfig::from_json(r#"{ "retentionHours": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "retentionHours",
                ..
            }
        ));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(BoardConfig::from_json(r#"{ "logLevel": "loud" }"#).is_err());
    }
}
