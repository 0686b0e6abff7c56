//! Monitor configuration
//!
//! Where the data lives in the backend, how timestamps are ordered, and the
//! offset used for display times. Every field has a default matching the
//! layout the heart-rate device writes, so an empty JSON object is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendError, DbPath};
use crate::types::heartrate::TimestampOrdering;

/// Error types for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the heart-rate monitor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Root of the per-user logs: `{history_root}/{user}/{timestamp}`
    pub history_root: String,

    /// Root of the user profiles: `{users_root}/{user}`
    pub users_root: String,

    /// Global date half of the last-send marker
    pub date_path: String,

    /// Global time half of the last-send marker
    pub time_path: String,

    /// How entry timestamps are compared
    pub timestamp_ordering: TimestampOrdering,

    /// UTC offset for rendering epoch times (minutes east of UTC)
    pub display_utc_offset_minutes: i32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_root: "heart_rate_history".to_string(),
            users_root: "users".to_string(),
            date_path: "date".to_string(),
            time_path: "time".to_string(),
            timestamp_ordering: TimestampOrdering::Lexicographic,
            // Asia/Makassar
            display_utc_offset_minutes: 8 * 60,
        }
    }
}

impl MonitorConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that every configured location is a usable backend path
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("history_root", &self.history_root),
            ("users_root", &self.users_root),
            ("date_path", &self.date_path),
            ("time_path", &self.time_path),
        ] {
            let path = DbPath::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))?;
            if path.is_root() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }
        // chrono accepts strictly less than one day
        if self.display_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(format!(
                "display_utc_offset_minutes out of range: {}",
                self.display_utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// `{history_root}/{user_id}`
    pub fn history_path(&self, user_id: &str) -> Result<DbPath, BackendError> {
        DbPath::parse(&self.history_root)?.child(user_id)
    }

    /// `{history_root}/{user_id}/{timestamp}`
    pub fn history_entry_path(&self, user_id: &str, timestamp: &str) -> Result<DbPath, BackendError> {
        self.history_path(user_id)?.child(timestamp)
    }

    /// `{users_root}/{user_id}`
    pub fn profile_path(&self, user_id: &str) -> Result<DbPath, BackendError> {
        DbPath::parse(&self.users_root)?.child(user_id)
    }

    pub fn date_marker_path(&self) -> Result<DbPath, BackendError> {
        DbPath::parse(&self.date_path)
    }

    pub fn time_marker_path(&self) -> Result<DbPath, BackendError> {
        DbPath::parse(&self.time_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_device_layout() {
        let config = MonitorConfig::default();
        assert_eq!(
            config.history_entry_path("u1", "001").unwrap().to_string(),
            "heart_rate_history/u1/001"
        );
        assert_eq!(config.profile_path("u1").unwrap().to_string(), "users/u1");
        assert_eq!(config.date_marker_path().unwrap().to_string(), "date");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config =
            MonitorConfig::from_json_str(r#"{"timestamp_ordering": "numeric"}"#).unwrap();
        assert_eq!(config.timestamp_ordering, TimestampOrdering::Numeric);
        assert_eq!(config.history_root, "heart_rate_history");
        assert_eq!(config.display_utc_offset_minutes, 480);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            MonitorConfig::from_json_str(r#"{"date_path": ""}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MonitorConfig::from_json_str(r#"{"users_root": "a.b"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MonitorConfig::from_json_str(r#"{"display_utc_offset_minutes": 1440}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MonitorConfig::from_json_str("not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"history_root": "devices/ring/history"}}"#).unwrap();

        let config = MonitorConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.history_path("u1").unwrap().to_string(),
            "devices/ring/history/u1"
        );
    }

    #[test]
    fn test_user_id_must_be_a_valid_segment() {
        let config = MonitorConfig::default();
        assert!(config.history_path("").is_err());
        assert!(config.history_entry_path("u1", "").is_err());
    }
}
