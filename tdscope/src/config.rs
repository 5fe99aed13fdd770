//! Workflow configuration.
//!
//! The visualization workflow reads one channel of one file. Which file,
//! channel and how much of it is described by a [`WorkflowConfig`] passed
//! in by the caller, loaded from JSON or assembled from CLI flags.
//!
//! # Example
//!
//! ```json
//! {
//!   "file_path": "LogFile_2025-11-21-17-30-18.tdms",
//!   "group_name": "Log",
//!   "channel_name": "Dev1/ai0",
//!   "window_duration_seconds": 3.0,
//!   "fallback_rate_hz": null
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::window::{SampleRatePolicy, SamplingWindow};

/// Default group name for NI DAQ log files.
pub const DEFAULT_GROUP: &str = "Log";

/// Default channel name for NI DAQ log files.
pub const DEFAULT_CHANNEL: &str = "Dev1/ai0";

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECONDS: f64 = 3.0;

/// Configuration for the visualization workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Path of the measurement file.
    pub file_path: PathBuf,

    /// Group containing the channel.
    #[serde(default = "default_group")]
    pub group_name: String,

    /// Channel to read.
    #[serde(default = "default_channel")]
    pub channel_name: String,

    /// Seconds to read from the start of the channel.
    ///
    /// `None` reads the entire channel.
    #[serde(default = "default_window")]
    pub window_duration_seconds: Option<f64>,

    /// Sampling rate to assume when the channel has no increment property.
    ///
    /// `None` makes a missing increment an error.
    #[serde(default)]
    pub fallback_rate_hz: Option<f64>,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

#[allow(clippy::unnecessary_wraps)] // serde default must match the field type
fn default_window() -> Option<f64> {
    Some(DEFAULT_WINDOW_SECONDS)
}

impl WorkflowConfig {
    /// Creates a configuration with default group, channel and window.
    pub fn new<P: Into<PathBuf>>(file_path: P) -> Self {
        Self {
            file_path: file_path.into(),
            group_name: default_group(),
            channel_name: default_channel(),
            window_duration_seconds: default_window(),
            fallback_rate_hz: None,
        }
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a name is empty, the window
    /// duration is negative or non-finite, or the fallback rate is not
    /// positive and finite.
    pub fn validate(&self) -> Result<()> {
        if self.file_path.as_os_str().is_empty() {
            return Err(invalid("file_path must not be empty"));
        }
        if self.group_name.is_empty() {
            return Err(invalid("group_name must not be empty"));
        }
        if self.channel_name.is_empty() {
            return Err(invalid("channel_name must not be empty"));
        }
        if let Some(seconds) = self.window_duration_seconds
            && (!seconds.is_finite() || seconds < 0.0)
        {
            return Err(invalid(format!(
                "window_duration_seconds must be non-negative and finite, found {seconds}"
            )));
        }
        if let Some(rate) = self.fallback_rate_hz
            && (!rate.is_finite() || rate <= 0.0)
        {
            return Err(invalid(format!(
                "fallback_rate_hz must be positive and finite, found {rate}"
            )));
        }
        Ok(())
    }

    /// The sampling-rate policy this configuration selects.
    pub fn rate_policy(&self) -> SampleRatePolicy {
        SampleRatePolicy::from_fallback(self.fallback_rate_hz)
    }

    /// The read window this configuration selects.
    pub fn window(&self) -> SamplingWindow {
        SamplingWindow::from_duration(self.window_duration_seconds, self.rate_policy())
    }
}

fn invalid(reason: impl Into<String>) -> crate::ScopeError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopeError;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::new("log.tdms");
        assert_eq!(config.group_name, "Log");
        assert_eq!(config.channel_name, "Dev1/ai0");
        assert_eq!(config.window_duration_seconds, Some(3.0));
        assert_eq!(config.fallback_rate_hz, None);
        assert_eq!(config.rate_policy(), SampleRatePolicy::Strict);
        config.validate().unwrap();
    }

    #[test]
    fn test_json_defaults_and_explicit_null() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{ "file_path": "a.tdms" }"#).unwrap();
        let config = WorkflowConfig::from_json_file(&path).unwrap();
        assert_eq!(config, WorkflowConfig::new("a.tdms"));

        std::fs::write(
            &path,
            r#"{ "file_path": "a.tdms", "channel_name": "Dev1/ai1",
                 "window_duration_seconds": null, "fallback_rate_hz": 1000000.0 }"#,
        )
        .unwrap();
        let config = WorkflowConfig::from_json_file(&path).unwrap();
        assert_eq!(config.channel_name, "Dev1/ai1");
        assert_eq!(config.window_duration_seconds, None);
        assert_eq!(config.window(), SamplingWindow::entire().with_fallback_rate(1_000_000.0));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = WorkflowConfig::new("a.tdms");
        config.window_duration_seconds = Some(-1.0);
        assert!(matches!(
            config.validate().unwrap_err(),
            ScopeError::Config(ConfigError::Invalid { .. })
        ));

        let mut config = WorkflowConfig::new("a.tdms");
        config.fallback_rate_hz = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = WorkflowConfig::new("a.tdms");
        config.channel_name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_and_parse_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            WorkflowConfig::from_json_file(&missing).unwrap_err(),
            ScopeError::Config(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            WorkflowConfig::from_json_file(&broken).unwrap_err(),
            ScopeError::Config(ConfigError::Parse { .. })
        ));
    }
}
