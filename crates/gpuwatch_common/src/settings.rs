//! Dashboard settings.
//!
//! Loaded from an optional TOML file; every field has a default so a
//! partial file (or none at all) is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::monitor::PollTiming;
use crate::session::{SshOptions, Strategy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between polls of a host
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait after a failed connect
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Deadline for one telemetry query
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// ssh ConnectTimeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Renderer cadence in milliseconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,

    /// Extra `-o` options passed to every ssh call
    #[serde(default)]
    pub ssh_options: Vec<String>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_retry_interval() -> u64 {
    5
}

fn default_query_timeout() -> u64 {
    8
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_refresh_interval() -> u64 {
    2000
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            retry_interval_secs: default_retry_interval(),
            query_timeout_secs: default_query_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            refresh_interval_ms: default_refresh_interval(),
            strategy: Strategy::default(),
            ssh_program: default_ssh_program(),
            ssh_options: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_toml(&text)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn timing(&self) -> PollTiming {
        let connect_timeout = Duration::from_secs(self.connect_timeout_secs.max(1));
        PollTiming {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            retry_interval: Duration::from_secs(self.retry_interval_secs.max(1)),
            query_timeout: Duration::from_secs(self.query_timeout_secs.max(1)),
            // A persistent open may take two ssh timeouts (handshake + auth).
            connect_timeout: connect_timeout * 2,
        }
    }

    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            program: self.ssh_program.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            extra_options: self.ssh_options.clone(),
            ..SshOptions::default()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_toml() {
        let settings = Settings::from_toml(
            r#"
strategy = "persistent"
poll_interval_secs = 10
ssh_options = ["StrictHostKeyChecking=accept-new"]
"#,
        )
        .unwrap();
        assert_eq!(settings.strategy, Strategy::Persistent);
        assert_eq!(settings.poll_interval_secs, 10);
        assert_eq!(settings.query_timeout_secs, 8);
        assert_eq!(settings.ssh_options().extra_options.len(), 1);
    }

    #[test]
    fn test_bad_toml_is_settings_error() {
        let err = Settings::from_toml("strategy = \"pooled\"").unwrap_err();
        assert!(matches!(err, ConfigError::Settings(_)));
    }

    #[test]
    fn test_timing_defaults() {
        let timing = Settings::default().timing();
        assert_eq!(timing.poll_interval, Duration::from_secs(5));
        assert_eq!(timing.retry_interval, Duration::from_secs(5));
        assert_eq!(timing.query_timeout, Duration::from_secs(8));
        assert_eq!(timing.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let settings = Settings::from_toml("poll_interval_secs = 0\nretry_interval_secs = 0\n").unwrap();
        let timing = settings.timing();
        assert_eq!(timing.poll_interval, Duration::from_secs(1));
        assert_eq!(timing.retry_interval, Duration::from_secs(1));
    }
}
