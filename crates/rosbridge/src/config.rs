// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection configuration.
//!
//! Supports both programmatic and file-based configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default bridge hostname.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Default rosbridge server port.
pub const DEFAULT_PORT: u16 = 9090;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Websocket scheme used to reach the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ws" => Ok(Scheme::Ws),
            "wss" => Ok(Scheme::Wss),
            other => Err(ConfigError::Invalid(format!("unknown scheme '{}'", other))),
        }
    }
}

/// Bridge connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosConfig {
    /// Bridge hostname.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bridge port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// `ws` or `wss`.
    #[serde(default)]
    pub scheme: Scheme,

    /// How long `connect` waits for the websocket session (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Partial fragment assemblies older than this are purged (milliseconds).
    #[serde(default = "default_fragment_timeout_ms")]
    pub fragment_timeout_ms: u64,

    /// Upper bound on a reassembled fragmented message (bytes).
    #[serde(default = "default_max_fragment_bytes")]
    pub max_fragment_bytes: usize,
}

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_fragment_timeout_ms() -> u64 {
    10_000
}

fn default_max_fragment_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for RosConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            scheme: Scheme::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            fragment_timeout_ms: default_fragment_timeout_ms(),
            max_fragment_bytes: default_max_fragment_bytes(),
        }
    }
}

impl RosConfig {
    /// Configuration for `ws://hostname:port` with default timeouts.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the scheme.
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the fragment reassembly timeout.
    pub fn fragment_timeout(mut self, timeout: Duration) -> Self {
        self.fragment_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the reassembled message size limit.
    pub fn max_fragment_bytes(mut self, limit: usize) -> Self {
        self.max_fragment_bytes = limit;
        self
    }

    /// `scheme://hostname:port`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.hostname, self.port)
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn fragment_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.fragment_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid("hostname is empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be non-zero".into(),
            ));
        }
        if self.max_fragment_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_fragment_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_url() {
        let config = RosConfig::default();
        assert_eq!(config.url(), "ws://localhost:9090");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RosConfig::new("robot.local", 9091)
            .scheme(Scheme::Wss)
            .connect_timeout(Duration::from_secs(2));
        assert_eq!(config.url(), "wss://robot.local:9091");
        assert_eq!(config.connect_timeout_ms, 2000);
    }

    #[test]
    fn test_validation() {
        let mut config = RosConfig::new("", 9090);
        assert!(config.validate().is_err());

        config.hostname = "localhost".into();
        config.port = 0;
        assert!(config.validate().is_err());

        config.port = 9090;
        config.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.connect_timeout_ms = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("WSS".parse::<Scheme>().expect("parse"), Scheme::Wss);
        assert!("http".parse::<Scheme>().is_err());
    }

    #[test]
    fn test_from_file_defaults_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "hostname = \"10.0.0.5\"\nscheme = \"wss\"").expect("write");

        let config = RosConfig::from_file(file.path()).expect("load");
        assert_eq!(config.hostname, "10.0.0.5");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.scheme, Scheme::Wss);
        assert_eq!(config.connect_timeout_ms, 5_000);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "port = 0").expect("write");
        assert!(matches!(
            RosConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string_pretty(&RosConfig::default()).expect("serialize");
        assert!(toml_str.contains("port = 9090"));
        assert!(toml_str.contains("scheme = \"ws\""));
    }
}
