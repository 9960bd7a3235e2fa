//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `linescript.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use linescript_domain::channel::{ChannelConfig, DEFAULT_BAUD_RATE};
use linescript_domain::id::ChannelId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Channel registry.
    pub channels: ChannelsConfig,
    /// Script execution settings.
    pub automation: AutomationConfig,
    /// Live stream settings.
    pub stream: StreamConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Channels known to the transport.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Device paths; the id of each channel is the last path segment.
    pub paths: Vec<String>,
    /// Baud rate used when automation has to open a channel itself.
    pub default_baud: u32,
}

/// Automation settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Wall-clock budget of one script run, in milliseconds.
    pub timeout_ms: u64,
    /// Number of log entries kept for late observers.
    pub log_capacity: usize,
}

/// Server-Sent-Events settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Interval between keep-alive comments, in milliseconds.
    pub heartbeat_ms: u64,
}

impl Config {
    /// Load configuration from `linescript.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("linescript.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("LINESCRIPT_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("LINESCRIPT_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("LINESCRIPT_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = var("LINESCRIPT_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("LINESCRIPT_CHANNELS") {
            self.channels.paths = val
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(baud) = var("LINESCRIPT_DEFAULT_BAUD").and_then(|val| val.parse().ok()) {
            self.channels.default_baud = baud;
        }
        if let Some(ms) = var("LINESCRIPT_SCRIPT_TIMEOUT_MS").and_then(|val| val.parse().ok()) {
            self.automation.timeout_ms = ms;
        }
        if let Some(ms) = var("LINESCRIPT_SSE_HEARTBEAT_MS").and_then(|val| val.parse().ok()) {
            self.stream.heartbeat_ms = ms;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.automation.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "script timeout must be non-zero".to_string(),
            ));
        }
        if self.automation.log_capacity == 0 {
            return Err(ConfigError::Validation(
                "log capacity must be non-zero".to_string(),
            ));
        }
        if self.stream.heartbeat_ms == 0 {
            return Err(ConfigError::Validation(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }
        if self.channels.paths.is_empty() {
            return Err(ConfigError::Validation(
                "at least one channel path is required".to_string(),
            ));
        }
        for path in &self.channels.paths {
            ChannelId::from_path(path).map_err(|err| {
                ConfigError::Validation(format!("channel path {path:?}: {err}"))
            })?;
        }
        self.channel_config()
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Line settings used when automation opens a channel.
    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::with_baud_rate(self.channels.default_baud)
    }

    #[must_use]
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.automation.timeout_ms)
    }

    #[must_use]
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.stream.heartbeat_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "linescriptd=info,linescript=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            paths: vec!["/dev/rs485-1".to_string(), "/dev/rs485-2".to_string()],
            default_baud: DEFAULT_BAUD_RATE,
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            log_capacity: 200,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: 15_000,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn with_env(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, val)| ((*key).to_string(), (*val).to_string()))
            .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).cloned());
        config
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.channels.paths, ["/dev/rs485-1", "/dev/rs485-2"]);
        assert_eq!(config.channels.default_baud, 9600);
        assert_eq!(config.script_timeout(), Duration::from_secs(1));
        assert_eq!(config.automation.log_capacity, 200);
        assert_eq!(config.heartbeat(), Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [logging]
            filter = 'debug'

            [channels]
            paths = ['/dev/ttyUSB0']
            default_baud = 115200

            [automation]
            timeout_ms = 250
            log_capacity = 50

            [stream]
            heartbeat_ms = 5000
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.channels.paths, ["/dev/ttyUSB0"]);
        assert_eq!(config.channel_config().baud_rate, 115_200);
        assert_eq!(config.script_timeout(), Duration::from_millis(250));
        assert_eq!(config.automation.log_capacity, 50);
        assert_eq!(config.heartbeat(), Duration::from_secs(5));
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [automation]
            timeout_ms = 500
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.automation.timeout_ms, 500);
        assert_eq!(config.automation.log_capacity, 200);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_override_bind_address_when_env_set() {
        let config = with_env(&[("LINESCRIPT_BIND", "127.0.0.1:8080")]);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn should_prefer_rust_log_when_both_filters_set() {
        let config = with_env(&[("LINESCRIPT_LOG", "warn"), ("RUST_LOG", "trace")]);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_split_channel_list_when_env_set() {
        let config = with_env(&[("LINESCRIPT_CHANNELS", "/dev/a, /dev/b,,")]);
        assert_eq!(config.channels.paths, ["/dev/a", "/dev/b"]);
    }

    #[test]
    fn should_ignore_unparsable_numbers_when_env_set() {
        let config = with_env(&[
            ("LINESCRIPT_PORT", "not-a-port"),
            ("LINESCRIPT_SCRIPT_TIMEOUT_MS", "250"),
            ("LINESCRIPT_SSE_HEARTBEAT_MS", "x"),
            ("LINESCRIPT_DEFAULT_BAUD", "19200"),
        ]);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.automation.timeout_ms, 250);
        assert_eq!(config.stream.heartbeat_ms, 15_000);
        assert_eq!(config.channels.default_baud, 19_200);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_timeout_and_capacity() {
        let mut config = Config::default();
        config.automation.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.automation.log_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_empty_channel_list() {
        let mut config = Config::default();
        config.channels.paths.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_path_without_usable_id() {
        let mut config = Config::default();
        config.channels.paths = vec!["/dev/".to_string()];
        assert!(config.validate().is_err());
    }
}
