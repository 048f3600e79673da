//! Configuration settings structures
//!
//! This module defines the configuration structures used by the messenger
//! server, serialized to/from TOML format for configuration files.

use serde::{Deserialize, Serialize};

/// Default for `listen_addr`
fn default_listen_addr() -> String {
    "127.0.0.1:7313".to_string()
}

/// Default for `request_timeout_ms`
fn default_request_timeout_ms() -> u64 {
    5000
}

/// Main configuration structure
///
/// This is the root configuration object that contains all server settings.
/// It can be serialized to/from TOML format for configuration files.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Server-specific settings
    pub server: ServerSettings,
    /// Optional logging configuration
    pub logging: Option<LoggingSettings>,
}

/// Server configuration settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerSettings {
    /// Network address to bind the server to
    ///
    /// Format: "IP:PORT" (e.g., "127.0.0.1:7313" for localhost,
    /// "0.0.0.0:7313" for all interfaces)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Default timeout for outbound requests, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Shared secret required from callers
    ///
    /// When set, every inbound request must carry this value as its
    /// "token" parameter or it is rejected as unauthenticated.
    #[serde(default)]
    pub shared_secret: Option<String>,
}

/// Logging system configuration
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoggingSettings {
    /// Logging level filter
    ///
    /// Valid values: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Enable JSON-formatted log output
    ///
    /// When true, logs are output in structured JSON format,
    /// useful for log aggregation systems.
    #[serde(default)]
    pub json_format: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                listen_addr: default_listen_addr(),
                request_timeout_ms: default_request_timeout_ms(),
                shared_secret: None,
            },
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:7313");
        assert_eq!(config.server.request_timeout_ms, 5000);
        assert!(config.server.shared_secret.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let encoded = toml::to_string_pretty(&config).unwrap();
        let decoded: Config = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.server.listen_addr, config.server.listen_addr);
        assert_eq!(
            decoded.server.request_timeout_ms,
            config.server.request_timeout_ms
        );
    }

    #[test]
    fn test_partial_config_gets_defaults() {
        let decoded: Config = toml::from_str("[server]\nlisten_addr = \"0.0.0.0:9000\"\n").unwrap();
        assert_eq!(decoded.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(decoded.server.request_timeout_ms, 5000);
        assert!(decoded.logging.is_none());
    }
}
