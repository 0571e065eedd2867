//! Server configuration.
//!
//! Configuration is layered from:
//! - Built-in defaults (port 3000)
//! - A TOML configuration file, if one exists
//! - Environment variables (`HUDDLE_*`, plus `WS_PORT` for the port)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Paths searched by [`Config::load`], first match wins.
const CONFIG_PATHS: [&str; 3] = [
    "huddle.toml",
    "/etc/huddle/huddle.toml",
    "~/.config/huddle/huddle.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for the WebSocket endpoint on the HTTP router.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Also accept bare WebSocket connections on this port.
    #[serde(default)]
    pub standalone_port: Option<u16>,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of concurrent sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Maximum inbound event size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("HUDDLE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn default_port() -> u16 {
    ["HUDDLE_PORT", "WS_PORT"]
        .iter()
        .find_map(|key| std::env::var(key).ok().and_then(|p| p.parse().ok()))
        .unwrap_or(3000)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_max_message_size() -> usize {
    huddle_protocol::codec::MAX_FRAME_SIZE
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
            standalone_port: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, layered with
    /// `HUDDLE_*` environment variables (`__` separates nested keys, e.g.
    /// `HUDDLE_LIMITS__MAX_SESSIONS`).
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// an environment override has the wrong type.
    pub fn load() -> Result<Self> {
        let base = match CONFIG_PATHS
            .iter()
            .map(|path| shellexpand::tilde(path))
            .find(|path| Path::new(path.as_ref()).exists())
        {
            Some(path) => Self::from_file(path.as_ref())?,
            None => Self::default(),
        };

        base.with_env_overrides()
    }

    /// Layer `HUDDLE_*` environment variables over this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override has the wrong type.
    pub fn with_env_overrides(self) -> Result<Self> {
        let base = config::Config::try_from(&self).context("Failed to load configuration")?;

        let settings = config::Config::builder()
            .add_source(base)
            .add_source(
                config::Environment::with_prefix("HUDDLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid host:port {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config: Config = toml::from_str("port = 3000").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.transport.websocket_path, "/ws");
        assert!(config.transport.standalone_port.is_none());
        assert_eq!(config.limits.max_message_size, 64 * 1024);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_config_bind_addr() {
        let config: Config = toml::from_str(
            r#"
            host = "127.0.0.1"
            port = 3000
            "#,
        )
        .unwrap();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 3000);

        let bad: Config = toml::from_str(r#"host = "not a host""#).unwrap();
        assert!(bad.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [transport]
            standalone_port = 9001

            [limits]
            max_sessions = 50
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.transport.standalone_port, Some(9001));
        assert_eq!(config.limits.max_sessions, 50);
        assert_eq!(config.limits.max_message_size, 64 * 1024);
    }

    #[test]
    fn test_config_from_file() {
        let path = std::env::temp_dir().join(format!("huddle-test-{}.toml", std::process::id()));
        std::fs::write(&path, "port = 4100\n[metrics]\nenabled = false\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.port, 4100);
        assert!(!config.metrics.enabled);

        std::fs::remove_file(&path).unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let path = std::env::temp_dir().join(format!("huddle-env-{}.toml", std::process::id()));
        std::fs::write(&path, "port = 4200\n[limits]\nmax_sessions = 5\n").unwrap();

        std::env::set_var("HUDDLE_LIMITS__MAX_SESSIONS", "77");
        let config = Config::from_file(&path).unwrap().with_env_overrides();
        std::env::remove_var("HUDDLE_LIMITS__MAX_SESSIONS");
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.port, 4200);
        assert_eq!(config.limits.max_sessions, 77);
        assert_eq!(config.transport.websocket_path, "/ws");
    }
}
