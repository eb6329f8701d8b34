//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Placeholder key; startup warns when it is still in use.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the admin service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub listener: ListenerConfig,

    /// Bearer-token authentication for the API.
    pub admin: AdminConfig,

    /// Load balancer config file, checker binary and service name.
    pub haproxy: HaproxyConfig,

    /// Hosting panel command directory.
    pub panel: PanelConfig,

    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8083").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8083".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HaproxyConfig {
    /// Live config file.
    pub config_path: PathBuf,

    /// Binary used for `-c -f` syntax checks.
    pub binary: PathBuf,

    /// Name passed to the panel's restart command.
    pub service_name: String,

    pub validate_timeout_secs: u64,

    /// Directory for validate-only scratch files.
    pub scratch_dir: PathBuf,
}

impl Default for HaproxyConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/haproxy/haproxy.cfg"),
            binary: PathBuf::from("/usr/sbin/haproxy"),
            service_name: "haproxy".to_string(),
            validate_timeout_secs: 30,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Panel install root; commands live in `<root>/bin`.
    pub root: PathBuf,

    /// Default deadline for a panel command.
    pub command_timeout_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/usr/local/hestia"),
            command_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout in seconds. Must cover the slowest panel command.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 180 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9093".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [haproxy]
            config_path = "/tmp/haproxy.cfg"

            [admin]
            api_key = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.haproxy.config_path, PathBuf::from("/tmp/haproxy.cfg"));
        assert_eq!(config.haproxy.service_name, "haproxy");
        assert_eq!(config.admin.api_key, "s3cret");
        assert_eq!(config.listener.bind_address, "127.0.0.1:8083");
        assert_eq!(config.panel.command_timeout_secs, 120);
        assert_eq!(config.security.max_body_size, 2 * 1024 * 1024);
    }
}
