#![deny(unsafe_code)]

//! Configuration loading and validation for TwinWire.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`AppConfig`] type as the central configuration structure
//! shared by both daemon roles. Values are plain strings and integers here;
//! the core crate converts them into typed settings at construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon identity configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Pub/sub transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Channel name configuration.
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Security configuration handed to transport adapters.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of this daemon on the shared channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Daemon role: "user" or "system".
    #[serde(default = "default_role")]
    pub role: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
        }
    }
}

fn default_role() -> String {
    "user".to_string()
}

/// Pub/sub transport credentials and tuning intervals.
///
/// Empty keys are valid configuration: the messenger reports
/// "not configured" at connect time rather than at load time, so a
/// config file can be staged before credentials are provisioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Publish credential for the transport adapter.
    #[serde(default)]
    pub publish_key: String,

    /// Subscribe credential for the transport adapter.
    #[serde(default)]
    pub subscribe_key: String,

    /// Client identifier presented to the broker. Empty lets the
    /// adapter generate one.
    #[serde(default)]
    pub client_id: String,

    /// Seconds to wait for the broker before a connect attempt fails.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Seconds between heartbeat publications while connected.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Seconds a command waits for its correlated response.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            publish_key: String::new(),
            subscribe_key: String::new(),
            client_id: String::new(),
            connection_timeout_secs: default_connection_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            response_timeout_secs: default_response_timeout_secs(),
        }
    }
}

fn default_connection_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_response_timeout_secs() -> u64 {
    30
}

/// Names of the five shared channels.
///
/// Both daemons must agree on these; the defaults are fine unless several
/// daemon pairs share one broker keyspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Channel for system-daemon traffic.
    #[serde(default = "default_system_channel")]
    pub system: String,

    /// Channel for user-daemon traffic.
    #[serde(default = "default_user_channel")]
    pub user: String,

    /// Channel for liveness heartbeats.
    #[serde(default = "default_heartbeat_channel")]
    pub heartbeat: String,

    /// Channel for commands and their responses.
    #[serde(default = "default_command_channel")]
    pub command: String,

    /// Channel for health status reports.
    #[serde(default = "default_status_channel")]
    pub status: String,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            system: default_system_channel(),
            user: default_user_channel(),
            heartbeat: default_heartbeat_channel(),
            command: default_command_channel(),
            status: default_status_channel(),
        }
    }
}

fn default_system_channel() -> String {
    "twinwire.system".to_string()
}

fn default_user_channel() -> String {
    "twinwire.user".to_string()
}

fn default_heartbeat_channel() -> String {
    "twinwire.heartbeat".to_string()
}

fn default_command_channel() -> String {
    "twinwire.command".to_string()
}

fn default_status_channel() -> String {
    "twinwire.status".to_string()
}

/// Security settings consumed by transport adapters.
///
/// The core messaging layer carries these through without enforcing them;
/// encryption and signature checks happen at the transport boundary.
///
/// ## TOML Example
///
/// ```toml
/// [security]
/// enable_encryption = true
/// encryption_key = "base64:..."
/// allowed_sources = ["user", "system"]
/// require_signatures = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Whether the transport should encrypt payloads.
    #[serde(default = "default_enable_encryption")]
    pub enable_encryption: bool,

    /// Cipher key for the transport. Absent lets the adapter source
    /// one from its own keystore.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Roles a transport adapter should accept frames from.
    #[serde(default)]
    pub allowed_sources: Option<Vec<String>>,

    /// Whether the transport should reject unsigned frames.
    #[serde(default)]
    pub require_signatures: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_encryption: default_enable_encryption(),
            encryption_key: None,
            allowed_sources: None,
            require_signatures: false,
        }
    }
}

fn default_enable_encryption() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const VALID_ROLES: [&str; 2] = ["user", "system"];

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_ROLES.contains(&self.daemon.role.as_str()) {
            return Err(ConfigError::Validation(format!(
                "daemon.role must be one of {:?}, got {:?}",
                VALID_ROLES, self.daemon.role
            )));
        }

        if self.transport.connection_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "transport.connection_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.transport.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "transport.heartbeat_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.transport.response_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "transport.response_timeout_secs must be non-zero".to_string(),
            ));
        }

        // Validate channel names
        let names = [
            ("channels.system", &self.channels.system),
            ("channels.user", &self.channels.user),
            ("channels.heartbeat", &self.channels.heartbeat),
            ("channels.command", &self.channels.command),
            ("channels.status", &self.channels.status),
        ];
        for (key, name) in &names {
            if name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{key} must not be empty"
                )));
            }
        }
        for (i, (key_a, name_a)) in names.iter().enumerate() {
            for (key_b, name_b) in &names[i + 1..] {
                if name_a == name_b {
                    return Err(ConfigError::Validation(format!(
                        "{key_a} and {key_b} must be distinct, both are {name_a:?}"
                    )));
                }
            }
        }

        // Validate security config
        if self.security.require_signatures && !self.security.enable_encryption {
            return Err(ConfigError::Validation(
                "security.require_signatures needs security.enable_encryption".to_string(),
            ));
        }
        if let Some(sources) = &self.security.allowed_sources {
            let valid_sources = ["user", "system", "broadcast"];
            for (i, source) in sources.iter().enumerate() {
                if !valid_sources.contains(&source.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "security.allowed_sources[{i}] must be one of {:?}, got {:?}",
                        valid_sources, source
                    )));
                }
            }
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
