//! Typed messenger settings, converted once from the TOML-facing config.
//!
//! The messenger never reads the environment or disk; the host loads an
//! [`AppConfig`], converts it here, and hands the value over at construction.

use std::time::Duration;

use twinwire_config::{AppConfig, ConfigError};

use crate::message::Role;
use crate::route::ChannelSet;

/// Immutable settings a messenger is constructed with.
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// This daemon's identity on the shared channels.
    pub role: Role,

    /// The five channel names.
    pub channels: ChannelSet,

    /// Publish credential handed to the transport.
    pub publish_key: String,

    /// Subscribe credential handed to the transport.
    pub subscribe_key: String,

    /// Client identifier presented to the broker.
    pub client_id: String,

    /// How long a connect attempt waits for the broker.
    pub connect_timeout: Duration,

    /// Cadence of liveness heartbeats while connected.
    pub heartbeat_interval: Duration,

    /// Default wait for a correlated command response.
    pub response_timeout: Duration,
}

impl MessengerConfig {
    /// Convert a loaded [`AppConfig`] into typed settings.
    pub fn from_app(config: &AppConfig) -> Result<Self, ConfigError> {
        let role = match config.daemon.role.as_str() {
            "user" => Role::User,
            "system" => Role::System,
            other => {
                return Err(ConfigError::Validation(format!(
                    "daemon.role must be \"user\" or \"system\", got {other:?}"
                )));
            }
        };

        Ok(Self {
            role,
            channels: ChannelSet::from(&config.channels),
            publish_key: config.transport.publish_key.clone(),
            subscribe_key: config.transport.subscribe_key.clone(),
            client_id: config.transport.client_id.clone(),
            connect_timeout: Duration::from_secs(config.transport.connection_timeout_secs),
            heartbeat_interval: Duration::from_secs(config.transport.heartbeat_interval_secs),
            response_timeout: Duration::from_secs(config.transport.response_timeout_secs),
        })
    }

    /// Whether both transport credentials are present. Connecting without
    /// them fails with [`MessagingError::NotConfigured`](crate::MessagingError::NotConfigured).
    pub fn is_configured(&self) -> bool {
        !self.publish_key.is_empty() && !self.subscribe_key.is_empty()
    }
}
