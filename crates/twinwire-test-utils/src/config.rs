//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use twinwire_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .role("system")
///     .keys("pub-test", "sub-test")
///     .response_timeout_secs(1)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn role(mut self, role: &str) -> Self {
        self.config.daemon.role = role.to_string();
        self
    }

    /// Set both transport credentials at once.
    pub fn keys(mut self, publish_key: &str, subscribe_key: &str) -> Self {
        self.config.transport.publish_key = publish_key.to_string();
        self.config.transport.subscribe_key = subscribe_key.to_string();
        self
    }

    pub fn client_id(mut self, id: &str) -> Self {
        self.config.transport.client_id = id.to_string();
        self
    }

    pub fn connection_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transport.connection_timeout_secs = secs;
        self
    }

    pub fn heartbeat_interval_secs(mut self, secs: u64) -> Self {
        self.config.transport.heartbeat_interval_secs = secs;
        self
    }

    pub fn response_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transport.response_timeout_secs = secs;
        self
    }

    /// Prefix all five channel names, e.g. `test` gives `test.heartbeat`.
    pub fn channel_prefix(mut self, prefix: &str) -> Self {
        self.config.channels.heartbeat = format!("{prefix}.heartbeat");
        self.config.channels.status = format!("{prefix}.status");
        self.config.channels.command = format!("{prefix}.command");
        self.config.channels.user = format!("{prefix}.user");
        self.config.channels.system = format!("{prefix}.system");
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
