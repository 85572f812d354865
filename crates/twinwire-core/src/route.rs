//! Channel routing policy.
//!
//! Five shared channels carry all traffic between the daemons. Each role
//! subscribes to its own primary channel plus the three cross-cutting ones,
//! and every message kind has a default channel it publishes to. Both sides
//! of the policy are pure functions over the configured channel names.

use twinwire_config::ChannelsConfig;

use crate::message::{MessageKind, Role};

/// The five channel names both daemons agree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet {
    system: String,
    user: String,
    heartbeat: String,
    command: String,
    status: String,
}

impl ChannelSet {
    /// Channels a daemon of the given role listens on, in subscribe order.
    ///
    /// Concrete roles hear their own primary channel plus heartbeat,
    /// command, and status; they never hear the other role's primary
    /// channel. [`Role::Broadcast`] hears everything.
    pub fn subscriptions(&self, role: Role) -> Vec<String> {
        let names: &[&String] = match role {
            Role::User => &[&self.user, &self.heartbeat, &self.command, &self.status],
            Role::System => &[&self.system, &self.heartbeat, &self.command, &self.status],
            Role::Broadcast => &[
                &self.system,
                &self.user,
                &self.heartbeat,
                &self.command,
                &self.status,
            ],
        };
        names.iter().map(|name| (*name).clone()).collect()
    }

    /// Default channel a message of the given kind publishes to.
    ///
    /// Kinds without a dedicated channel land on the publishing role's
    /// primary channel.
    pub fn publish_channel(&self, role: Role, kind: MessageKind) -> &str {
        match kind {
            MessageKind::Heartbeat => &self.heartbeat,
            MessageKind::SystemStatus => &self.status,
            MessageKind::Command | MessageKind::Response => &self.command,
            MessageKind::UserActivity => &self.user,
            _ => match role {
                Role::User => &self.user,
                _ => &self.system,
            },
        }
    }
}

impl From<&ChannelsConfig> for ChannelSet {
    fn from(config: &ChannelsConfig) -> Self {
        Self {
            system: config.system.clone(),
            user: config.user.clone(),
            heartbeat: config.heartbeat.clone(),
            command: config.command.clone(),
            status: config.status.clone(),
        }
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::from(&ChannelsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_subscriptions() {
        let channels = ChannelSet::default();
        let subs = channels.subscriptions(Role::User);
        assert_eq!(
            subs,
            vec![
                "twinwire.user",
                "twinwire.heartbeat",
                "twinwire.command",
                "twinwire.status",
            ]
        );
        assert!(!subs.contains(&"twinwire.system".to_string()));
    }

    #[test]
    fn test_system_subscriptions() {
        let channels = ChannelSet::default();
        let subs = channels.subscriptions(Role::System);
        assert_eq!(
            subs,
            vec![
                "twinwire.system",
                "twinwire.heartbeat",
                "twinwire.command",
                "twinwire.status",
            ]
        );
        assert!(!subs.contains(&"twinwire.user".to_string()));
    }

    #[test]
    fn test_broadcast_hears_everything() {
        let channels = ChannelSet::default();
        let subs = channels.subscriptions(Role::Broadcast);
        assert_eq!(subs.len(), 5);
        for name in [
            "twinwire.system",
            "twinwire.user",
            "twinwire.heartbeat",
            "twinwire.command",
            "twinwire.status",
        ] {
            assert!(subs.contains(&name.to_string()), "missing {name}");
        }
    }

    #[test]
    fn test_kind_default_channels() {
        let channels = ChannelSet::default();
        assert_eq!(
            channels.publish_channel(Role::User, MessageKind::Heartbeat),
            "twinwire.heartbeat"
        );
        assert_eq!(
            channels.publish_channel(Role::System, MessageKind::SystemStatus),
            "twinwire.status"
        );
        assert_eq!(
            channels.publish_channel(Role::User, MessageKind::Command),
            "twinwire.command"
        );
        assert_eq!(
            channels.publish_channel(Role::System, MessageKind::Response),
            "twinwire.command"
        );
        assert_eq!(
            channels.publish_channel(Role::System, MessageKind::UserActivity),
            "twinwire.user"
        );
    }

    #[test]
    fn test_undedicated_kinds_use_role_primary() {
        let channels = ChannelSet::default();
        assert_eq!(
            channels.publish_channel(Role::User, MessageKind::Configuration),
            "twinwire.user"
        );
        assert_eq!(
            channels.publish_channel(Role::System, MessageKind::Shutdown),
            "twinwire.system"
        );
        assert_eq!(
            channels.publish_channel(Role::Broadcast, MessageKind::Error),
            "twinwire.system"
        );
    }

    #[test]
    fn test_custom_channel_names_flow_through() {
        let config = ChannelsConfig {
            system: "pair3.sys".to_string(),
            user: "pair3.usr".to_string(),
            heartbeat: "pair3.hb".to_string(),
            command: "pair3.cmd".to_string(),
            status: "pair3.st".to_string(),
        };
        let channels = ChannelSet::from(&config);
        assert_eq!(
            channels.publish_channel(Role::User, MessageKind::Heartbeat),
            "pair3.hb"
        );
        assert_eq!(channels.subscriptions(Role::System)[0], "pair3.sys");
    }
}
