//! Message catalog shared by both daemon roles.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a daemon on the shared channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The user-privilege daemon.
    User,
    /// The system-privilege daemon.
    System,
    /// A source addressing both daemons at once.
    Broadcast,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::System => "system",
            Role::Broadcast => "broadcast",
        };
        f.write_str(s)
    }
}

/// Every message kind that can appear in a frame header.
///
/// Only four of these carry a payload body today ([`MessageKind::has_body`]);
/// the rest are reserved on the wire and dropped on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Heartbeat,
    SystemStatus,
    UserActivity,
    Configuration,
    Command,
    Response,
    Error,
    Shutdown,
}

impl MessageKind {
    /// Whether this kind has a decodable payload body.
    pub fn has_body(self) -> bool {
        matches!(
            self,
            Self::Heartbeat | Self::SystemStatus | Self::Command | Self::Response
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Heartbeat => "heartbeat",
            Self::SystemStatus => "system_status",
            Self::UserActivity => "user_activity",
            Self::Configuration => "configuration",
            Self::Command => "command",
            Self::Response => "response",
            Self::Error => "error",
            Self::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Delivery priority carried in the frame header.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Overall health reported in a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
    Maintenance,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
            Self::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

/// The typed body of an envelope. The serde tag doubles as the wire kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Periodic liveness report with best-effort process metrics.
    Heartbeat {
        /// 1-minute load average, when the platform exposes one.
        system_load: Option<f64>,
        /// Resident set size in megabytes, when the platform exposes it.
        memory_mb: Option<f64>,
        /// Seconds since the daemon's messenger started. Never negative.
        uptime_secs: f64,
    },
    /// Health summary for one daemon.
    SystemStatus {
        status: HealthState,
        details: Option<HashMap<String, String>>,
    },
    /// A request for the counterpart daemon to do something.
    Command {
        /// Verb understood by the receiving daemon. Never empty.
        command: String,
        parameters: Option<HashMap<String, String>>,
        priority: Priority,
        /// Whether the sender is waiting on a correlated response.
        requires_response: bool,
    },
    /// The answer to a command, correlated by the command envelope's id.
    Response {
        correlation_id: Uuid,
        success: bool,
        result: Option<String>,
        /// Set only when `success` is false.
        error_message: Option<String>,
    },
}

impl Payload {
    /// The wire kind this body serializes under.
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Heartbeat { .. } => MessageKind::Heartbeat,
            Payload::SystemStatus { .. } => MessageKind::SystemStatus,
            Payload::Command { .. } => MessageKind::Command,
            Payload::Response { .. } => MessageKind::Response,
        }
    }

    /// Frame priority for this body: commands carry their own, everything
    /// else ships at [`Priority::Normal`].
    pub fn priority(&self) -> Priority {
        match self {
            Payload::Command { priority, .. } => *priority,
            _ => Priority::Normal,
        }
    }
}

/// A message routed between the daemons. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message identifier, generated at construction.
    pub id: Uuid,

    /// Timestamp when the message was created.
    pub timestamp: DateTime<Utc>,

    /// Role that produced the message.
    pub source: Role,

    /// Intended recipient. Absent means routed by kind alone.
    pub target: Option<Role>,

    /// Typed message body.
    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope with no explicit target.
    pub fn new(source: Role, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source,
            target: None,
            payload,
        }
    }

    /// Create an envelope addressed to a specific role.
    pub fn addressed(source: Role, target: Role, payload: Payload) -> Self {
        Self {
            target: Some(target),
            ..Self::new(source, payload)
        }
    }

    /// The wire kind, derived from the payload.
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Build a successful response to this command, addressed back at
    /// its sender and correlated by this envelope's id.
    pub fn reply_ok(&self, source: Role, result: Option<String>) -> Envelope {
        Envelope::addressed(
            source,
            self.source,
            Payload::Response {
                correlation_id: self.id,
                success: true,
                result,
                error_message: None,
            },
        )
    }

    /// Build a failed response to this command.
    pub fn reply_err(&self, source: Role, error_message: impl Into<String>) -> Envelope {
        Envelope::addressed(
            source,
            self.source,
            Payload::Response {
                correlation_id: self.id,
                success: false,
                result: None,
                error_message: Some(error_message.into()),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn command(name: &str) -> Payload {
        Payload::Command {
            command: name.to_string(),
            parameters: None,
            priority: Priority::High,
            requires_response: true,
        }
    }

    #[test]
    fn test_envelope_creation() {
        let envelope = Envelope::new(Role::User, command("restart"));
        assert_eq!(envelope.source, Role::User);
        assert_eq!(envelope.target, None);
        assert_eq!(envelope.kind(), MessageKind::Command);
    }

    #[test]
    fn test_unique_ids() {
        let a = Envelope::new(Role::User, command("a"));
        let b = Envelope::new(Role::User, command("b"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_reply_correlates_and_targets_sender() {
        let cmd = Envelope::new(Role::User, command("status"));
        let reply = cmd.reply_ok(Role::System, Some("healthy".to_string()));

        assert_eq!(reply.source, Role::System);
        assert_eq!(reply.target, Some(Role::User));
        assert_ne!(reply.id, cmd.id);
        match reply.payload {
            Payload::Response {
                correlation_id,
                success,
                error_message,
                ..
            } => {
                assert_eq!(correlation_id, cmd.id);
                assert!(success);
                assert_eq!(error_message, None);
            }
            other => panic!("expected response payload, got {other:?}"),
        }
    }

    #[test]
    fn test_reply_err_carries_message() {
        let cmd = Envelope::new(Role::System, command("rotate"));
        let reply = cmd.reply_err(Role::User, "unknown command");
        match reply.payload {
            Payload::Response {
                success,
                error_message,
                result,
                ..
            } => {
                assert!(!success);
                assert_eq!(error_message.as_deref(), Some("unknown command"));
                assert_eq!(result, None);
            }
            other => panic!("expected response payload, got {other:?}"),
        }
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&MessageKind::SystemStatus).unwrap();
        assert_eq!(json, "\"system_status\"");
        let json = serde_json::to_string(&MessageKind::UserActivity).unwrap();
        assert_eq!(json, "\"user_activity\"");
        let kind: MessageKind = serde_json::from_str("\"shutdown\"").unwrap();
        assert_eq!(kind, MessageKind::Shutdown);
    }

    #[test]
    fn test_payload_tag_matches_kind() {
        let payload = Payload::Heartbeat {
            system_load: Some(0.25),
            memory_mb: None,
            uptime_secs: 12.0,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"heartbeat\""));
        assert_eq!(payload.kind(), MessageKind::Heartbeat);
    }

    #[test]
    fn test_only_four_kinds_have_bodies() {
        let with_body = [
            MessageKind::Heartbeat,
            MessageKind::SystemStatus,
            MessageKind::Command,
            MessageKind::Response,
        ];
        let reserved = [
            MessageKind::UserActivity,
            MessageKind::Configuration,
            MessageKind::Error,
            MessageKind::Shutdown,
        ];
        for kind in with_body {
            assert!(kind.has_body(), "{kind} should have a body");
        }
        for kind in reserved {
            assert!(!kind.has_body(), "{kind} should be reserved");
        }
    }

    #[test]
    fn test_command_priority_flows_to_frame_priority() {
        assert_eq!(command("x").priority(), Priority::High);
        let status = Payload::SystemStatus {
            status: HealthState::Healthy,
            details: None,
        };
        assert_eq!(status.priority(), Priority::Normal);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
