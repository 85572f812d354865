//! Wire frames, the unit handed to the pub/sub transport.
//!
//! A frame is a routing header (kind, priority, source, target) wrapped
//! around the encoded envelope. Transports route on the header without
//! touching the payload bytes; decoders verify the header never disagrees
//! with what is inside.

use serde::{Deserialize, Serialize};

use crate::error::MessagingError;
use crate::message::{Envelope, MessageKind, Priority, Role};

/// One published unit: header fields plus the envelope as opaque bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Wire kind, mirrors the embedded envelope.
    pub kind: MessageKind,

    /// Encoded envelope. Opaque to the transport.
    pub payload: Vec<u8>,

    /// Delivery priority.
    pub priority: Priority,

    /// Producing role, mirrors the embedded envelope.
    pub source: Role,

    /// Intended recipient, mirrors the embedded envelope.
    pub target: Option<Role>,
}

impl Frame {
    /// Encode an envelope into a frame whose header mirrors it.
    pub fn encode(envelope: &Envelope) -> Result<Self, MessagingError> {
        let payload =
            serde_json::to_vec(envelope).map_err(|e| MessagingError::Encoding(e.to_string()))?;
        Ok(Self {
            kind: envelope.kind(),
            payload,
            priority: envelope.payload.priority(),
            source: envelope.source,
            target: envelope.target,
        })
    }

    /// Decode the embedded envelope and verify it against the header.
    pub fn decode(&self) -> Result<Envelope, MessagingError> {
        if !self.kind.has_body() {
            return Err(MessagingError::UnsupportedKind(self.kind));
        }
        let envelope: Envelope = serde_json::from_slice(&self.payload)
            .map_err(|e| MessagingError::Decoding(e.to_string()))?;
        if envelope.kind() != self.kind {
            return Err(MessagingError::Decoding(format!(
                "frame kind {} does not match envelope kind {}",
                self.kind,
                envelope.kind()
            )));
        }
        if envelope.source != self.source {
            return Err(MessagingError::Decoding(format!(
                "frame source {} does not match envelope source {}",
                self.source, envelope.source
            )));
        }
        if envelope.target != self.target {
            return Err(MessagingError::Decoding(
                "frame target does not match envelope target".to_string(),
            ));
        }
        Ok(envelope)
    }

    /// Serialize the whole frame for the transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::Encoding(e.to_string()))
    }

    /// Parse a frame received from the transport.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes).map_err(|e| MessagingError::Decoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::message::{HealthState, Payload};
    use pretty_assertions::assert_eq;

    fn sample_payloads() -> Vec<Payload> {
        let mut details = HashMap::new();
        details.insert("disk".to_string(), "nearly full".to_string());
        let mut params = HashMap::new();
        params.insert("unit".to_string(), "networkd".to_string());

        vec![
            Payload::Heartbeat {
                system_load: Some(0.42),
                memory_mb: Some(128.5),
                uptime_secs: 3600.0,
            },
            Payload::SystemStatus {
                status: HealthState::Degraded,
                details: Some(details),
            },
            Payload::Command {
                command: "restart".to_string(),
                parameters: Some(params),
                priority: Priority::Critical,
                requires_response: true,
            },
            Payload::Response {
                correlation_id: uuid::Uuid::new_v4(),
                success: false,
                result: None,
                error_message: Some("unit not found".to_string()),
            },
        ]
    }

    #[test]
    fn test_round_trip_every_payload() {
        for payload in sample_payloads() {
            let envelope = Envelope::addressed(Role::System, Role::User, payload);
            let frame = Frame::encode(&envelope).unwrap();
            let bytes = frame.to_bytes().unwrap();
            let parsed = Frame::from_bytes(&bytes).unwrap();
            let decoded = parsed.decode().unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_header_mirrors_envelope() {
        let envelope = Envelope::new(
            Role::User,
            Payload::Command {
                command: "ping".to_string(),
                parameters: None,
                priority: Priority::High,
                requires_response: true,
            },
        );
        let frame = Frame::encode(&envelope).unwrap();
        assert_eq!(frame.kind, MessageKind::Command);
        assert_eq!(frame.priority, Priority::High);
        assert_eq!(frame.source, Role::User);
        assert_eq!(frame.target, None);
    }

    #[test]
    fn test_non_command_frames_ship_at_normal_priority() {
        let envelope = Envelope::new(
            Role::System,
            Payload::Heartbeat {
                system_load: None,
                memory_mb: None,
                uptime_secs: 1.0,
            },
        );
        let frame = Frame::encode(&envelope).unwrap();
        assert_eq!(frame.priority, Priority::Normal);
    }

    #[test]
    fn test_decode_rejects_kind_mismatch() {
        let envelope = Envelope::new(
            Role::User,
            Payload::Heartbeat {
                system_load: None,
                memory_mb: None,
                uptime_secs: 0.0,
            },
        );
        let mut frame = Frame::encode(&envelope).unwrap();
        frame.kind = MessageKind::Command;

        let err = frame.decode().unwrap_err();
        assert!(matches!(err, MessagingError::Decoding(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_rejects_source_mismatch() {
        let envelope = Envelope::new(
            Role::User,
            Payload::SystemStatus {
                status: HealthState::Healthy,
                details: None,
            },
        );
        let mut frame = Frame::encode(&envelope).unwrap();
        frame.source = Role::System;

        let err = frame.decode().unwrap_err();
        assert!(matches!(err, MessagingError::Decoding(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_rejects_target_mismatch() {
        let envelope = Envelope::addressed(
            Role::User,
            Role::System,
            Payload::SystemStatus {
                status: HealthState::Healthy,
                details: None,
            },
        );
        let mut frame = Frame::encode(&envelope).unwrap();
        frame.target = None;

        let err = frame.decode().unwrap_err();
        assert!(matches!(err, MessagingError::Decoding(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_rejects_reserved_kind() {
        let envelope = Envelope::new(
            Role::User,
            Payload::Heartbeat {
                system_load: None,
                memory_mb: None,
                uptime_secs: 0.0,
            },
        );
        let mut frame = Frame::encode(&envelope).unwrap();
        frame.kind = MessageKind::Shutdown;

        let err = frame.decode().unwrap_err();
        assert!(
            matches!(err, MessagingError::UnsupportedKind(MessageKind::Shutdown)),
            "got {err:?}"
        );
    }

    #[test]
    fn test_decode_rejects_garbage_payload() {
        let frame = Frame {
            kind: MessageKind::Command,
            payload: b"not json".to_vec(),
            priority: Priority::Normal,
            source: Role::User,
            target: None,
        };
        let err = frame.decode().unwrap_err();
        assert!(matches!(err, MessagingError::Decoding(_)), "got {err:?}");
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let err = Frame::from_bytes(b"\x00\x01\x02").unwrap_err();
        assert!(matches!(err, MessagingError::Decoding(_)), "got {err:?}");
    }
}
