//! Error taxonomy for the messaging layer.

use uuid::Uuid;

use crate::message::MessageKind;

/// Failures surfaced by a [`Transport`](crate::transport::Transport)
/// implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("unsubscribe failed: {0}")]
    Unsubscribe(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

/// Errors returned by messenger operations.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("transport credentials are not configured")]
    NotConfigured,

    #[error("timed out waiting for response")]
    Timeout,

    #[error("unsupported message kind: {0}")]
    UnsupportedKind(MessageKind),

    #[error("failed to encode message: {0}")]
    Encoding(String),

    #[error("failed to decode message: {0}")]
    Decoding(String),

    #[error("correlation id already pending: {0}")]
    DuplicateCorrelation(Uuid),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("messenger is no longer running")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = MessagingError::UnsupportedKind(MessageKind::Shutdown);
        assert_eq!(err.to_string(), "unsupported message kind: shutdown");

        let err = MessagingError::from(TransportError::Publish("broker gone".to_string()));
        assert_eq!(err.to_string(), "transport error: publish failed: broker gone");
    }

    #[test]
    fn test_not_configured_display() {
        assert_eq!(
            MessagingError::NotConfigured.to_string(),
            "transport credentials are not configured"
        );
    }
}
