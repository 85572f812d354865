//! The pub/sub transport capability.
//!
//! The messenger never talks to a broker directly. The host injects an
//! implementation of [`Transport`] for the outbound half and an event
//! receiver for the inbound half; broker specifics (wire encryption,
//! presence, retry policy) stay behind this seam.
//!
//! ```text
//!   MessengerHandle ──► Messenger actor ──► dyn Transport ──► broker
//!                            ▲
//!                            └── mpsc::Receiver<TransportEvent> ◄── broker
//! ```

/// In-process loopback hub for tests and the demo.
pub mod memory;

use crate::error::TransportError;
use crate::BoxFuture;

/// Link status reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The broker link is usable.
    Up,
    /// The broker link went away.
    Down,
    /// The transport is re-establishing the link on its own.
    Reconnecting,
    /// The link failed and the transport gave up.
    Error(String),
}

/// Everything a transport delivers to the messenger.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Raw frame bytes received on a subscribed channel.
    Frame { channel: String, bytes: Vec<u8> },
    /// A link status change.
    Status(LinkEvent),
}

/// Outbound operations on a pub/sub broker.
///
/// Methods return boxed futures so the trait stays object-safe; the
/// messenger holds implementations as `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    /// Subscribe to the given channels.
    fn subscribe(&self, channels: Vec<String>) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Unsubscribe from the given channels.
    fn unsubscribe(&self, channels: Vec<String>) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Publish one encoded frame to a channel, resolving on broker ack.
    fn publish(&self, channel: String, bytes: Vec<u8>)
        -> BoxFuture<'_, Result<(), TransportError>>;
}
