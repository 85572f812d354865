#![deny(unsafe_code)]

//! TwinWire core messaging runtime.
//!
//! Provides the messenger actor the user and system daemons share: envelope
//! and frame types, role-based channel routing, command correlation, and the
//! transport abstraction the actor drives. Hosts consume it through a
//! [`MessengerHandle`] plus one observer channel of [`MessengerEvent`]s.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, the standard return type for
/// async trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are **not**
/// object-safe. Traits consumed via `Arc<dyn Trait>` or `&dyn Trait` must
/// return a concrete `Pin<Box<dyn Future>>` instead. This alias keeps those
/// signatures readable.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Messenger runtime settings derived from the application config.
pub mod config;
/// Pending-command table mapping correlation ids to waiting callers.
pub mod correlate;
/// Inbound frame screening and self-echo suppression.
pub mod dispatch;
/// Error taxonomy for transport and messaging failures.
pub mod error;
/// Wire frame carrying one encoded envelope plus routing headers.
pub mod frame;
/// Heartbeat payloads and host metrics sampling.
pub mod heartbeat;
/// Envelope, payload, and addressing types for the shared channels.
pub mod message;
/// The messenger actor and its cloneable handle.
pub mod messenger;
/// Channel names and role-based routing.
pub mod route;
/// Transport abstraction and the in-memory hub used by tests and demos.
pub mod transport;

pub use config::MessengerConfig;
pub use error::{MessagingError, TransportError};
pub use frame::Frame;
pub use message::{Envelope, HealthState, MessageKind, Payload, Priority, Role};
pub use messenger::{ConnectionState, Messenger, MessengerEvent, MessengerHandle};
pub use route::ChannelSet;
pub use transport::memory::MemoryHub;
pub use transport::{LinkEvent, Transport, TransportEvent};
