//! Inbound frame classification.
//!
//! Every byte blob received on a subscribed channel goes through
//! [`classify`] before it can reach the observer or the correlation
//! tracker. Nothing here mutates state, so the full drop policy is
//! testable without a running messenger. A frame that fails
//! classification is dropped and logged; it never aborts dispatch.

use crate::frame::Frame;
use crate::message::{Envelope, MessageKind, Role};
use crate::MessagingError;

/// Why an inbound frame was dropped instead of delivered.
#[derive(Debug)]
pub enum DropReason {
    /// The frame kind carries no payload body in this protocol version.
    Unsupported(MessageKind),
    /// The frame or its envelope failed to parse, or the header lied.
    Malformed(String),
    /// The frame originated from this daemon and echoed back.
    SelfEcho,
}

/// Classify raw bytes received on a channel into a deliverable envelope
/// or a reason to drop them.
///
/// Frames from [`Role::Broadcast`] sources are never treated as echo:
/// a concrete daemon role can only equal its own role.
pub fn classify(bytes: &[u8], local_role: Role) -> Result<Envelope, DropReason> {
    let frame = Frame::from_bytes(bytes).map_err(|e| DropReason::Malformed(e.to_string()))?;

    if !frame.kind.has_body() {
        return Err(DropReason::Unsupported(frame.kind));
    }

    if frame.source == local_role {
        return Err(DropReason::SelfEcho);
    }

    frame.decode().map_err(|e| match e {
        MessagingError::UnsupportedKind(kind) => DropReason::Unsupported(kind),
        other => DropReason::Malformed(other.to_string()),
    })
}
