//! Pending command bookkeeping.
//!
//! One waiter per in-flight correlation id. Completion consumes the
//! waiter's oneshot sender, so a waiter resolves exactly once: with the
//! matching response, at its deadline, or on a publish failure.
//! Only the messenger actor touches this map.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::MessagingError;
use crate::message::Envelope;

/// What a pending command ultimately receives: the response envelope, or
/// the error that ended the wait.
pub type CommandOutcome = Result<Envelope, MessagingError>;

struct Waiter {
    respond_to: oneshot::Sender<CommandOutcome>,
    deadline: Instant,
}

/// Map of in-flight commands awaiting their correlated responses.
#[derive(Default)]
pub struct CorrelationTracker {
    pending: HashMap<Uuid, Waiter>,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new waiter. A duplicate id completes the new waiter with
    /// [`MessagingError::DuplicateCorrelation`] and reports the rejection.
    pub fn register(
        &mut self,
        id: Uuid,
        deadline: Instant,
        respond_to: oneshot::Sender<CommandOutcome>,
    ) -> Result<(), MessagingError> {
        if self.pending.contains_key(&id) {
            let _ = respond_to.send(Err(MessagingError::DuplicateCorrelation(id)));
            return Err(MessagingError::DuplicateCorrelation(id));
        }
        self.pending.insert(
            id,
            Waiter {
                respond_to,
                deadline,
            },
        );
        Ok(())
    }

    /// Complete the waiter for `id` with a response envelope. Returns
    /// false when no waiter is registered, which is an expected race
    /// (late or duplicate response), not an error.
    pub fn resolve(&mut self, id: Uuid, response: Envelope) -> bool {
        match self.pending.remove(&id) {
            Some(waiter) => {
                let _ = waiter.respond_to.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Complete the waiter for `id` with an error. Returns false when no
    /// waiter is registered.
    pub fn fail(&mut self, id: Uuid, error: MessagingError) -> bool {
        match self.pending.remove(&id) {
            Some(waiter) => {
                let _ = waiter.respond_to.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// The earliest deadline among pending waiters.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|w| w.deadline).min()
    }

    /// Complete every waiter whose deadline is at or before `now` with
    /// [`MessagingError::Timeout`]. Returns the evicted ids.
    pub fn expire(&mut self, now: Instant) -> Vec<Uuid> {
        let expired: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|(_, waiter)| waiter.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(waiter) = self.pending.remove(id) {
                let _ = waiter.respond_to.send(Err(MessagingError::Timeout));
            }
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::message::{Payload, Role};

    fn response_to(id: Uuid) -> Envelope {
        Envelope::new(
            Role::System,
            Payload::Response {
                correlation_id: id,
                success: true,
                result: Some("done".to_string()),
                error_message: None,
            },
        )
    }

    #[tokio::test]
    async fn test_resolve_delivers_response() {
        let mut tracker = CorrelationTracker::new();
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        tracker
            .register(id, Instant::now() + Duration::from_secs(30), tx)
            .unwrap();
        assert!(tracker.resolve(id, response_to(id)));

        let outcome = rx.await.unwrap();
        let envelope = outcome.unwrap();
        assert!(matches!(
            envelope.payload,
            Payload::Response { success: true, .. }
        ));
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let mut tracker = CorrelationTracker::new();
        let id = Uuid::new_v4();
        let deadline = Instant::now() + Duration::from_secs(30);

        let (tx1, _rx1) = oneshot::channel();
        tracker.register(id, deadline, tx1).unwrap();

        let (tx2, rx2) = oneshot::channel();
        let err = tracker.register(id, deadline, tx2).unwrap_err();
        assert!(matches!(err, MessagingError::DuplicateCorrelation(dup) if dup == id));

        // The rejected waiter hears about it; the original stays pending.
        let outcome = rx2.await.unwrap();
        assert!(matches!(
            outcome,
            Err(MessagingError::DuplicateCorrelation(_))
        ));
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_a_no_op() {
        let mut tracker = CorrelationTracker::new();
        let id = Uuid::new_v4();
        assert!(!tracker.resolve(id, response_to(id)));
    }

    #[tokio::test]
    async fn test_expire_fires_at_the_deadline_not_before() {
        let mut tracker = CorrelationTracker::new();
        let id = Uuid::new_v4();
        let now = Instant::now();
        let deadline = now + Duration::from_millis(100);
        let (tx, rx) = oneshot::channel();
        tracker.register(id, deadline, tx).unwrap();

        // Just before the deadline nothing expires.
        assert!(tracker.expire(deadline - Duration::from_millis(1)).is_empty());
        assert_eq!(tracker.len(), 1);

        // Exactly at the deadline the waiter is evicted with a timeout.
        assert_eq!(tracker.expire(deadline), vec![id]);
        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, Err(MessagingError::Timeout)));
    }

    #[tokio::test]
    async fn test_resolve_after_expiry_is_a_no_op() {
        let mut tracker = CorrelationTracker::new();
        let id = Uuid::new_v4();
        let now = Instant::now();
        let (tx, _rx) = oneshot::channel();
        tracker.register(id, now, tx).unwrap();

        assert_eq!(tracker.expire(now), vec![id]);
        assert!(!tracker.resolve(id, response_to(id)));
    }

    #[tokio::test]
    async fn test_fail_delivers_error() {
        let mut tracker = CorrelationTracker::new();
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        tracker
            .register(id, Instant::now() + Duration::from_secs(30), tx)
            .unwrap();

        assert!(tracker.fail(
            id,
            MessagingError::Transport(crate::error::TransportError::Publish(
                "broker gone".to_string()
            ))
        ));
        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, Err(MessagingError::Transport(_))));
        assert!(!tracker.fail(id, MessagingError::Timeout));
    }

    #[tokio::test]
    async fn test_next_deadline_is_the_earliest() {
        let mut tracker = CorrelationTracker::new();
        let now = Instant::now();
        let near = now + Duration::from_secs(1);
        let far = now + Duration::from_secs(10);

        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        tracker.register(Uuid::new_v4(), far, tx1).unwrap();
        tracker.register(Uuid::new_v4(), near, tx2).unwrap();

        assert_eq!(tracker.next_deadline(), Some(near));
    }

    #[tokio::test]
    async fn test_expire_only_evicts_due_waiters() {
        let mut tracker = CorrelationTracker::new();
        let now = Instant::now();
        let due = Uuid::new_v4();
        let pending = Uuid::new_v4();

        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        tracker.register(due, now, tx1).unwrap();
        tracker
            .register(pending, now + Duration::from_secs(10), tx2)
            .unwrap();

        assert_eq!(tracker.expire(now), vec![due]);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.next_deadline(), Some(now + Duration::from_secs(10)));
    }
}
