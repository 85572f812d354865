//! In-process loopback transport.
//!
//! A [`MemoryHub`] connects any number of endpoints in one process. Published
//! bytes fan out to every *other* endpoint subscribed to that channel, which
//! is exactly how a real broker behaves from one client's point of view.
//! Used by the integration tests and the CLI demo; real deployments inject a
//! broker-backed [`Transport`] instead.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::{LinkEvent, Transport, TransportEvent};
use crate::error::TransportError;
use crate::BoxFuture;

/// A shared in-memory broker for one process.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
    endpoints: Vec<Endpoint>,
    next_id: usize,
}

impl HubState {
    // Hub state is plain data; recover it if a holder panicked.
    fn lock(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
        state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Forget endpoints whose event receiver has been dropped.
    fn prune(&mut self) {
        self.endpoints.retain(|ep| !ep.events.is_closed());
    }
}

struct Endpoint {
    id: usize,
    subscriptions: HashSet<String>,
    events: mpsc::Sender<TransportEvent>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new endpoint: a transport for the outbound half and the
    /// event receiver a messenger consumes for the inbound half.
    pub fn endpoint(&self) -> (Arc<MemoryTransport>, mpsc::Receiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let id = {
            let mut state = HubState::lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.endpoints.push(Endpoint {
                id,
                subscriptions: HashSet::new(),
                events: events_tx,
            });
            id
        };
        let transport = Arc::new(MemoryTransport {
            id,
            state: Arc::clone(&self.state),
        });
        (transport, events_rx)
    }

    /// Deliver a link status change to every endpoint, the way a broker
    /// outage would reach every client.
    pub async fn emit_status(&self, link: LinkEvent) {
        let targets = {
            let mut state = HubState::lock(&self.state);
            state.prune();
            state
                .endpoints
                .iter()
                .map(|ep| ep.events.clone())
                .collect::<Vec<_>>()
        };
        for tx in targets {
            let _ = tx.send(TransportEvent::Status(link.clone())).await;
        }
    }
}

/// One endpoint's outbound half.
pub struct MemoryTransport {
    id: usize,
    state: Arc<Mutex<HubState>>,
}

impl Transport for MemoryTransport {
    fn subscribe(&self, channels: Vec<String>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let mut state = HubState::lock(&self.state);
            if let Some(ep) = state.endpoints.iter_mut().find(|ep| ep.id == self.id) {
                ep.subscriptions.extend(channels);
            }
            Ok(())
        })
    }

    fn unsubscribe(&self, channels: Vec<String>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let mut state = HubState::lock(&self.state);
            if let Some(ep) = state.endpoints.iter_mut().find(|ep| ep.id == self.id) {
                for channel in &channels {
                    ep.subscriptions.remove(channel);
                }
            }
            Ok(())
        })
    }

    fn publish(
        &self,
        channel: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            // Collect senders under the lock, deliver after releasing it.
            let targets = {
                let mut state = HubState::lock(&self.state);
                state.prune();
                state
                    .endpoints
                    .iter()
                    .filter(|ep| ep.id != self.id && ep.subscriptions.contains(&channel))
                    .map(|ep| ep.events.clone())
                    .collect::<Vec<_>>()
            };
            for tx in targets {
                let event = TransportEvent::Frame {
                    channel: channel.clone(),
                    bytes: bytes.clone(),
                };
                // A dropped receiver just means that endpoint is gone.
                let _ = tx.send(event).await;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_other_subscribers() {
        let hub = MemoryHub::new();
        let (a, _a_rx) = hub.endpoint();
        let (b, mut b_rx) = hub.endpoint();

        a.subscribe(vec!["ch".to_string()]).await.unwrap();
        b.subscribe(vec!["ch".to_string()]).await.unwrap();

        a.publish("ch".to_string(), b"hello".to_vec()).await.unwrap();

        match b_rx.recv().await.unwrap() {
            TransportEvent::Frame { channel, bytes } => {
                assert_eq!(channel, "ch");
                assert_eq!(bytes, b"hello");
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publisher_does_not_hear_itself() {
        let hub = MemoryHub::new();
        let (a, mut a_rx) = hub.endpoint();
        a.subscribe(vec!["ch".to_string()]).await.unwrap();

        a.publish("ch".to_string(), b"echo?".to_vec()).await.unwrap();

        assert!(
            a_rx.try_recv().is_err(),
            "publisher must not receive its own frame"
        );
    }

    #[tokio::test]
    async fn test_unsubscribed_channel_is_silent() {
        let hub = MemoryHub::new();
        let (a, _a_rx) = hub.endpoint();
        let (b, mut b_rx) = hub.endpoint();

        b.subscribe(vec!["ch".to_string()]).await.unwrap();
        b.unsubscribe(vec!["ch".to_string()]).await.unwrap();

        a.publish("ch".to_string(), b"dropped".to_vec())
            .await
            .unwrap();

        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_per_channel_order_is_preserved() {
        let hub = MemoryHub::new();
        let (a, _a_rx) = hub.endpoint();
        let (b, mut b_rx) = hub.endpoint();
        b.subscribe(vec!["ch".to_string()]).await.unwrap();

        for i in 0u8..5 {
            a.publish("ch".to_string(), vec![i]).await.unwrap();
        }
        for i in 0u8..5 {
            match b_rx.recv().await.unwrap() {
                TransportEvent::Frame { bytes, .. } => assert_eq!(bytes, vec![i]),
                other => panic!("expected frame, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_status_reaches_every_endpoint() {
        let hub = MemoryHub::new();
        let (_a, mut a_rx) = hub.endpoint();
        let (_b, mut b_rx) = hub.endpoint();

        hub.emit_status(LinkEvent::Reconnecting).await;

        for rx in [&mut a_rx, &mut b_rx] {
            match rx.recv().await.unwrap() {
                TransportEvent::Status(link) => assert_eq!(link, LinkEvent::Reconnecting),
                other => panic!("expected status, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_dead_endpoints_are_pruned() {
        let hub = MemoryHub::new();
        let (a, _a_rx) = hub.endpoint();
        let (b, b_rx) = hub.endpoint();
        b.subscribe(vec!["ch".to_string()]).await.unwrap();
        drop(b_rx);

        a.publish("ch".to_string(), b"gone".to_vec()).await.unwrap();

        let state = HubState::lock(&hub.state);
        assert_eq!(state.endpoints.len(), 1);
        assert_eq!(state.endpoints[0].id, a.id);
    }
}
