//! Messenger fixtures for integration tests.
//!
//! [`MessengerPair`] wires a user and a system messenger to the same
//! in-memory hub and connects both, which is the setup nearly every
//! cross-daemon test starts from.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use twinwire_core::{
    ChannelSet, Envelope, MemoryHub, Messenger, MessengerConfig, MessengerEvent, MessengerHandle,
    Payload, Role,
};

/// A [`MessengerConfig`] with test credentials and short timeouts.
pub fn messenger_config(role: Role) -> MessengerConfig {
    MessengerConfig {
        role,
        channels: ChannelSet::default(),
        publish_key: "pub-test".to_string(),
        subscribe_key: "sub-test".to_string(),
        client_id: format!("{role}-test"),
        connect_timeout: Duration::from_secs(1),
        heartbeat_interval: Duration::from_secs(30),
        response_timeout: Duration::from_millis(500),
    }
}

/// Two connected messengers sharing one in-memory hub.
pub struct MessengerPair {
    pub hub: MemoryHub,
    pub user: MessengerHandle,
    pub user_events: mpsc::Receiver<MessengerEvent>,
    pub system: MessengerHandle,
    pub system_events: mpsc::Receiver<MessengerEvent>,
}

impl MessengerPair {
    /// Spawn and connect a user and a system messenger with default
    /// test configs.
    pub async fn connected() -> Self {
        Self::with_configs(
            messenger_config(Role::User),
            messenger_config(Role::System),
        )
        .await
    }

    /// Spawn and connect a pair with explicit configs, e.g. to shorten
    /// the heartbeat interval.
    pub async fn with_configs(user: MessengerConfig, system: MessengerConfig) -> Self {
        let hub = MemoryHub::new();
        let (user, user_events) = spawn_messenger(user, &hub).await;
        let (system, system_events) = spawn_messenger(system, &hub).await;
        Self {
            hub,
            user,
            user_events,
            system,
            system_events,
        }
    }
}

async fn spawn_messenger(
    config: MessengerConfig,
    hub: &MemoryHub,
) -> (MessengerHandle, mpsc::Receiver<MessengerEvent>) {
    let (transport, transport_rx) = hub.endpoint();
    let (messenger, handle, events) = Messenger::new(config, transport, transport_rx);
    tokio::spawn(messenger.run());
    handle.connect().await.expect("test messenger should connect");
    (handle, events)
}

/// Pull the next decoded message off an observer channel, skipping state
/// changes and errors. Panics after one second.
pub async fn next_message(events: &mut mpsc::Receiver<MessengerEvent>) -> Envelope {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .expect("expected a message within one second")
            .expect("observer channel closed while waiting for a message");
        if let MessengerEvent::Message(envelope) = event {
            return envelope;
        }
    }
}

/// Answer every incoming command with `reply` until the observer channel
/// closes. Returns the task so tests can await a clean shutdown.
///
/// `reply` gets the command verb and parameters; `Ok` becomes a success
/// response with its optional result string, `Err` a failure response.
pub fn spawn_responder<F>(
    handle: MessengerHandle,
    mut events: mpsc::Receiver<MessengerEvent>,
    role: Role,
    reply: F,
) -> JoinHandle<()>
where
    F: Fn(&str, Option<&HashMap<String, String>>) -> Result<Option<String>, String>
        + Send
        + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let MessengerEvent::Message(envelope) = event else {
                continue;
            };
            let Payload::Command {
                command,
                parameters,
                ..
            } = &envelope.payload
            else {
                continue;
            };
            let response = match reply(command, parameters.as_ref()) {
                Ok(result) => envelope.reply_ok(role, result),
                Err(message) => envelope.reply_err(role, message),
            };
            if handle.publish_envelope(response, None).await.is_err() {
                break;
            }
        }
    })
}
