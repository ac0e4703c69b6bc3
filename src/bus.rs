//! Message bus adapter.
//!
//! # Purpose
//! Publish and queue-subscribe primitives for the asynchronous side of the
//! gateway. Delivery is at-least-once from the consumer's point of view, so
//! every handler must be idempotent. Named queue groups guarantee that each
//! message reaches exactly one worker within a group, which is how worker
//! replicas share load.
use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub const SUBJECT_NAME_FETCH: &str = "svc.name.fetch";
pub const SUBJECT_RANKING_UPDATE: &str = "svc.ranking.update";
pub const GROUP_NAME_WORKERS: &str = "name-workers";
pub const GROUP_RANKING_WORKERS: &str = "ranking-workers";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connect failed: {0}")]
    Connect(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

pub type MessageStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Join `group` on `subject`; the returned stream yields message payloads
    /// one at a time. Messages published while no group member is subscribed
    /// are not replayed.
    async fn subscribe_queue(&self, subject: &str, group: &str) -> Result<MessageStream, BusError>;
}

/// NATS-backed bus. Reconnection is owned by the client library.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub async fn connect(url: &str, client_name: &str) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .name(client_name)
            .connection_timeout(CONNECT_TIMEOUT)
            .connect(url)
            .await
            .map_err(|err| BusError::Connect(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|err| BusError::Publish(err.to_string()))
    }

    async fn subscribe_queue(&self, subject: &str, group: &str) -> Result<MessageStream, BusError> {
        let subscriber = self
            .client
            .queue_subscribe(subject.to_string(), group.to_string())
            .await
            .map_err(|err| BusError::Subscribe(err.to_string()))?;
        Ok(Box::pin(subscriber.map(|message| message.payload.to_vec())))
    }
}

/// In-process bus for tests and single-process development. Queue-group
/// semantics collapse to "deliver to the first live subscriber per subject",
/// which matches production behaviour for a single worker replica.
#[derive(Default)]
pub struct MemoryBus {
    topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut topics = self.topics.lock().expect("bus lock");
        if let Some(senders) = topics.get_mut(subject) {
            senders.retain(|sender| !sender.is_closed());
            if let Some(sender) = senders.first() {
                let _ = sender.send(payload);
                return Ok(());
            }
        }
        // No subscriber yet: the message is dropped, as with a core pub/sub
        // subject on a real broker.
        Ok(())
    }

    async fn subscribe_queue(
        &self,
        subject: &str,
        _group: &str,
    ) -> Result<MessageStream, BusError> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        self.topics
            .lock()
            .expect("bus lock")
            .entry(subject.to_string())
            .or_default()
            .push(sender);
        Ok(Box::pin(futures::stream::poll_fn(move |cx| {
            receiver.poll_recv(cx)
        })))
    }
}
