//! Message log interface.

use crate::error::LogError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One message as delivered to consumers. The sequence number is assigned
/// at publish, monotonic across the whole log, and reused by the API layer
/// as `resourceVersion`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub subject: String,
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    pub payload: Value,
}

/// Where an ordered consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
    /// Only messages published after the consumer is created.
    Head,
    /// Replay from this sequence (inclusive), then go live.
    FromSequence(u64),
}

/// Ephemeral ordered consumer: no durable name, no acks, no redelivery.
/// Dropped consumers are reclaimed by the log after its inactivity
/// threshold; a consumer whose receiver stops draining is evicted the same
/// way and the channel simply closes.
#[derive(Debug)]
pub struct OrderedConsumer {
    receiver: mpsc::Receiver<Envelope>,
}

impl OrderedConsumer {
    pub fn new(receiver: mpsc::Receiver<Envelope>) -> Self {
        Self { receiver }
    }

    /// Next message in sequence order; `None` once the consumer is evicted
    /// or the log shuts down.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }
}

/// Consumers are also plain streams, for call sites that compose rather
/// than loop.
impl Stream for OrderedConsumer {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Durable pull consumer for processors. Progress is tracked server-side
/// under the durable name; messages fetched but not acked are redelivered
/// to the next fetch.
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Fetch up to `batch` messages at the durable cursor.
    async fn fetch(&self, batch: usize) -> Result<Vec<Envelope>, LogError>;

    /// Acknowledge everything up to and including `sequence`.
    async fn ack(&self, sequence: u64) -> Result<(), LogError>;
}

/// The durable message log.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Publish a payload, returning the assigned sequence number.
    async fn publish(&self, subject: &str, payload: Value) -> Result<u64, LogError>;

    /// Create an ephemeral ordered consumer over subjects matching
    /// `pattern`. `StartPolicy::FromSequence` below the retained floor is
    /// an `OutOfRetention` error.
    async fn ordered_consumer(
        &self,
        pattern: &str,
        start: StartPolicy,
    ) -> Result<OrderedConsumer, LogError>;

    /// Create or resume a durable pull consumer.
    async fn pull_consumer(
        &self,
        durable_name: &str,
        pattern: &str,
    ) -> Result<Box<dyn PullConsumer>, LogError>;

    /// Lowest sequence still retained; `last + 1` when the log is empty.
    async fn first_sequence(&self) -> Result<u64, LogError>;

    /// Highest sequence assigned so far; 0 when nothing was published.
    async fn last_sequence(&self) -> Result<u64, LogError>;
}
