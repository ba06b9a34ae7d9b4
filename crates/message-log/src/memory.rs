//! In-memory message log backend.
//!
//! Single-process stand-in for the managed log used by tests and local
//! runs. Carries the full consumer semantics: monotonic sequences, bounded
//! retention, replay-then-live ordered consumers with inactivity eviction,
//! and durable pull cursors with redelivery of unacked messages.

use crate::bus::{Envelope, MessageLog, OrderedConsumer, PullConsumer, StartPolicy};
use crate::error::LogError;
use crate::subject;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

const LIVE_CHANNEL_CAPACITY: usize = 1024;

struct LogState {
    messages: VecDeque<Envelope>,
    next_sequence: u64,
    /// Durable name -> next sequence to deliver.
    durables: HashMap<String, u64>,
}

struct Inner {
    state: Mutex<LogState>,
    live: broadcast::Sender<Envelope>,
    inactivity: Duration,
    consumer_buffer: usize,
    max_retained: usize,
}

#[derive(Clone)]
pub struct InMemoryLog {
    inner: Arc<Inner>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::with_options(Duration::from_secs(30), 256, 8192)
    }

    /// `inactivity` is how long an undrained consumer may block delivery
    /// before it is reclaimed; `consumer_buffer` is the per-consumer
    /// channel capacity; `max_retained` bounds the retention window.
    pub fn with_options(inactivity: Duration, consumer_buffer: usize, max_retained: usize) -> Self {
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(LogState {
                    messages: VecDeque::new(),
                    next_sequence: 1,
                    durables: HashMap::new(),
                }),
                live,
                inactivity,
                consumer_buffer,
                max_retained,
            }),
        }
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageLog for InMemoryLog {
    async fn publish(&self, subject_name: &str, payload: Value) -> Result<u64, LogError> {
        let envelope = {
            let mut state = self.inner.state.lock().unwrap();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            let envelope = Envelope {
                subject: subject_name.to_string(),
                sequence,
                published_at: Utc::now(),
                payload,
            };
            state.messages.push_back(envelope.clone());
            while state.messages.len() > self.inner.max_retained {
                state.messages.pop_front();
            }
            envelope
        };
        let sequence = envelope.sequence;
        // No live consumers is fine.
        let _ = self.inner.live.send(envelope);
        Ok(sequence)
    }

    async fn ordered_consumer(
        &self,
        pattern: &str,
        start: StartPolicy,
    ) -> Result<OrderedConsumer, LogError> {
        // Subscribe before snapshotting so nothing published in between is
        // lost; the forwarder dedupes on sequence.
        let mut live = self.inner.live.subscribe();
        let replay: Vec<Envelope> = {
            let state = self.inner.state.lock().unwrap();
            match start {
                StartPolicy::Head => Vec::new(),
                StartPolicy::FromSequence(requested) => {
                    let floor = state
                        .messages
                        .front()
                        .map(|m| m.sequence)
                        .unwrap_or(state.next_sequence);
                    if requested < floor {
                        return Err(LogError::OutOfRetention { requested, floor });
                    }
                    state
                        .messages
                        .iter()
                        .filter(|m| m.sequence >= requested)
                        .filter(|m| subject::matches(pattern, &m.subject))
                        .cloned()
                        .collect()
                }
            }
        };

        let (tx, rx) = mpsc::channel(self.inner.consumer_buffer);
        let pattern = pattern.to_string();
        let inactivity = self.inner.inactivity;

        tokio::spawn(async move {
            let mut last_delivered = 0u64;
            for envelope in replay {
                let sequence = envelope.sequence;
                if tx.send_timeout(envelope, inactivity).await.is_err() {
                    return;
                }
                last_delivered = sequence;
            }
            loop {
                match live.recv().await {
                    Ok(envelope) => {
                        if envelope.sequence <= last_delivered
                            || !subject::matches(&pattern, &envelope.subject)
                        {
                            continue;
                        }
                        let sequence = envelope.sequence;
                        if tx.send_timeout(envelope, inactivity).await.is_err() {
                            // Receiver dropped or failed to drain within the
                            // inactivity threshold: the consumer is reclaimed.
                            return;
                        }
                        last_delivered = sequence;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!(
                            "ordered consumer on {} lagged by {} messages, evicting",
                            pattern,
                            skipped
                        );
                        return;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(OrderedConsumer::new(rx))
    }

    async fn pull_consumer(
        &self,
        durable_name: &str,
        pattern: &str,
    ) -> Result<Box<dyn PullConsumer>, LogError> {
        {
            let mut state = self.inner.state.lock().unwrap();
            let floor = state
                .messages
                .front()
                .map(|m| m.sequence)
                .unwrap_or(state.next_sequence);
            state
                .durables
                .entry(durable_name.to_string())
                .or_insert(floor);
        }
        Ok(Box::new(MemoryPullConsumer {
            inner: Arc::clone(&self.inner),
            durable_name: durable_name.to_string(),
            pattern: pattern.to_string(),
        }))
    }

    async fn first_sequence(&self) -> Result<u64, LogError> {
        let state = self.inner.state.lock().unwrap();
        Ok(state
            .messages
            .front()
            .map(|m| m.sequence)
            .unwrap_or(state.next_sequence))
    }

    async fn last_sequence(&self) -> Result<u64, LogError> {
        let state = self.inner.state.lock().unwrap();
        Ok(state.next_sequence - 1)
    }
}

struct MemoryPullConsumer {
    inner: Arc<Inner>,
    durable_name: String,
    pattern: String,
}

#[async_trait]
impl PullConsumer for MemoryPullConsumer {
    async fn fetch(&self, batch: usize) -> Result<Vec<Envelope>, LogError> {
        let state = self.inner.state.lock().unwrap();
        let cursor = state
            .durables
            .get(&self.durable_name)
            .copied()
            .unwrap_or_default();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.sequence >= cursor)
            .filter(|m| subject::matches(&self.pattern, &m.subject))
            .take(batch)
            .cloned()
            .collect())
    }

    async fn ack(&self, sequence: u64) -> Result<(), LogError> {
        let mut state = self.inner.state.lock().unwrap();
        let entry = state
            .durables
            .entry(self.durable_name.clone())
            .or_default();
        if sequence + 1 > *entry {
            *entry = sequence + 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_assigns_monotonic_sequences() {
        let log = InMemoryLog::new();
        assert_eq!(log.publish("audit.records", json!({"n": 1})).await.unwrap(), 1);
        assert_eq!(log.publish("audit.records", json!({"n": 2})).await.unwrap(), 2);
        assert_eq!(log.last_sequence().await.unwrap(), 2);
        assert_eq!(log.first_sequence().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ordered_consumer_replays_then_goes_live() {
        let log = InMemoryLog::new();
        for n in 0..3 {
            log.publish("events.project.p.Pod._._", json!({"n": n}))
                .await
                .unwrap();
        }
        let mut consumer = log
            .ordered_consumer("events.>", StartPolicy::FromSequence(2))
            .await
            .unwrap();
        assert_eq!(consumer.recv().await.unwrap().sequence, 2);
        assert_eq!(consumer.recv().await.unwrap().sequence, 3);

        log.publish("events.project.p.Pod._._", json!({"n": 3}))
            .await
            .unwrap();
        assert_eq!(consumer.recv().await.unwrap().sequence, 4);
    }

    #[tokio::test]
    async fn ordered_consumer_is_a_stream() {
        use futures::StreamExt;

        let log = InMemoryLog::new();
        for n in 0..2 {
            log.publish("events.a.b.c._._", json!({"n": n})).await.unwrap();
        }
        let consumer = log
            .ordered_consumer("events.>", StartPolicy::FromSequence(1))
            .await
            .unwrap();
        let collected: Vec<_> = consumer.take(2).collect().await;
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].sequence, 1);
        assert_eq!(collected[1].sequence, 2);
    }

    #[tokio::test]
    async fn head_start_skips_history() {
        let log = InMemoryLog::new();
        log.publish("events.a.b.c._._", json!({})).await.unwrap();
        let mut consumer = log
            .ordered_consumer("events.>", StartPolicy::Head)
            .await
            .unwrap();
        log.publish("events.a.b.c._._", json!({})).await.unwrap();
        assert_eq!(consumer.recv().await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn sequences_below_retention_floor_are_rejected() {
        let log = InMemoryLog::with_options(Duration::from_secs(30), 16, 2);
        for n in 0..5 {
            log.publish("events.a.b.c._._", json!({"n": n})).await.unwrap();
        }
        // Retention holds the last two messages only.
        let err = log
            .ordered_consumer("events.>", StartPolicy::FromSequence(1))
            .await
            .unwrap_err();
        assert_eq!(err, LogError::OutOfRetention { requested: 1, floor: 4 });
    }

    #[tokio::test]
    async fn subject_pattern_prefilters_delivery() {
        let log = InMemoryLog::new();
        log.publish("events.project.a.Pod._._", json!({"keep": false}))
            .await
            .unwrap();
        log.publish("events.project.b.Pod._._", json!({"keep": true}))
            .await
            .unwrap();
        let mut consumer = log
            .ordered_consumer("events.project.b.>", StartPolicy::FromSequence(1))
            .await
            .unwrap();
        let envelope = consumer.recv().await.unwrap();
        assert_eq!(envelope.payload["keep"], true);
    }

    #[tokio::test]
    async fn pull_consumer_redelivers_until_acked() {
        let log = InMemoryLog::new();
        log.publish("audit.records", json!({"n": 1})).await.unwrap();
        log.publish("audit.records", json!({"n": 2})).await.unwrap();

        let consumer = log.pull_consumer("translator", "audit.>").await.unwrap();
        let first = consumer.fetch(10).await.unwrap();
        assert_eq!(first.len(), 2);

        // Nothing acked: the same batch comes back.
        let again = consumer.fetch(10).await.unwrap();
        assert_eq!(again.len(), 2);

        consumer.ack(1).await.unwrap();
        let rest = consumer.fetch(10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].sequence, 2);
    }

    #[tokio::test]
    async fn slow_consumer_is_evicted() {
        let log = InMemoryLog::with_options(Duration::from_millis(20), 1, 1024);
        let mut consumer = log
            .ordered_consumer("events.>", StartPolicy::Head)
            .await
            .unwrap();
        // Fill the buffer and then some without draining.
        for n in 0..8 {
            log.publish("events.a.b.c._._", json!({"n": n})).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(120)).await;
        // One buffered message may arrive, then the channel closes.
        let mut received = 0;
        while consumer.recv().await.is_some() {
            received += 1;
        }
        assert!(received <= 2, "evicted consumer received {}", received);
    }
}
