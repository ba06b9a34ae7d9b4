//! The translation processor.
//!
//! Consumes raw records from the message log through durable pull
//! consumers (one per subscription, each single-threaded), translates them
//! against the current policy snapshot, publishes the resulting activities
//! back to the log, and persists them to the columnar store. The sequence
//! assigned at publish becomes the activity's `resourceVersion`.

use crate::compile::PolicySet;
use crate::engine::Translator;
use activity_core::{AuditRecord, EventRecord, OriginType};
use activity_storage::IngestActivity;
use message_log::{subject, Envelope, LogError, MessageLog};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const FETCH_BATCH: usize = 64;
const IDLE_POLL: Duration = Duration::from_millis(250);

pub struct Processor<L> {
    log: Arc<L>,
    sink: Arc<dyn IngestActivity>,
    policies: Arc<PolicySet>,
    translator: Arc<Translator>,
}

impl<L: MessageLog> Processor<L> {
    pub fn new(
        log: Arc<L>,
        sink: Arc<dyn IngestActivity>,
        policies: Arc<PolicySet>,
        translator: Arc<Translator>,
    ) -> Self {
        Self {
            log,
            sink,
            policies,
            translator,
        }
    }

    /// Consume raw audit records until shutdown.
    pub async fn run_audit(&self, shutdown: watch::Receiver<bool>) -> Result<(), LogError> {
        self.run_subscription(
            "activity-translator-audit",
            subject::AUDIT_SUBJECT,
            OriginType::Audit,
            shutdown,
        )
        .await
    }

    /// Consume observed events until shutdown.
    pub async fn run_events(&self, shutdown: watch::Receiver<bool>) -> Result<(), LogError> {
        self.run_subscription(
            "activity-translator-events",
            "events.>",
            OriginType::Event,
            shutdown,
        )
        .await
    }

    async fn run_subscription(
        &self,
        durable: &str,
        pattern: &str,
        origin: OriginType,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), LogError> {
        let consumer = self.log.pull_consumer(durable, pattern).await?;
        log::info!("processor {} consuming {}", durable, pattern);

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }
            let batch = tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                fetched = consumer.fetch(FETCH_BATCH) => fetched?,
            };
            if batch.is_empty() {
                tokio::select! {
                    _ = shutdown.changed() => return Ok(()),
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
                continue;
            }
            for envelope in batch {
                let sequence = envelope.sequence;
                self.process(origin, envelope).await;
                consumer.ack(sequence).await?;
            }
        }
    }

    /// Translate one envelope. Decode failures and downstream errors are
    /// logged and the message acked; evaluation is deterministic, so a
    /// redelivery would fail identically.
    async fn process(&self, origin: OriginType, envelope: Envelope) {
        let policies = self.policies.snapshot();
        let activities = match origin {
            OriginType::Audit => match serde_json::from_value::<AuditRecord>(envelope.payload) {
                Ok(record) => self.translator.translate_audit(&record, &policies),
                Err(e) => {
                    log::error!("undecodable audit record at sequence {}: {}", envelope.sequence, e);
                    return;
                }
            },
            OriginType::Event => match serde_json::from_value::<EventRecord>(envelope.payload) {
                Ok(record) => self.translator.translate_event(&record, &policies),
                Err(e) => {
                    log::error!("undecodable event at sequence {}: {}", envelope.sequence, e);
                    return;
                }
            },
        };

        for mut activity in activities {
            let subject_name = subject::activity_subject(
                &activity.spec.scope,
                activity.spec.origin.origin_type,
                &activity.spec.resource,
            );
            let payload = match serde_json::to_value(&activity) {
                Ok(payload) => payload,
                Err(e) => {
                    log::error!("activity {} failed to serialize: {}", activity.metadata.name, e);
                    continue;
                }
            };
            match self.log.publish(&subject_name, payload).await {
                Ok(sequence) => {
                    activity.metadata.resource_version = Some(sequence.to_string());
                }
                Err(e) => {
                    log::error!("publishing activity to {} failed: {}", subject_name, e);
                    continue;
                }
            }
            if let Err(e) = self.sink.ingest_activity(&activity).await {
                log::error!("persisting activity {} failed: {}", activity.metadata.name, e);
            }
        }
    }
}
