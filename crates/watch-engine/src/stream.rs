//! Per-connection watch streams.

use crate::events::WatchEvent;
use crate::metrics::WatchMetrics;
use crate::pattern::{watch_pattern, Narrowing};
use activity_core::{
    Activity, ActivityError, ActivityResult, CallerIdentity, EventRecord, Scope,
};
use activity_filter::{eval_bool, schema, FilterCache, TypedExpr};
use message_log::subject::group_kind;
use message_log::{LogError, MessageLog, OrderedConsumer, StartPolicy};
use query_engine::{scope_allows, FieldSelector, SelectorKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How often an otherwise idle stream re-asserts its position.
const BOOKMARK_INTERVAL: Duration = Duration::from_secs(60);

/// Per-stream delivery buffer; a client that stops draining eventually
/// pushes back into the consumer, which the log reclaims on inactivity.
const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchResource {
    Activities,
    Events,
}

impl WatchResource {
    fn prefix(&self) -> &'static str {
        match self {
            WatchResource::Activities => "activities",
            WatchResource::Events => "events",
        }
    }

    fn label(&self) -> &'static str {
        self.prefix()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WatchParams {
    pub resource_version: Option<String>,
    pub field_selector: Option<String>,
    pub filter: Option<String>,
    pub namespace: Option<String>,
}

pub struct WatchEngine<L> {
    log: Arc<L>,
    cache: Arc<FilterCache>,
    metrics: Arc<WatchMetrics>,
}

impl<L: MessageLog + 'static> WatchEngine<L> {
    pub fn new(log: Arc<L>, cache: Arc<FilterCache>, metrics: Arc<WatchMetrics>) -> Self {
        Self {
            log,
            cache,
            metrics,
        }
    }

    /// Open a watch stream. The returned receiver yields watch events until
    /// the caller drops it (cancellation), the consumer is evicted, or a
    /// terminal error is delivered.
    pub async fn watch(
        &self,
        resource: WatchResource,
        caller: &CallerIdentity,
        params: WatchParams,
    ) -> ActivityResult<mpsc::Receiver<WatchEvent>> {
        let scope = Scope::resolve(caller);

        let start_sequence = parse_resource_version(params.resource_version.as_deref())?;

        let selector_kind = match resource {
            WatchResource::Activities => SelectorKind::Activity,
            WatchResource::Events => SelectorKind::Event,
        };
        let selector = match &params.field_selector {
            Some(text) => FieldSelector::parse(selector_kind, text)?,
            None => FieldSelector::default(),
        };

        let filter = match &params.filter {
            Some(text) if !text.trim().is_empty() => {
                let filter_schema = match resource {
                    WatchResource::Activities => schema::activity(),
                    WatchResource::Events => schema::event(),
                };
                Some(
                    self.cache
                        .compile(filter_schema, text)
                        .map_err(|e| e.into_invalid("filter"))?,
                )
            }
            _ => None,
        };

        let narrowing = build_narrowing(resource, &params, &selector);
        let pattern = watch_pattern(resource.prefix(), &scope, &narrowing);
        let start = match start_sequence {
            Some(sequence) => StartPolicy::FromSequence(sequence),
            None => StartPolicy::Head,
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let consumer = match self.create_consumer(&pattern, start).await {
            Ok(consumer) => consumer,
            Err(LogError::OutOfRetention { requested, floor }) => {
                // Stale resumption point: tell the client to re-list.
                let _ = tx
                    .send(WatchEvent::gone(&format!(
                        "resourceVersion {} is older than the retained floor {}",
                        requested, floor
                    )))
                    .await;
                return Ok(rx);
            }
            Err(e) => {
                log::error!("watch consumer create on {} failed: {}", pattern, e);
                return Err(ActivityError::ServiceUnavailable(
                    "watch setup failed".to_string(),
                ));
            }
        };

        log::debug!("watch stream open on {} from {:?}", pattern, start);
        self.metrics.active_streams.inc();
        let stage = ServerStage {
            resource,
            scope,
            selector_predicate: selector.predicate,
            filter,
        };
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(pump(consumer, stage, tx, metrics, start_sequence.unwrap_or(0)));

        Ok(rx)
    }

    /// Transient log errors during setup get one automatic re-creation.
    async fn create_consumer(
        &self,
        pattern: &str,
        start: StartPolicy,
    ) -> Result<OrderedConsumer, LogError> {
        match self.log.ordered_consumer(pattern, start).await {
            Err(LogError::Unavailable(cause)) => {
                log::warn!("watch consumer create failed, retrying once: {}", cause);
                self.log.ordered_consumer(pattern, start).await
            }
            other => other,
        }
    }
}

/// The server-side filtering stage, applied after subject prefiltering.
struct ServerStage {
    resource: WatchResource,
    scope: Scope,
    selector_predicate: Option<TypedExpr>,
    filter: Option<Arc<TypedExpr>>,
}

impl ServerStage {
    /// Whether a decoded object may be forwarded to this stream.
    fn passes(&self, object: &Value) -> bool {
        match self.resource {
            WatchResource::Activities => {
                let activity: Activity = match serde_json::from_value(object.clone()) {
                    Ok(activity) => activity,
                    Err(e) => {
                        log::warn!("undecodable activity on watch stream: {}", e);
                        return false;
                    }
                };
                if !scope_allows(&self.scope, &activity) {
                    return false;
                }
            }
            WatchResource::Events => {
                let record: EventRecord = match serde_json::from_value(object.clone()) {
                    Ok(record) => record,
                    Err(e) => {
                        log::warn!("undecodable event on watch stream: {}", e);
                        return false;
                    }
                };
                if !self.scope.is_platform() && record.scope != self.scope {
                    return false;
                }
            }
        }

        if let Some(predicate) = &self.selector_predicate {
            if !eval_bool(predicate, object).unwrap_or(false) {
                return false;
            }
        }

        if let Some(filter) = &self.filter {
            // The filter schemas address record fields, which live under
            // `spec` for activities and at the top level for events.
            let env = match self.resource {
                WatchResource::Activities => object.get("spec").cloned().unwrap_or(Value::Null),
                WatchResource::Events => object.clone(),
            };
            if !eval_bool(filter, &env).unwrap_or(false) {
                return false;
            }
        }

        true
    }
}

async fn pump(
    mut consumer: OrderedConsumer,
    stage: ServerStage,
    tx: mpsc::Sender<WatchEvent>,
    metrics: Arc<WatchMetrics>,
    mut last_sequence: u64,
) {
    let mut bookmarks = tokio::time::interval(BOOKMARK_INTERVAL);
    bookmarks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Consume the immediate first tick.
    bookmarks.tick().await;

    loop {
        tokio::select! {
            delivered = consumer.recv() => match delivered {
                Some(envelope) => {
                    if !stage.passes(&envelope.payload) {
                        continue;
                    }
                    let mut object = envelope.payload;
                    stamp_resource_version(&mut object, envelope.sequence);
                    if tx.send(WatchEvent::added(object)).await.is_err() {
                        // Caller cancelled; dropping the consumer releases
                        // it for inactivity cleanup.
                        break;
                    }
                    last_sequence = envelope.sequence;
                    metrics
                        .delivered_total
                        .with_label_values(&[stage.resource.label()])
                        .inc();
                }
                None => {
                    // Consumer evicted (slow client) or the log went away.
                    let _ = tx
                        .send(WatchEvent::error(
                            503,
                            "ServiceUnavailable",
                            "watch consumer evicted; re-list and watch again",
                        ))
                        .await;
                    break;
                }
            },
            _ = bookmarks.tick() => {
                if last_sequence > 0
                    && tx.send(WatchEvent::bookmark(last_sequence)).await.is_err()
                {
                    break;
                }
            }
        }
    }
    metrics.active_streams.dec();
}

/// `resourceVersion` is the log sequence as an opaque decimal string; `0`,
/// empty and absent all mean "from the current head".
fn parse_resource_version(value: Option<&str>) -> ActivityResult<Option<u64>> {
    match value {
        None | Some("") | Some("0") => Ok(None),
        Some(text) => text.parse::<u64>().map(Some).map_err(|_| {
            ActivityError::invalid("resourceVersion", format!("{:?} is not a valid resourceVersion", text))
        }),
    }
}

fn stamp_resource_version(object: &mut Value, sequence: u64) {
    let Value::Object(map) = object else { return };
    let metadata = map
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    if let Value::Object(metadata) = metadata {
        metadata.insert(
            "resourceVersion".to_string(),
            Value::String(sequence.to_string()),
        );
    }
}

/// Fold pinned selector values into subject tokens, per tree shape.
fn build_narrowing(
    resource: WatchResource,
    params: &WatchParams,
    selector: &FieldSelector,
) -> Narrowing {
    let pin = |path: &str| -> Option<String> {
        selector
            .pins
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v.clone())
    };

    match resource {
        WatchResource::Events => {
            let kind = pin("involvedObject.kind");
            let api_group = pin("involvedObject.apiGroup");
            let group_kind_token = kind
                .as_deref()
                .map(|k| group_kind(api_group.as_deref().unwrap_or_default(), k));
            let namespace = params
                .namespace
                .clone()
                .or_else(|| pin("involvedObject.namespace"))
                .or_else(|| pin("metadata.namespace"));
            Narrowing {
                segments: vec![group_kind_token, namespace, pin("involvedObject.name")],
            }
        }
        WatchResource::Activities => {
            let namespace = params.namespace.clone().or_else(|| pin("metadata.namespace"));
            Narrowing {
                segments: vec![
                    pin("spec.resource.apiGroup"),
                    pin("spec.origin.type"),
                    pin("spec.resource.kind"),
                    namespace,
                    pin("metadata.name"),
                ],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::identity::{EXTRA_PARENT_NAME, EXTRA_PARENT_TYPE};
    use activity_core::{EventType, InvolvedObject, ScopeType};
    use chrono::Utc;
    use message_log::{subject, InMemoryLog};

    fn engine(log: Arc<InMemoryLog>) -> WatchEngine<InMemoryLog> {
        WatchEngine::new(
            log,
            Arc::new(FilterCache::default()),
            Arc::new(WatchMetrics::unregistered()),
        )
    }

    fn project_caller() -> CallerIdentity {
        CallerIdentity::new("jane", "u-42")
            .with_extra(EXTRA_PARENT_TYPE, "Project")
            .with_extra(EXTRA_PARENT_NAME, "backend-api")
    }

    fn event(name: &str, reason: &str, scope: Scope) -> (String, Value) {
        let record = EventRecord {
            id: format!("e-{}", name),
            timestamp: Utc::now(),
            scope: scope.clone(),
            involved_object: InvolvedObject {
                api_group: "apps".into(),
                kind: "Deployment".into(),
                namespace: "prod".into(),
                name: name.into(),
                uid: format!("o-{}", name),
            },
            reason: reason.into(),
            event_type: EventType::Normal,
            reporting_component: "kubelet".into(),
            message: "observed".into(),
            payload: Value::Null,
        };
        (
            subject::event_subject(&scope, &record.involved_object),
            serde_json::to_value(&record).unwrap(),
        )
    }

    fn project_scope() -> Scope {
        Scope::new(ScopeType::Project, "backend-api")
    }

    #[tokio::test]
    async fn resumes_from_resource_version_in_order() {
        let log = Arc::new(InMemoryLog::new());
        for name in ["a", "b", "c"] {
            let (subject_name, payload) = event(name, "Created", project_scope());
            log.publish(&subject_name, payload).await.unwrap();
        }

        let params = WatchParams {
            resource_version: Some("2".to_string()),
            ..Default::default()
        };
        let mut stream = engine(Arc::clone(&log))
            .watch(WatchResource::Events, &project_caller(), params)
            .await
            .unwrap();

        let first = stream.recv().await.unwrap();
        assert_eq!(first.object["metadata"]["resourceVersion"], "2");
        let second = stream.recv().await.unwrap();
        assert_eq!(second.object["metadata"]["resourceVersion"], "3");
        assert_eq!(second.object["involvedObject"]["name"], "c");
    }

    #[tokio::test]
    async fn stale_resource_version_yields_gone_and_closes() {
        let log = Arc::new(InMemoryLog::with_options(
            Duration::from_secs(30),
            16,
            2,
        ));
        for name in ["a", "b", "c", "d"] {
            let (subject_name, payload) = event(name, "Created", project_scope());
            log.publish(&subject_name, payload).await.unwrap();
        }

        let params = WatchParams {
            resource_version: Some("1".to_string()),
            ..Default::default()
        };
        let mut stream = engine(Arc::clone(&log))
            .watch(WatchResource::Events, &project_caller(), params)
            .await
            .unwrap();

        let only = stream.recv().await.unwrap();
        assert_eq!(only.event_type, crate::events::WatchEventType::Error);
        assert_eq!(only.object["code"], 410);
        assert!(stream.recv().await.is_none(), "stream should close after Gone");
    }

    #[tokio::test]
    async fn subject_routing_excludes_other_tenants() {
        let log = Arc::new(InMemoryLog::new());
        let (other_subject, other_payload) =
            event("x", "Created", Scope::new(ScopeType::Project, "frontend"));
        log.publish(&other_subject, other_payload).await.unwrap();
        let (own_subject, own_payload) = event("y", "Created", project_scope());
        log.publish(&own_subject, own_payload).await.unwrap();

        let params = WatchParams {
            resource_version: Some("1".to_string()),
            ..Default::default()
        };
        let mut stream = engine(Arc::clone(&log))
            .watch(WatchResource::Events, &project_caller(), params)
            .await
            .unwrap();

        let delivered = stream.recv().await.unwrap();
        assert_eq!(delivered.object["involvedObject"]["name"], "y");
    }

    #[tokio::test]
    async fn server_side_filter_drops_non_matching_objects() {
        let log = Arc::new(InMemoryLog::new());
        for (name, reason) in [("a", "Created"), ("b", "Killing"), ("c", "Created")] {
            let (subject_name, payload) = event(name, reason, project_scope());
            log.publish(&subject_name, payload).await.unwrap();
        }

        let params = WatchParams {
            resource_version: Some("1".to_string()),
            filter: Some("reason == 'Killing'".to_string()),
            ..Default::default()
        };
        let mut stream = engine(Arc::clone(&log))
            .watch(WatchResource::Events, &project_caller(), params)
            .await
            .unwrap();

        let delivered = stream.recv().await.unwrap();
        assert_eq!(delivered.object["involvedObject"]["name"], "b");
        assert_eq!(delivered.object["reason"], "Killing");
    }

    #[tokio::test]
    async fn bad_resource_version_is_invalid_input() {
        let log = Arc::new(InMemoryLog::new());
        let params = WatchParams {
            resource_version: Some("not-a-number".to_string()),
            ..Default::default()
        };
        let err = engine(log)
            .watch(WatchResource::Events, &project_caller(), params)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[tokio::test]
    async fn cancellation_is_dropping_the_receiver() {
        let log = Arc::new(InMemoryLog::new());
        let stream = engine(Arc::clone(&log))
            .watch(WatchResource::Events, &project_caller(), WatchParams::default())
            .await
            .unwrap();
        drop(stream);
        // Publishing after cancellation must not wedge the log.
        let (subject_name, payload) = event("z", "Created", project_scope());
        log.publish(&subject_name, payload).await.unwrap();
    }
}
