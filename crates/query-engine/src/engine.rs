//! Query validation and execution.

use crate::cursor::{fingerprint, CursorCodec};
use crate::facets::{resolve_facets, FacetResult};
use crate::metrics::QueryMetrics;
use crate::models::{FacetQuerySpec, ListParams, QuerySpec};
use crate::selector::{FieldSelector, SelectorKind};
use activity_core::time::{resolve, ResolvedTime};
use activity_core::{Activity, ActivityError, ActivityResult, AuditRecord, CallerIdentity, Config, EventRecord, Scope, ScopeType};
use activity_filter::{FilterCache, Schema, TypedExpr};
use activity_storage::{
    FacetQuery, GetActivity, GetEvent, RecordKind, RecordQuery, RunFacetQuery, RunQuery,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Engine limits and defaults, lifted from the service config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_query_window: Duration,
    pub max_page_size: i64,
    pub cursor_ttl: Duration,
    pub default_list_window: Duration,
    pub deadline: std::time::Duration,
    pub retry_backoff: std::time::Duration,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_query_window: config.max_query_window,
            max_page_size: config.max_page_size,
            cursor_ttl: config.cursor_ttl,
            default_list_window: config.default_list_window,
            deadline: config.request_deadline,
            retry_backoff: std::time::Duration::from_millis(100),
        }
    }
}

/// Sort-key access used for cursor construction.
pub trait PageItem {
    fn sort_timestamp(&self) -> DateTime<Utc>;
    fn sort_id(&self) -> &str;
}

impl PageItem for AuditRecord {
    fn sort_timestamp(&self) -> DateTime<Utc> {
        self.request_received_timestamp
    }
    fn sort_id(&self) -> &str {
        &self.audit_id
    }
}

impl PageItem for EventRecord {
    fn sort_timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn sort_id(&self) -> &str {
        &self.id
    }
}

impl PageItem for Activity {
    fn sort_timestamp(&self) -> DateTime<Utc> {
        self.spec.start_time
    }
    fn sort_id(&self) -> &str {
        &self.metadata.name
    }
}

/// One page of results plus the echoed effective window.
#[derive(Debug, Clone)]
pub struct QueryPage<R> {
    pub items: Vec<R>,
    pub continue_token: Option<String>,
    pub effective_start_time: DateTime<Utc>,
    pub effective_end_time: DateTime<Utc>,
}

/// Re-exported for call sites that dispatch on resource family.
pub type QueryKind = RecordKind;

pub struct QueryEngine {
    settings: EngineSettings,
    cache: Arc<FilterCache>,
    codec: CursorCodec,
    metrics: Arc<QueryMetrics>,
}

impl QueryEngine {
    pub fn new(settings: EngineSettings, cache: Arc<FilterCache>, metrics: Arc<QueryMetrics>) -> Self {
        let codec = CursorCodec::new(settings.cursor_ttl);
        Self {
            settings,
            cache,
            codec,
            metrics,
        }
    }

    pub fn codec(&self) -> &CursorCodec {
        &self.codec
    }

    /// Execute an ephemeral query resource (`create` verb).
    ///
    /// Validation order, stopping at the first violation: presence,
    /// parseability, ordering, window cap, limit, cursor, filter.
    pub async fn run_query<R>(
        &self,
        kind: RecordKind,
        resource: &'static str,
        store: &dyn RunQuery<R>,
        caller: &CallerIdentity,
        spec: &QuerySpec,
    ) -> ActivityResult<QueryPage<R>>
    where
        R: PageItem + Send,
    {
        let now = Utc::now();

        if spec.start_time.trim().is_empty() {
            return Err(ActivityError::invalid("spec.startTime", "startTime is required"));
        }
        if spec.end_time.trim().is_empty() {
            return Err(ActivityError::invalid("spec.endTime", "endTime is required"));
        }

        let start = resolve("spec.startTime", &spec.start_time, now)?;
        let end = resolve("spec.endTime", &spec.end_time, now)?;
        self.check_window(&start, &end)?;
        let limit = self.check_limit(spec.limit)?;

        let fp = fingerprint(&[
            ("resource", resource),
            ("startTime", &spec.start_time),
            ("endTime", &spec.end_time),
            ("filter", spec.filter.as_deref().unwrap_or_default()),
        ]);
        let after = match &spec.continue_token {
            Some(token) => Some(self.codec.decode(token, &fp, now)?.position()),
            None => None,
        };

        let filter = match &spec.filter {
            Some(text) if !text.trim().is_empty() => Some(
                self.cache
                    .compile(record_schema(kind), text)
                    .map_err(|e| e.into_invalid("spec.filter"))?,
            ),
            _ => None,
        };

        let scope = Scope::resolve(caller);
        self.execute_page(kind, resource, store, scope, start, end, filter, after, limit, &fp, now)
            .await
    }

    /// Execute a standard list verb over activities or events.
    ///
    /// Lists without explicit time bounds cover the default window ending
    /// at now; the time-valued activity field selectors narrow it.
    pub async fn run_list<R>(
        &self,
        kind: RecordKind,
        resource: &'static str,
        store: &dyn RunQuery<R>,
        caller: &CallerIdentity,
        params: &ListParams,
    ) -> ActivityResult<QueryPage<R>>
    where
        R: PageItem + Send,
    {
        let now = Utc::now();

        let selector_kind = match kind {
            RecordKind::Activity => SelectorKind::Activity,
            _ => SelectorKind::Event,
        };
        let selector = match &params.field_selector {
            Some(text) => FieldSelector::parse(selector_kind, text)?,
            None => FieldSelector::default(),
        };

        let end_at = selector.end_override.unwrap_or(now);
        let start_at = selector
            .start_override
            .unwrap_or(end_at - self.settings.default_list_window);
        let start = ResolvedTime {
            spec: start_at.to_rfc3339(),
            at: start_at,
        };
        let end = ResolvedTime {
            spec: end_at.to_rfc3339(),
            at: end_at,
        };
        if end.at <= start.at {
            return Err(ActivityError::invalid(
                "fieldSelector",
                "spec.endTime must be after spec.startTime",
            ));
        }
        let limit = self.check_limit(params.limit)?;

        let fp = fingerprint(&[
            ("resource", resource),
            ("verb", "list"),
            ("fieldSelector", params.field_selector.as_deref().unwrap_or_default()),
        ]);
        let after = match &params.continue_token {
            Some(token) => Some(self.codec.decode(token, &fp, now)?.position()),
            None => None,
        };

        let filter = selector.predicate.map(Arc::new);
        let scope = Scope::resolve(caller);
        self.execute_page(kind, resource, store, scope, start, end, filter, after, limit, &fp, now)
            .await
    }

    /// Single-activity lookup, scope-checked in memory.
    pub async fn get_activity(
        &self,
        store: &dyn GetActivity,
        caller: &CallerIdentity,
        namespace: &str,
        name: &str,
    ) -> ActivityResult<Activity> {
        let scope = Scope::resolve(caller);
        let found = store.get_activity(namespace, name).await.map_err(|e| {
            log::error!("activity lookup {}/{} failed: {}", namespace, name, e);
            ActivityError::from(e)
        })?;
        match found {
            Some(activity) if scope_allows(&scope, &activity) => Ok(activity),
            // Out-of-scope objects read as absent.
            _ => Err(ActivityError::NotFound(format!(
                "activities.{} {:?} not found",
                activity_core::API_GROUP,
                name
            ))),
        }
    }

    /// Single-event lookup; out-of-scope records read as absent.
    pub async fn get_event(
        &self,
        store: &dyn GetEvent,
        caller: &CallerIdentity,
        namespace: &str,
        id: &str,
    ) -> ActivityResult<EventRecord> {
        let scope = Scope::resolve(caller);
        let found = store.get_event(namespace, id).await.map_err(|e| {
            log::error!("event lookup {}/{} failed: {}", namespace, id, e);
            ActivityError::from(e)
        })?;
        match found {
            Some(record) if scope.is_platform() || record.scope == scope => Ok(record),
            _ => Err(ActivityError::NotFound(format!(
                "events.{} {:?} not found",
                activity_core::API_GROUP,
                id
            ))),
        }
    }

    /// Execute a facet query resource: one aggregation per requested field,
    /// ordered by count descending.
    pub async fn run_facets(
        &self,
        kind: RecordKind,
        resource: &'static str,
        store: &dyn RunFacetQuery,
        caller: &CallerIdentity,
        spec: &FacetQuerySpec,
    ) -> ActivityResult<(Vec<FacetResult>, ResolvedTime, ResolvedTime)> {
        let now = Utc::now();

        if spec.start_time.trim().is_empty() {
            return Err(ActivityError::invalid("spec.startTime", "startTime is required"));
        }
        if spec.end_time.trim().is_empty() {
            return Err(ActivityError::invalid("spec.endTime", "endTime is required"));
        }
        let start = resolve("spec.startTime", &spec.start_time, now)?;
        let end = resolve("spec.endTime", &spec.end_time, now)?;
        self.check_window(&start, &end)?;

        let resolved = resolve_facets(kind, spec)?;
        let scope = Scope::resolve(caller);
        self.metrics
            .queries_total
            .with_label_values(&[resource, scope.scope_type.as_str()])
            .inc();

        let timer = self
            .metrics
            .duration_seconds
            .with_label_values(&[resource])
            .start_timer();

        let mut results = Vec::with_capacity(resolved.len());
        for facet in &resolved {
            let query = FacetQuery {
                scope: scope.clone(),
                start: start.at,
                end: end.at,
                column: facet.column.clone(),
                limit: facet.limit,
            };
            let values = store.run_facet_query(kind, &query).await.map_err(|e| {
                log::error!(
                    "facet query on {} field {} failed: {}",
                    resource,
                    facet.field,
                    e
                );
                ActivityError::from(e)
            })?;
            results.push(FacetResult {
                field: facet.field.clone(),
                values: values
                    .into_iter()
                    .map(|v| crate::models::FacetValueCount {
                        value: v.value,
                        count: v.count,
                    })
                    .collect(),
            });
        }
        timer.observe_duration();

        Ok((results, start, end))
    }

    fn check_window(&self, start: &ResolvedTime, end: &ResolvedTime) -> ActivityResult<()> {
        if end.at <= start.at {
            return Err(ActivityError::invalid(
                "spec.endTime",
                "endTime must be strictly after startTime",
            ));
        }
        let range = end.at - start.at;
        if range > self.settings.max_query_window {
            return Err(ActivityError::invalid(
                "spec.endTime",
                format!(
                    "time range of {} exceeds the maximum query window of {}",
                    format_window(range),
                    format_window(self.settings.max_query_window)
                ),
            ));
        }
        Ok(())
    }

    /// `0` and absent both mean the default page size.
    fn check_limit(&self, limit: Option<i64>) -> ActivityResult<i64> {
        match limit {
            None | Some(0) => Ok(self.settings.max_page_size),
            Some(l) if l < 0 || l > self.settings.max_page_size => Err(ActivityError::invalid(
                "spec.limit",
                format!("limit must be between 0 and {}", self.settings.max_page_size),
            )),
            Some(l) => Ok(l),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_page<R>(
        &self,
        kind: RecordKind,
        resource: &'static str,
        store: &dyn RunQuery<R>,
        scope: Scope,
        start: ResolvedTime,
        end: ResolvedTime,
        filter: Option<Arc<TypedExpr>>,
        after: Option<(DateTime<Utc>, String)>,
        limit: i64,
        fp: &str,
        now: DateTime<Utc>,
    ) -> ActivityResult<QueryPage<R>>
    where
        R: PageItem + Send,
    {
        self.metrics
            .queries_total
            .with_label_values(&[resource, scope.scope_type.as_str()])
            .inc();
        self.metrics
            .lookback_hours
            .observe((now - start.at).num_minutes() as f64 / 60.0);
        self.metrics
            .range_hours
            .observe((end.at - start.at).num_minutes() as f64 / 60.0);

        let query = RecordQuery {
            scope,
            start: start.at,
            end: end.at,
            filter,
            after,
            // One extra row detects continuation.
            limit: limit + 1,
        };

        let timer = self
            .metrics
            .duration_seconds
            .with_label_values(&[resource])
            .start_timer();
        let mut rows = self.execute_with_retry(kind, resource, store, &query).await?;
        timer.observe_duration();

        let continue_token = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last()
                .map(|last| self.codec.issue(last.sort_timestamp(), last.sort_id(), fp, now))
        } else {
            None
        };

        self.metrics
            .result_count
            .with_label_values(&[resource])
            .observe(rows.len() as f64);

        Ok(QueryPage {
            items: rows,
            continue_token,
            effective_start_time: start.at,
            effective_end_time: end.at,
        })
    }

    /// At most two attempts: one idempotent retry on transient backend
    /// errors, each bounded by the request deadline. Causes are logged with
    /// the query shape and never surfaced.
    async fn execute_with_retry<R>(
        &self,
        kind: RecordKind,
        resource: &'static str,
        store: &dyn RunQuery<R>,
        query: &RecordQuery,
    ) -> ActivityResult<Vec<R>>
    where
        R: PageItem + Send,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match tokio::time::timeout(self.settings.deadline, store.run_query(query)).await {
                Err(_) => {
                    log::error!(
                        "{} query deadline exceeded (kind={:?} scope={} window={}..{})",
                        resource,
                        kind,
                        query.scope.scope_type.as_str(),
                        query.start,
                        query.end
                    );
                    return Err(ActivityError::ServiceUnavailable(
                        "query deadline exceeded".to_string(),
                    ));
                }
                Ok(Ok(rows)) => return Ok(rows),
                Ok(Err(e)) if e.is_transient() && attempts < 2 => {
                    log::warn!("{} query attempt {} failed, retrying: {}", resource, attempts, e);
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
                Ok(Err(e)) => {
                    log::error!(
                        "{} query failed (kind={:?} scope={} filtered={}): {}",
                        resource,
                        kind,
                        query.scope.scope_type.as_str(),
                        query.filter.is_some(),
                        e
                    );
                    return Err(e.into());
                }
            }
        }
    }
}

fn record_schema(kind: RecordKind) -> &'static Schema {
    match kind {
        RecordKind::Audit => activity_filter::schema::audit(),
        RecordKind::Event => activity_filter::schema::event(),
        RecordKind::Activity => activity_filter::schema::activity(),
    }
}

/// Whether a caller scope may see one activity: platform sees everything,
/// user scope pins the actor UID, tenant scopes compare the annotation.
pub fn scope_allows(scope: &Scope, activity: &Activity) -> bool {
    match scope.scope_type {
        ScopeType::Platform => true,
        ScopeType::User => activity.spec.actor.uid == scope.name,
        _ => activity.spec.scope == *scope,
    }
}

fn format_window(d: Duration) -> String {
    if d.num_days() > 0 && d == Duration::days(d.num_days()) {
        format!("{}d", d.num_days())
    } else if d.num_hours() > 0 && d == Duration::hours(d.num_hours()) {
        format!("{}h", d.num_hours())
    } else {
        format!("{}m", d.num_minutes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::identity::{EXTRA_PARENT_NAME, EXTRA_PARENT_TYPE};
    use activity_core::{AuditUser, ObjectReference, ResponseStatus};
    use activity_storage::StorageError;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn settings() -> EngineSettings {
        EngineSettings {
            max_query_window: Duration::days(7),
            max_page_size: 1000,
            cursor_ttl: Duration::hours(1),
            default_list_window: Duration::hours(1),
            deadline: std::time::Duration::from_secs(30),
            retry_backoff: std::time::Duration::from_millis(1),
        }
    }

    fn engine() -> QueryEngine {
        QueryEngine::new(
            settings(),
            Arc::new(FilterCache::default()),
            Arc::new(QueryMetrics::unregistered()),
        )
    }

    fn platform_caller() -> CallerIdentity {
        CallerIdentity::new("admin", "u-1")
    }

    fn record(n: usize, at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            audit_id: format!("a-{:04}", n),
            request_received_timestamp: at,
            scope: Scope::new(ScopeType::Project, "backend-api"),
            verb: "create".into(),
            user: AuditUser {
                username: "jane".into(),
                uid: "u-42".into(),
                email: None,
            },
            object_ref: ObjectReference::default(),
            response_status: ResponseStatus { code: 201 },
            payload: serde_json::Value::Null,
        }
    }

    /// Store stub honoring window, cursor position and limit over a
    /// newest-first record set.
    struct StubStore {
        records: Vec<AuditRecord>,
    }

    impl StubStore {
        fn with_records(count: usize) -> Self {
            let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            let mut records: Vec<_> = (0..count)
                .map(|n| record(n, base + Duration::seconds(n as i64)))
                .collect();
            records.sort_by(|a, b| {
                (b.request_received_timestamp, &b.audit_id)
                    .cmp(&(a.request_received_timestamp, &a.audit_id))
            });
            Self { records }
        }
    }

    #[async_trait]
    impl RunQuery<AuditRecord> for StubStore {
        async fn run_query(&self, query: &RecordQuery) -> Result<Vec<AuditRecord>, StorageError> {
            let rows = self
                .records
                .iter()
                .filter(|r| {
                    r.request_received_timestamp >= query.start
                        && r.request_received_timestamp <= query.end
                })
                .filter(|r| match &query.after {
                    Some((ts, id)) => {
                        (r.request_received_timestamp, r.audit_id.as_str()) < (*ts, id.as_str())
                    }
                    None => true,
                })
                .take(query.limit as usize)
                .cloned()
                .collect();
            Ok(rows)
        }
    }

    fn spec(start: &str, end: &str) -> QuerySpec {
        QuerySpec {
            start_time: start.into(),
            end_time: end.into(),
            filter: None,
            limit: None,
            continue_token: None,
        }
    }

    #[tokio::test]
    async fn window_cap_violation_names_the_time_range() {
        let store = StubStore::with_records(0);
        let err = engine()
            .run_query(
                RecordKind::Audit,
                "auditlogqueries",
                &store,
                &platform_caller(),
                &spec("2024-01-01T00:00:00Z", "2024-01-09T00:00:00Z"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().contains("time range of"), "got: {}", err);
    }

    #[tokio::test]
    async fn validation_stops_at_first_violation() {
        let store = StubStore::with_records(0);
        let e = engine();

        let err = e
            .run_query(RecordKind::Audit, "q", &store, &platform_caller(), &spec("", "now"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spec.startTime"));

        let err = e
            .run_query(
                RecordKind::Audit,
                "q",
                &store,
                &platform_caller(),
                &spec("nonsense", "now"),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spec.startTime"));

        let err = e
            .run_query(
                RecordKind::Audit,
                "q",
                &store,
                &platform_caller(),
                &spec("now", "now-1h"),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("strictly after"));

        let mut bad_limit = spec("now-1h", "now");
        bad_limit.limit = Some(5000);
        let err = e
            .run_query(RecordKind::Audit, "q", &store, &platform_caller(), &bad_limit)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spec.limit"));

        let mut bad_filter = spec("now-1h", "now");
        bad_filter.filter = Some("nosuch == 'x'".into());
        let err = e
            .run_query(RecordKind::Audit, "q", &store, &platform_caller(), &bad_filter)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nosuch"));
    }

    #[tokio::test]
    async fn paginates_to_completion_without_gaps_or_duplicates() {
        let store = StubStore::with_records(25);
        let e = engine();
        let caller = platform_caller();

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut s = spec("2024-05-31T00:00:00Z", "2024-06-02T00:00:00Z");
            s.limit = Some(10);
            s.continue_token = token.clone();
            let page = e
                .run_query(RecordKind::Audit, "auditlogqueries", &store, &caller, &s)
                .await
                .unwrap();
            assert!(page.items.len() <= 10);
            seen.extend(page.items.iter().map(|r| r.audit_id.clone()));
            match page.continue_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 25);
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 25, "duplicates in pagination");
        // Newest first across the whole walk.
        let mut sorted = seen.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(seen, sorted);
    }

    #[tokio::test]
    async fn cursor_from_a_different_query_is_rejected() {
        let store = StubStore::with_records(15);
        let e = engine();
        let caller = platform_caller();

        let mut s = spec("2024-05-31T00:00:00Z", "2024-06-02T00:00:00Z");
        s.limit = Some(5);
        let page = e
            .run_query(RecordKind::Audit, "auditlogqueries", &store, &caller, &s)
            .await
            .unwrap();
        let token = page.continue_token.unwrap();

        let mut changed = spec("2024-05-31T00:00:00Z", "2024-06-02T00:00:00Z");
        changed.limit = Some(5);
        changed.filter = Some("verb == 'delete'".into());
        changed.continue_token = Some(token);
        let err = e
            .run_query(RecordKind::Audit, "auditlogqueries", &store, &caller, &changed)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cursor parameters changed"));
    }

    #[tokio::test]
    async fn changing_only_the_limit_keeps_the_cursor_valid() {
        let store = StubStore::with_records(15);
        let e = engine();
        let caller = platform_caller();

        let mut s = spec("2024-05-31T00:00:00Z", "2024-06-02T00:00:00Z");
        s.limit = Some(5);
        let page = e
            .run_query(RecordKind::Audit, "auditlogqueries", &store, &caller, &s)
            .await
            .unwrap();

        let mut next = s.clone();
        next.limit = Some(7);
        next.continue_token = page.continue_token;
        assert!(e
            .run_query(RecordKind::Audit, "auditlogqueries", &store, &caller, &next)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn transient_backend_errors_retry_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct FlakyStore {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl RunQuery<AuditRecord> for FlakyStore {
            async fn run_query(&self, _q: &RecordQuery) -> Result<Vec<AuditRecord>, StorageError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StorageError::Backend("connection reset".into()))
                } else {
                    Ok(Vec::new())
                }
            }
        }

        let store = FlakyStore { calls: AtomicUsize::new(0) };
        let page = engine()
            .run_query(
                RecordKind::Audit,
                "auditlogqueries",
                &store,
                &platform_caller(),
                &spec("now-1h", "now"),
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_backend_errors_surface_as_unavailable() {
        struct DownStore;

        #[async_trait]
        impl RunQuery<AuditRecord> for DownStore {
            async fn run_query(&self, _q: &RecordQuery) -> Result<Vec<AuditRecord>, StorageError> {
                Err(StorageError::Backend("connection refused".into()))
            }
        }

        let err = engine()
            .run_query(
                RecordKind::Audit,
                "auditlogqueries",
                &DownStore,
                &platform_caller(),
                &spec("now-1h", "now"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
        // The concrete cause stays internal.
        assert!(!err.to_string().contains("connection refused"));
    }

    #[test]
    fn scope_allows_follows_tenant_rules() {
        let caller = CallerIdentity::new("jane", "u-42")
            .with_extra(EXTRA_PARENT_TYPE, "Project")
            .with_extra(EXTRA_PARENT_NAME, "backend-api");
        let scope = Scope::resolve(&caller);

        let mut activity = Activity {
            metadata: activity_core::ObjectMeta::namespaced("act-1", "default"),
            spec: activity_core::ActivitySpec {
                summary: "s".into(),
                change_source: activity_core::ChangeSource::Human,
                actor: activity_core::Actor {
                    actor_type: activity_core::ActorType::User,
                    name: "jane".into(),
                    email: None,
                    uid: "u-42".into(),
                },
                resource: activity_core::ResourceRef::default(),
                links: Vec::new(),
                scope: Scope::new(ScopeType::Project, "backend-api"),
                origin: activity_core::Origin {
                    origin_type: activity_core::OriginType::Audit,
                    id: "a-1".into(),
                },
                start_time: Utc::now(),
                end_time: None,
            },
        };

        assert!(scope_allows(&scope, &activity));
        activity.spec.scope = Scope::new(ScopeType::Project, "other");
        assert!(!scope_allows(&scope, &activity));
        assert!(scope_allows(&Scope::platform(), &activity));
        assert!(scope_allows(&Scope::new(ScopeType::User, "u-42"), &activity));
        assert!(!scope_allows(&Scope::new(ScopeType::User, "u-9"), &activity));
    }
}
