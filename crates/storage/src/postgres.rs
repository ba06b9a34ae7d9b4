//! Postgres-backed columnar store.

use crate::error::StorageError;
use crate::query::{
    FacetQuery, FacetValue, GetActivity, GetEvent, IngestActivity, IngestAudit, IngestEvent,
    RecordKind, RecordQuery, RunFacetQuery, RunQuery,
};
use activity_core::{
    Activity, ActivityLink, ActivitySpec, Actor, ActorType, AuditRecord, AuditUser, ChangeSource,
    EventRecord, EventType, InvolvedObject, ObjectMeta, ObjectReference, Origin, OriginType,
    ResourceRef, ResponseStatus, Scope, ScopeType,
};
use activity_filter::{emit_with_offset, SqlParam};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Row};

/// Ingestion dedup window.
const DEDUP_WINDOW_MINUTES: i64 = 10;

/// Connect with bounded exponential backoff.
pub async fn init_pool(dsn: &str) -> Result<PgPool, StorageError> {
    let mut retries = 5;
    let mut delay = 1;

    loop {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(dsn)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if retries > 0 => {
                log::warn!(
                    "failed to connect to store ({} retries left): {}",
                    retries,
                    e
                );
                retries -= 1;
                tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                delay *= 2;
            }
            Err(e) => return Err(StorageError::Backend(e.to_string())),
        }
    }
}

/// Create the record tables and their sort/dedup indexes.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS audit_records (
            audit_id TEXT NOT NULL,
            request_received_timestamp TIMESTAMPTZ NOT NULL,
            scope_type TEXT NOT NULL,
            scope_name TEXT NOT NULL DEFAULT '',
            verb TEXT NOT NULL DEFAULT '',
            user_username TEXT NOT NULL DEFAULT '',
            user_uid TEXT NOT NULL DEFAULT '',
            user_email TEXT,
            object_api_group TEXT NOT NULL DEFAULT '',
            object_resource TEXT NOT NULL DEFAULT '',
            object_namespace TEXT NOT NULL DEFAULT '',
            object_name TEXT NOT NULL DEFAULT '',
            response_code INTEGER NOT NULL DEFAULT 0,
            payload JSONB,
            ingested_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS audit_records_sort
         ON audit_records (request_received_timestamp DESC, audit_id DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS audit_records_dedup
         ON audit_records (audit_id, ingested_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS event_records (
            id TEXT NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL,
            scope_type TEXT NOT NULL,
            scope_name TEXT NOT NULL DEFAULT '',
            involved_api_group TEXT NOT NULL DEFAULT '',
            involved_kind TEXT NOT NULL DEFAULT '',
            involved_namespace TEXT NOT NULL DEFAULT '',
            involved_name TEXT NOT NULL DEFAULT '',
            involved_uid TEXT NOT NULL DEFAULT '',
            reason TEXT NOT NULL DEFAULT '',
            event_type TEXT NOT NULL DEFAULT 'Normal',
            reporting_component TEXT NOT NULL DEFAULT '',
            message TEXT NOT NULL DEFAULT '',
            payload JSONB,
            ingested_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS event_records_sort
         ON event_records (timestamp DESC, id DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS activities (
            name TEXT NOT NULL,
            namespace TEXT NOT NULL DEFAULT '',
            resource_version BIGINT,
            created_at TIMESTAMPTZ,
            start_time TIMESTAMPTZ NOT NULL,
            end_time TIMESTAMPTZ,
            summary TEXT NOT NULL,
            change_source TEXT NOT NULL,
            actor_type TEXT NOT NULL,
            actor_name TEXT NOT NULL DEFAULT '',
            actor_email TEXT,
            actor_uid TEXT NOT NULL DEFAULT '',
            resource_api_group TEXT NOT NULL DEFAULT '',
            resource_kind TEXT NOT NULL DEFAULT '',
            resource_namespace TEXT NOT NULL DEFAULT '',
            resource_name TEXT NOT NULL DEFAULT '',
            resource_uid TEXT NOT NULL DEFAULT '',
            origin_type TEXT NOT NULL,
            origin_id TEXT NOT NULL,
            scope_type TEXT NOT NULL,
            scope_name TEXT NOT NULL DEFAULT '',
            links JSONB,
            ingested_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS activities_sort
         ON activities (start_time DESC, name DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS activities_lookup ON activities (namespace, name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(dsn: &str) -> Result<Self, StorageError> {
        let pool = init_pool(dsn).await?;
        ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn table_meta(kind: RecordKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        RecordKind::Audit => ("audit_records", "request_received_timestamp", "audit_id"),
        RecordKind::Event => ("event_records", "timestamp", "id"),
        RecordKind::Activity => ("activities", "start_time", "name"),
    }
}

/// Scope predicate columns differ per kind: user scope pins the actor UID
/// for audits and activities, and the scope annotation for events.
fn scope_condition(
    kind: RecordKind,
    scope: &Scope,
    next: &mut usize,
    params: &mut Vec<SqlParam>,
) -> Option<String> {
    if scope.is_platform() {
        return None;
    }
    if scope.scope_type == ScopeType::User {
        let column = match kind {
            RecordKind::Audit => "user_uid",
            RecordKind::Activity => "actor_uid",
            RecordKind::Event => {
                let cond = format!("scope_type = ${} AND scope_name = ${}", *next, *next + 1);
                params.push(SqlParam::Str("user".to_string()));
                params.push(SqlParam::Str(scope.name.clone()));
                *next += 2;
                return Some(cond);
            }
        };
        let cond = format!("{} = ${}", column, *next);
        params.push(SqlParam::Str(scope.name.clone()));
        *next += 1;
        return Some(cond);
    }
    let cond = format!("scope_type = ${} AND scope_name = ${}", *next, *next + 1);
    params.push(SqlParam::Str(scope.scope_type.as_str().to_string()));
    params.push(SqlParam::Str(scope.name.clone()));
    *next += 2;
    Some(cond)
}

fn build_select(kind: RecordKind, columns: &str, q: &RecordQuery) -> (String, Vec<SqlParam>) {
    let (table, ts_col, id_col) = table_meta(kind);
    let mut conds = Vec::new();
    let mut params = Vec::new();
    let mut next = 1usize;

    if let Some(cond) = scope_condition(kind, &q.scope, &mut next, &mut params) {
        conds.push(format!("({})", cond));
    }

    conds.push(format!("{} >= ${}", ts_col, next));
    params.push(SqlParam::Timestamp(q.start));
    next += 1;
    conds.push(format!("{} <= ${}", ts_col, next));
    params.push(SqlParam::Timestamp(q.end));
    next += 1;

    if let Some((ts, id)) = &q.after {
        conds.push(format!(
            "({}, {}) < (${}, ${})",
            ts_col,
            id_col,
            next,
            next + 1
        ));
        params.push(SqlParam::Timestamp(*ts));
        params.push(SqlParam::Str(id.clone()));
        next += 2;
    }

    if let Some(filter) = &q.filter {
        let fragment = emit_with_offset(filter, next);
        next += fragment.params.len();
        conds.push(format!("({})", fragment.where_clause));
        params.extend(fragment.params);
    }

    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} DESC, {} DESC LIMIT ${}",
        columns,
        table,
        conds.join(" AND "),
        ts_col,
        id_col,
        next
    );
    params.push(SqlParam::Int(q.limit));
    (sql, params)
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &[SqlParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Str(s) => query.bind(s.clone()),
            SqlParam::Int(n) => query.bind(*n),
            SqlParam::Bool(b) => query.bind(*b),
            SqlParam::Timestamp(t) => query.bind(*t),
        };
    }
    query
}

fn parse_scope_type(s: &str) -> ScopeType {
    match s {
        "organization" => ScopeType::Organization,
        "project" => ScopeType::Project,
        "user" => ScopeType::User,
        _ => ScopeType::Platform,
    }
}

fn parse_event_type(s: &str) -> EventType {
    match s {
        "Warning" => EventType::Warning,
        _ => EventType::Normal,
    }
}

fn parse_change_source(s: &str) -> ChangeSource {
    match s {
        "human" => ChangeSource::Human,
        _ => ChangeSource::System,
    }
}

fn change_source_to_string(source: ChangeSource) -> &'static str {
    match source {
        ChangeSource::Human => "human",
        ChangeSource::System => "system",
    }
}

fn parse_actor_type(s: &str) -> ActorType {
    match s {
        "user" => ActorType::User,
        "serviceaccount" => ActorType::ServiceAccount,
        "controller" => ActorType::Controller,
        _ => ActorType::Unknown,
    }
}

fn actor_type_to_string(actor_type: ActorType) -> &'static str {
    match actor_type {
        ActorType::User => "user",
        ActorType::ServiceAccount => "serviceaccount",
        ActorType::Controller => "controller",
        ActorType::Unknown => "unknown",
    }
}

fn parse_origin_type(s: &str) -> OriginType {
    match s {
        "event" => OriginType::Event,
        _ => OriginType::Audit,
    }
}

fn row_scope(row: &PgRow) -> Result<Scope, StorageError> {
    let scope_type: String = row.try_get("scope_type")?;
    let scope_name: String = row.try_get("scope_name")?;
    Ok(Scope::new(parse_scope_type(&scope_type), scope_name))
}

const AUDIT_COLUMNS: &str = "audit_id, request_received_timestamp, scope_type, scope_name, verb, \
     user_username, user_uid, user_email, object_api_group, object_resource, object_namespace, \
     object_name, response_code, payload";

fn audit_from_row(row: &PgRow) -> Result<AuditRecord, StorageError> {
    Ok(AuditRecord {
        audit_id: row.try_get("audit_id")?,
        request_received_timestamp: row.try_get("request_received_timestamp")?,
        scope: row_scope(row)?,
        verb: row.try_get("verb")?,
        user: AuditUser {
            username: row.try_get("user_username")?,
            uid: row.try_get("user_uid")?,
            email: row.try_get("user_email")?,
        },
        object_ref: ObjectReference {
            api_group: row.try_get("object_api_group")?,
            resource: row.try_get("object_resource")?,
            namespace: row.try_get("object_namespace")?,
            name: row.try_get("object_name")?,
        },
        response_status: ResponseStatus {
            code: row.try_get("response_code")?,
        },
        payload: row
            .try_get::<Option<serde_json::Value>, _>("payload")?
            .unwrap_or(serde_json::Value::Null),
    })
}

const EVENT_COLUMNS: &str = "id, timestamp, scope_type, scope_name, involved_api_group, \
     involved_kind, involved_namespace, involved_name, involved_uid, reason, event_type, \
     reporting_component, message, payload";

fn event_from_row(row: &PgRow) -> Result<EventRecord, StorageError> {
    let event_type: String = row.try_get("event_type")?;
    Ok(EventRecord {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        scope: row_scope(row)?,
        involved_object: InvolvedObject {
            api_group: row.try_get("involved_api_group")?,
            kind: row.try_get("involved_kind")?,
            namespace: row.try_get("involved_namespace")?,
            name: row.try_get("involved_name")?,
            uid: row.try_get("involved_uid")?,
        },
        reason: row.try_get("reason")?,
        event_type: parse_event_type(&event_type),
        reporting_component: row.try_get("reporting_component")?,
        message: row.try_get("message")?,
        payload: row
            .try_get::<Option<serde_json::Value>, _>("payload")?
            .unwrap_or(serde_json::Value::Null),
    })
}

const ACTIVITY_COLUMNS: &str = "name, namespace, resource_version, created_at, start_time, \
     end_time, summary, change_source, actor_type, actor_name, actor_email, actor_uid, \
     resource_api_group, resource_kind, resource_namespace, resource_name, resource_uid, \
     origin_type, origin_id, scope_type, scope_name, links";

fn activity_from_row(row: &PgRow) -> Result<Activity, StorageError> {
    let change_source: String = row.try_get("change_source")?;
    let actor_type: String = row.try_get("actor_type")?;
    let origin_type: String = row.try_get("origin_type")?;
    let links: Option<serde_json::Value> = row.try_get("links")?;
    let links: Vec<ActivityLink> = match links {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| StorageError::Decode(format!("links column: {}", e)))?,
        None => Vec::new(),
    };
    Ok(Activity {
        metadata: ObjectMeta {
            name: row.try_get("name")?,
            namespace: Some(row.try_get("namespace")?),
            uid: None,
            resource_version: row
                .try_get::<Option<i64>, _>("resource_version")?
                .map(|v| v.to_string()),
            creation_timestamp: row.try_get("created_at")?,
            generation: None,
        },
        spec: ActivitySpec {
            summary: row.try_get("summary")?,
            change_source: parse_change_source(&change_source),
            actor: Actor {
                actor_type: parse_actor_type(&actor_type),
                name: row.try_get("actor_name")?,
                email: row.try_get("actor_email")?,
                uid: row.try_get("actor_uid")?,
            },
            resource: ResourceRef {
                api_group: row.try_get("resource_api_group")?,
                kind: row.try_get("resource_kind")?,
                namespace: row.try_get("resource_namespace")?,
                name: row.try_get("resource_name")?,
                uid: row.try_get("resource_uid")?,
            },
            links,
            scope: row_scope(row)?,
            origin: Origin {
                origin_type: parse_origin_type(&origin_type),
                id: row.try_get("origin_id")?,
            },
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
        },
    })
}

#[async_trait]
impl RunQuery<AuditRecord> for PostgresStore {
    async fn run_query(&self, query: &RecordQuery) -> Result<Vec<AuditRecord>, StorageError> {
        let (sql, params) = build_select(RecordKind::Audit, AUDIT_COLUMNS, query);
        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(audit_from_row).collect()
    }
}

#[async_trait]
impl RunQuery<EventRecord> for PostgresStore {
    async fn run_query(&self, query: &RecordQuery) -> Result<Vec<EventRecord>, StorageError> {
        let (sql, params) = build_select(RecordKind::Event, EVENT_COLUMNS, query);
        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }
}

#[async_trait]
impl RunQuery<Activity> for PostgresStore {
    async fn run_query(&self, query: &RecordQuery) -> Result<Vec<Activity>, StorageError> {
        let (sql, params) = build_select(RecordKind::Activity, ACTIVITY_COLUMNS, query);
        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(activity_from_row).collect()
    }
}

#[async_trait]
impl RunFacetQuery for PostgresStore {
    async fn run_facet_query(
        &self,
        kind: RecordKind,
        query: &FacetQuery,
    ) -> Result<Vec<FacetValue>, StorageError> {
        let (table, ts_col, _) = table_meta(kind);
        let mut conds = Vec::new();
        let mut params = Vec::new();
        let mut next = 1usize;

        if let Some(cond) = scope_condition(kind, &query.scope, &mut next, &mut params) {
            conds.push(format!("({})", cond));
        }
        conds.push(format!("{} >= ${}", ts_col, next));
        params.push(SqlParam::Timestamp(query.start));
        next += 1;
        conds.push(format!("{} <= ${}", ts_col, next));
        params.push(SqlParam::Timestamp(query.end));
        next += 1;

        // The column comes from the static field schema, never from user
        // input directly.
        let sql = format!(
            "SELECT {col}::text AS facet_value, COUNT(*) AS facet_count FROM {table} \
             WHERE {conds} GROUP BY {col} ORDER BY facet_count DESC LIMIT ${limit}",
            col = query.column,
            table = table,
            conds = conds.join(" AND "),
            limit = next,
        );
        params.push(SqlParam::Int(query.limit));

        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(FacetValue {
                    value: row
                        .try_get::<Option<String>, _>("facet_value")?
                        .unwrap_or_default(),
                    count: row.try_get("facet_count")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl IngestAudit for PostgresStore {
    async fn ingest_audit(&self, record: &AuditRecord) -> Result<bool, StorageError> {
        let now = Utc::now();
        let window_floor = now - Duration::minutes(DEDUP_WINDOW_MINUTES);
        let result = sqlx::query(
            "INSERT INTO audit_records (audit_id, request_received_timestamp, scope_type, \
             scope_name, verb, user_username, user_uid, user_email, object_api_group, \
             object_resource, object_namespace, object_name, response_code, payload, ingested_at) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15 \
             WHERE NOT EXISTS (SELECT 1 FROM audit_records \
                               WHERE audit_id = $1 AND ingested_at > $16)",
        )
        .bind(&record.audit_id)
        .bind(record.request_received_timestamp)
        .bind(record.scope.scope_type.as_str())
        .bind(&record.scope.name)
        .bind(&record.verb)
        .bind(&record.user.username)
        .bind(&record.user.uid)
        .bind(&record.user.email)
        .bind(&record.object_ref.api_group)
        .bind(&record.object_ref.resource)
        .bind(&record.object_ref.namespace)
        .bind(&record.object_ref.name)
        .bind(record.response_status.code)
        .bind(&record.payload)
        .bind(now)
        .bind(window_floor)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl IngestEvent for PostgresStore {
    async fn ingest_event(&self, record: &EventRecord) -> Result<bool, StorageError> {
        let now = Utc::now();
        let window_floor = now - Duration::minutes(DEDUP_WINDOW_MINUTES);
        let result = sqlx::query(
            "INSERT INTO event_records (id, timestamp, scope_type, scope_name, \
             involved_api_group, involved_kind, involved_namespace, involved_name, involved_uid, \
             reason, event_type, reporting_component, message, payload, ingested_at) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15 \
             WHERE NOT EXISTS (SELECT 1 FROM event_records \
                               WHERE id = $1 AND ingested_at > $16)",
        )
        .bind(&record.id)
        .bind(record.timestamp)
        .bind(record.scope.scope_type.as_str())
        .bind(&record.scope.name)
        .bind(&record.involved_object.api_group)
        .bind(&record.involved_object.kind)
        .bind(&record.involved_object.namespace)
        .bind(&record.involved_object.name)
        .bind(&record.involved_object.uid)
        .bind(&record.reason)
        .bind(record.event_type.as_str())
        .bind(&record.reporting_component)
        .bind(&record.message)
        .bind(&record.payload)
        .bind(now)
        .bind(window_floor)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl IngestActivity for PostgresStore {
    async fn ingest_activity(&self, activity: &Activity) -> Result<bool, StorageError> {
        let now = Utc::now();
        let window_floor = now - Duration::minutes(DEDUP_WINDOW_MINUTES);
        let resource_version: Option<i64> = activity.sequence().map(|v| v as i64);
        let links = serde_json::to_value(&activity.spec.links)?;
        let spec = &activity.spec;
        let result = sqlx::query(
            "INSERT INTO activities (name, namespace, resource_version, created_at, start_time, \
             end_time, summary, change_source, actor_type, actor_name, actor_email, actor_uid, \
             resource_api_group, resource_kind, resource_namespace, resource_name, resource_uid, \
             origin_type, origin_id, scope_type, scope_name, links, ingested_at) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                    $18, $19, $20, $21, $22, $23 \
             WHERE NOT EXISTS (SELECT 1 FROM activities \
                               WHERE origin_type = $18 AND origin_id = $19 AND ingested_at > $24)",
        )
        .bind(&activity.metadata.name)
        .bind(activity.metadata.namespace.clone().unwrap_or_default())
        .bind(resource_version)
        .bind(activity.metadata.creation_timestamp)
        .bind(spec.start_time)
        .bind(spec.end_time)
        .bind(&spec.summary)
        .bind(change_source_to_string(spec.change_source))
        .bind(actor_type_to_string(spec.actor.actor_type))
        .bind(&spec.actor.name)
        .bind(&spec.actor.email)
        .bind(&spec.actor.uid)
        .bind(&spec.resource.api_group)
        .bind(&spec.resource.kind)
        .bind(&spec.resource.namespace)
        .bind(&spec.resource.name)
        .bind(&spec.resource.uid)
        .bind(spec.origin.origin_type.as_str())
        .bind(&spec.origin.id)
        .bind(spec.scope.scope_type.as_str())
        .bind(&spec.scope.name)
        .bind(links)
        .bind(now)
        .bind(window_floor)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl GetActivity for PostgresStore {
    async fn get_activity(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Activity>, StorageError> {
        let sql = format!(
            "SELECT {} FROM activities WHERE namespace = $1 AND name = $2 LIMIT 1",
            ACTIVITY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(namespace)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(activity_from_row).transpose()
    }
}

#[async_trait]
impl GetEvent for PostgresStore {
    async fn get_event(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<Option<EventRecord>, StorageError> {
        let sql = format!(
            "SELECT {} FROM event_records WHERE involved_namespace = $1 AND id = $2 LIMIT 1",
            EVENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(namespace)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_filter::{bind_boolean, parse, schema};
    use std::sync::Arc;

    fn base_query() -> RecordQuery {
        RecordQuery {
            scope: Scope::new(ScopeType::Project, "backend-api"),
            start: Utc::now() - Duration::hours(1),
            end: Utc::now(),
            filter: None,
            after: None,
            limit: 101,
        }
    }

    #[test]
    fn select_composes_scope_time_and_limit() {
        let (sql, params) = build_select(RecordKind::Audit, AUDIT_COLUMNS, &base_query());
        assert!(sql.contains("(scope_type = $1 AND scope_name = $2)"));
        assert!(sql.contains("request_received_timestamp >= $3"));
        assert!(sql.contains("request_received_timestamp <= $4"));
        assert!(sql.ends_with("ORDER BY request_received_timestamp DESC, audit_id DESC LIMIT $5"));
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn select_appends_cursor_position_and_filter() {
        let filter = Arc::new(
            bind_boolean(&parse("verb == 'create'").unwrap(), schema::audit()).unwrap(),
        );
        let mut query = base_query();
        query.after = Some((Utc::now(), "a-99".to_string()));
        query.filter = Some(filter);
        let (sql, params) = build_select(RecordKind::Audit, AUDIT_COLUMNS, &query);
        assert!(sql.contains("(request_received_timestamp, audit_id) < ($5, $6)"));
        assert!(sql.contains("(verb = $7)"));
        assert!(sql.ends_with("LIMIT $8"));
        assert_eq!(params.len(), 8);
    }

    #[test]
    fn user_scope_filters_on_actor_uid() {
        let mut query = base_query();
        query.scope = Scope::new(ScopeType::User, "u-42");
        let (sql, _) = build_select(RecordKind::Audit, AUDIT_COLUMNS, &query);
        assert!(sql.contains("(user_uid = $1)"));
        let (sql, _) = build_select(RecordKind::Activity, ACTIVITY_COLUMNS, &query);
        assert!(sql.contains("(actor_uid = $1)"));
    }

    #[test]
    fn platform_scope_adds_no_predicate() {
        let mut query = base_query();
        query.scope = Scope::platform();
        let (sql, params) = build_select(RecordKind::Event, EVENT_COLUMNS, &query);
        assert!(!sql.contains("scope_type"));
        assert_eq!(params.len(), 3);
    }
}
