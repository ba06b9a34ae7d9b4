//! Narrow capability traits the query plane depends on, plus the shared
//! request shapes.

use crate::error::StorageError;
use activity_core::{Activity, AuditRecord, EventRecord, Scope};
use activity_filter::TypedExpr;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Which record family a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Audit,
    Event,
    Activity,
}

/// A compiled, scope-annotated record query. `after` carries the exclusive
/// continuation position decoded from a cursor; rows strictly older than it
/// (in the newest-first sort) are returned.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub scope: Scope,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub filter: Option<Arc<TypedExpr>>,
    pub after: Option<(DateTime<Utc>, String)>,
    pub limit: i64,
}

/// One facet aggregation request, already resolved to a store column.
#[derive(Debug, Clone)]
pub struct FacetQuery {
    pub scope: Scope,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub column: String,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetValue {
    pub value: String,
    pub count: i64,
}

/// Execute a compiled record query, newest first.
#[async_trait]
pub trait RunQuery<R>: Send + Sync {
    async fn run_query(&self, query: &RecordQuery) -> Result<Vec<R>, StorageError>;
}

/// Execute one distinct-value aggregation, ordered by count descending.
#[async_trait]
pub trait RunFacetQuery: Send + Sync {
    async fn run_facet_query(
        &self,
        kind: RecordKind,
        query: &FacetQuery,
    ) -> Result<Vec<FacetValue>, StorageError>;
}

/// Ingest one audit record; returns false when the record was dropped as a
/// duplicate inside the dedup window.
#[async_trait]
pub trait IngestAudit: Send + Sync {
    async fn ingest_audit(&self, record: &AuditRecord) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait IngestEvent: Send + Sync {
    async fn ingest_event(&self, record: &EventRecord) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait IngestActivity: Send + Sync {
    async fn ingest_activity(&self, activity: &Activity) -> Result<bool, StorageError>;
}

/// Single-activity lookup by namespace and name.
#[async_trait]
pub trait GetActivity: Send + Sync {
    async fn get_activity(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Activity>, StorageError>;
}

/// Single-event lookup by involved-object namespace and event ID.
#[async_trait]
pub trait GetEvent: Send + Sync {
    async fn get_event(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<Option<EventRecord>, StorageError>;
}
