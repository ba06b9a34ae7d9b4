//! The ephemeral query plane.
//!
//! Validates query specs in a fixed order, compiles filters through the
//! shared cache, enforces tenant scope and window caps, executes against
//! the columnar store with limit+1 continuation detection, and issues
//! opaque fingerprint-bound cursors.

pub mod cursor;
pub mod engine;
pub mod facets;
pub mod metrics;
pub mod models;
pub mod selector;

pub use cursor::{CursorCodec, CursorPayload};
pub use engine::{scope_allows, EngineSettings, PageItem, QueryEngine, QueryKind, QueryPage};
pub use facets::{facet_whitelist, FacetResult};
pub use metrics::QueryMetrics;
pub use models::{
    ActivityQuery, ActivityQueryStatus, AuditLogQuery, AuditLogQueryStatus, EventQuery,
    EventQueryStatus, FacetQuerySpec, FacetQueryStatus, FacetRequest, FacetValueCount, ListParams,
    QuerySpec,
};
pub use selector::{FieldSelector, SelectorKind};
