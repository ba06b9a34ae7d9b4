//! Columnar store capabilities.
//!
//! The query plane depends on the narrow `RunQuery`/`RunFacetQuery`/ingest
//! traits; the Postgres backend implements all of them behind one pool.

pub mod error;
pub mod postgres;
pub mod query;

pub use error::StorageError;
pub use postgres::PostgresStore;
pub use query::{
    FacetQuery, FacetValue, GetActivity, GetEvent, IngestActivity, IngestAudit, IngestEvent,
    RecordKind, RecordQuery, RunFacetQuery, RunQuery,
};
