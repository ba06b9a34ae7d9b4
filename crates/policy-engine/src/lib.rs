//! Policy-driven activity translation.
//!
//! User-authored `ActivityPolicy` resources carry ordered `(match, summary)`
//! rules per target kind. This crate compiles them (with admission
//! validation and a Pending/Ready/Failed status machine), classifies
//! actors, renders summary templates with link extraction, and runs the
//! processor that consumes raw records from the message log and publishes
//! activities back to it.

pub mod actor;
pub mod compile;
pub mod engine;
pub mod metrics;
pub mod preview;
pub mod processor;
pub mod store;
pub mod template;

pub use actor::{change_source, classify_actor};
pub use compile::{compile_policy, reconcile_status, validate_policy, CompiledPolicy, CompiledRule, PolicySet};
pub use engine::Translator;
pub use metrics::PolicyMetrics;
pub use preview::{run_preview, PolicyPreview, PolicyPreviewSpec, PolicyPreviewStatus, PreviewResult};
pub use processor::Processor;
pub use store::PolicyStore;
pub use template::CompiledTemplate;
