//! Long-lived watch streams.
//!
//! Each watch call creates one ephemeral ordered consumer on the message
//! log, routed by a subject pattern derived from the caller's scope and
//! narrowing filters, then server-side-filters each decoded object before
//! forwarding. Delivery is in log sequence order and the sequence doubles
//! as the object's `resourceVersion`, so clients resume by presenting the
//! last version they saw.

pub mod events;
pub mod metrics;
pub mod pattern;
pub mod stream;

pub use events::{WatchEvent, WatchEventType};
pub use metrics::WatchMetrics;
pub use pattern::watch_pattern;
pub use stream::{WatchEngine, WatchParams, WatchResource};
