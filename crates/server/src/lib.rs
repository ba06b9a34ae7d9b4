//! Activity service HTTP server.
//!
//! REST-shaped dispatch for the `activity.miloapis.com/v1alpha1` resources:
//! list/get/watch for activities and events, CRUD for activity policies,
//! and the ephemeral query/facet/preview resources. Identity arrives from
//! the trusted front end as headers; everything else is validated here.

pub mod docs;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod rate_limit;
pub mod state;

pub use state::AppState;

/// Base path of the served API group.
pub const API_BASE: &str = "/apis/activity.miloapis.com/v1alpha1";
