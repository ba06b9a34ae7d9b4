//! Request handlers for every served resource.

pub mod activities;
pub mod events;
pub mod health;
pub mod policies;
pub mod queries;

use actix_web::{web, HttpResponse};
use tokio::sync::mpsc;
use watch_engine::WatchEvent;

/// Stream watch events to the client as newline-delimited JSON. The
/// response body ends when the engine closes the channel; dropping the
/// client connection drops the stream, which cancels the watch.
pub(crate) fn watch_response(rx: mpsc::Receiver<WatchEvent>) -> HttpResponse {
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let mut bytes = serde_json::to_vec(&event).unwrap_or_default();
        bytes.push(b'\n');
        Some((Ok::<_, actix_web::Error>(web::Bytes::from(bytes)), rx))
    });
    HttpResponse::Ok()
        .content_type("application/json")
        .streaming(stream)
}

/// `apiVersion` value for every served resource.
pub(crate) fn api_version() -> String {
    format!("{}/{}", activity_core::API_GROUP, activity_core::API_VERSION)
}

/// Common list/watch query parameters.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub field_selector: Option<String>,
    /// Filter-language expression; honored on watch streams.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default, rename = "continue")]
    pub continue_token: Option<String>,
    #[serde(default)]
    pub watch: Option<bool>,
    #[serde(default)]
    pub resource_version: Option<String>,
}

impl ListQuery {
    pub(crate) fn is_watch(&self) -> bool {
        self.watch.unwrap_or(false)
    }

    /// Merge a path namespace into the field selector so the rest of the
    /// pipeline sees a single vocabulary.
    pub(crate) fn selector_with_namespace(&self, namespace: Option<&str>) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(ns) = namespace {
            parts.push(format!("metadata.namespace={}", ns));
        }
        if let Some(selector) = &self.field_selector {
            if !selector.is_empty() {
                parts.push(selector.clone());
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(","))
        }
    }
}
