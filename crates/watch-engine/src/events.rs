//! Watch wire events, mirroring Kubernetes watch semantics.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Error,
    Bookmark,
}

/// One `(type, object)` tuple on a watch stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    #[schema(value_type = Object)]
    pub object: Value,
}

impl WatchEvent {
    pub fn added(object: Value) -> Self {
        Self {
            event_type: WatchEventType::Added,
            object,
        }
    }

    /// A bookmark carries only the resource version reached so far.
    pub fn bookmark(resource_version: u64) -> Self {
        Self {
            event_type: WatchEventType::Bookmark,
            object: json!({
                "metadata": {"resourceVersion": resource_version.to_string()}
            }),
        }
    }

    /// A terminal error carries a status document.
    pub fn error(code: u16, reason: &str, message: &str) -> Self {
        Self {
            event_type: WatchEventType::Error,
            object: json!({
                "kind": "Status",
                "status": "Failure",
                "code": code,
                "reason": reason,
                "message": message,
            }),
        }
    }

    /// `Gone`: the requested resourceVersion fell out of retention; the
    /// expected recovery is re-list then watch fresh.
    pub fn gone(message: &str) -> Self {
        Self::error(410, "Gone", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_serialize_in_kubernetes_shape() {
        let event = WatchEvent::added(json!({"metadata": {"name": "act-1"}}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "ADDED");
        assert_eq!(value["object"]["metadata"]["name"], "act-1");

        let gone = WatchEvent::gone("resourceVersion 5 is out of retention");
        let value = serde_json::to_value(&gone).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["object"]["code"], 410);
        assert_eq!(value["object"]["reason"], "Gone");
    }

    #[test]
    fn bookmarks_carry_only_the_version() {
        let value = serde_json::to_value(WatchEvent::bookmark(102)).unwrap();
        assert_eq!(value["type"], "BOOKMARK");
        assert_eq!(value["object"]["metadata"]["resourceVersion"], "102");
    }
}
