//! Authenticated caller identity, as provided by the upstream identity layer.

use std::collections::HashMap;

/// Extra attribute naming the tenant parent type (`Organization`, `Project`, `User`).
pub const EXTRA_PARENT_TYPE: &str = "iam.miloapis.com/parent-type";

/// Extra attribute naming the tenant parent; for users this is the stable UID.
pub const EXTRA_PARENT_NAME: &str = "iam.miloapis.com/parent-name";

/// Identity attached to every request by the authenticating front end.
///
/// The service trusts these attributes as-is; it performs no authorization of
/// its own beyond scope derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub username: String,
    pub uid: String,
    pub groups: Vec<String>,
    pub extra: HashMap<String, String>,
}

impl CallerIdentity {
    pub fn new(username: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            uid: uid.into(),
            groups: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Builder-style helper used heavily in tests.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}
