//! Caller identity extraction.
//!
//! The authenticating front end terminates authentication and forwards the
//! caller as trusted headers, auth-proxy style. This service performs no
//! authorization of its own; it only derives the tenant scope.

use activity_core::identity::{EXTRA_PARENT_NAME, EXTRA_PARENT_TYPE};
use activity_core::{ActivityError, ActivityResult, CallerIdentity};
use actix_web::HttpRequest;

pub const HEADER_USER: &str = "x-remote-user";
pub const HEADER_UID: &str = "x-remote-uid";
pub const HEADER_GROUP: &str = "x-remote-group";
pub const HEADER_PARENT_TYPE: &str = "x-remote-extra-parent-type";
pub const HEADER_PARENT_NAME: &str = "x-remote-extra-parent-name";

/// Build the caller identity from request headers. A request that reached
/// us without a username is a front-end misconfiguration, not caller
/// error.
pub fn caller_from_request(req: &HttpRequest) -> ActivityResult<CallerIdentity> {
    let username = header(req, HEADER_USER).ok_or_else(|| {
        ActivityError::Internal("request reached the service without a caller identity".to_string())
    })?;

    let mut identity = CallerIdentity::new(username, header(req, HEADER_UID).unwrap_or_default());
    identity.groups = req
        .headers()
        .get_all(HEADER_GROUP)
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    if let Some(parent_type) = header(req, HEADER_PARENT_TYPE) {
        identity.extra.insert(EXTRA_PARENT_TYPE.to_string(), parent_type);
    }
    if let Some(parent_name) = header(req, HEADER_PARENT_NAME) {
        identity.extra.insert(EXTRA_PARENT_NAME.to_string(), parent_name);
    }
    Ok(identity)
}

fn header(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::{Scope, ScopeType};
    use actix_web::test::TestRequest;

    #[test]
    fn extracts_identity_and_scope_headers() {
        let req = TestRequest::default()
            .insert_header((HEADER_USER, "jane@example.com"))
            .insert_header((HEADER_UID, "u-42"))
            .insert_header((HEADER_GROUP, "developers"))
            .insert_header((HEADER_PARENT_TYPE, "Project"))
            .insert_header((HEADER_PARENT_NAME, "backend-api"))
            .to_http_request();
        let identity = caller_from_request(&req).unwrap();
        assert_eq!(identity.username, "jane@example.com");
        assert_eq!(identity.uid, "u-42");
        assert_eq!(identity.groups, vec!["developers"]);
        assert_eq!(
            Scope::resolve(&identity),
            Scope::new(ScopeType::Project, "backend-api")
        );
    }

    #[test]
    fn missing_username_is_internal() {
        let req = TestRequest::default().to_http_request();
        let err = caller_from_request(&req).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
