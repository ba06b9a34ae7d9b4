//! Error taxonomy shared by every crate in the workspace.

use thiserror::Error;

/// Common error type for all activity service operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivityError {
    #[error("invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
}

/// Result type alias for activity service operations.
pub type ActivityResult<T> = Result<T, ActivityError>;

impl ActivityError {
    /// Validation or compilation failure attributed to one request field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ActivityError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Machine-readable reason enum carried in error responses.
    pub fn reason(&self) -> &'static str {
        match self {
            ActivityError::InvalidInput { .. } => "Invalid",
            ActivityError::NotFound(_) => "NotFound",
            ActivityError::Gone(_) => "Gone",
            ActivityError::ServiceUnavailable(_) => "ServiceUnavailable",
            ActivityError::Internal(_) => "InternalError",
            ActivityError::RateLimited { .. } => "TooManyRequests",
        }
    }

    /// HTTP status code the error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            ActivityError::InvalidInput { .. } => 422,
            ActivityError::NotFound(_) => 404,
            ActivityError::Gone(_) => 410,
            ActivityError::ServiceUnavailable(_) => 503,
            ActivityError::Internal(_) => 500,
            ActivityError::RateLimited { .. } => 429,
        }
    }
}

impl From<serde_json::Error> for ActivityError {
    fn from(err: serde_json::Error) -> Self {
        ActivityError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_carries_field_and_status() {
        let err = ActivityError::invalid("spec.startTime", "must be set");
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.reason(), "Invalid");
        assert!(err.to_string().contains("spec.startTime"));
    }

    #[test]
    fn gone_maps_to_410() {
        let err = ActivityError::Gone("resourceVersion 5 is out of retention".into());
        assert_eq!(err.status_code(), 410);
        assert_eq!(err.reason(), "Gone");
    }
}
