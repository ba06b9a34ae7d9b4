//! Compile-time and evaluation-time errors for the filter language.

use activity_core::ActivityError;
use thiserror::Error;

/// Errors raised while compiling an expression. All surface as 422 with the
/// offending request field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown field {path:?}")]
    UnknownField { path: String },

    #[error("unknown function {name:?}")]
    UnknownFunction { name: String },

    #[error("type mismatch on {path:?}: expected {expected}, got {got}")]
    TypeMismatch {
        path: String,
        expected: String,
        got: String,
    },

    #[error("filter expression must evaluate to a boolean")]
    NonBooleanResult,
}

impl FilterError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        FilterError::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Attribute the compile error to a request field.
    pub fn into_invalid(self, field: &str) -> ActivityError {
        ActivityError::invalid(field, self.to_string())
    }
}

/// Errors raised while evaluating a bound expression against a record.
/// These are runtime rule errors: the offending record is skipped, never
/// retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("field {path:?} is null")]
    NullField { path: String },

    #[error("field {path:?} has unexpected shape: {message}")]
    BadValue { path: String, message: String },
}
