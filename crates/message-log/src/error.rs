//! Message log errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("log unavailable: {0}")]
    Unavailable(String),

    #[error("consumer evicted after inactivity")]
    Evicted,

    #[error("sequence {requested} is below the retained floor {floor}")]
    OutOfRetention { requested: u64, floor: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LogError {
    fn from(err: serde_json::Error) -> Self {
        LogError::Serialization(err.to_string())
    }
}
