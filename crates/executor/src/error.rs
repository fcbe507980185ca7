use opsdeck_policy::SanitizerError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Remote execution not configured: {0}")]
    NotConfigured(String),

    #[error("Command not allowed: {0}")]
    Rejected(#[from] SanitizerError),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection timeout after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Command {id} timed out after {timeout:?}")]
    CommandTimeout { id: String, timeout: Duration },

    #[error("Command {id} failed: {error}")]
    CommandFailed { id: String, error: String },

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Command {0} cancelled")]
    Cancelled(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ExecutorError {
    fn from(e: serde_json::Error) -> Self {
        ExecutorError::Serialization(e.to_string())
    }
}
