use opsdeck_catalog::ParamError;
use opsdeck_executor::ExecutorError;
use opsdeck_policy::{Role, SanitizerError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Role {role} may not run {command}")]
    InsufficientPermission { command: String, role: Role },

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Required parameter missing: {0}")]
    MissingParameter(String),

    #[error("Invalid value for parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("Action failed: {0}")]
    Action(String),
}

impl DispatchError {
    /// Authorization and validation failures, as opposed to execution
    /// failures after the command was admitted.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            DispatchError::CommandNotFound(_)
                | DispatchError::InsufficientPermission { .. }
                | DispatchError::UnknownRole(_)
                | DispatchError::MissingParameter(_)
                | DispatchError::InvalidParameter { .. }
                | DispatchError::Executor(ExecutorError::Rejected(_))
        )
    }

    pub fn sanitizer_error(&self) -> Option<&SanitizerError> {
        match self {
            DispatchError::Executor(ExecutorError::Rejected(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<ParamError> for DispatchError {
    fn from(e: ParamError) -> Self {
        match e {
            ParamError::Missing(name) => DispatchError::MissingParameter(name),
            ParamError::Invalid { name, reason } => DispatchError::InvalidParameter { name, reason },
        }
    }
}

/// Failure reported by an in-process action handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ActionError> for DispatchError {
    fn from(e: ActionError) -> Self {
        DispatchError::Action(e.0)
    }
}
