//! Unified command dispatch: one path from a command id and a parameter bag
//! to an authorized, validated and audited execution.

pub mod action;
pub mod context;
pub mod error;
pub mod service;

pub use action::{ActionHandler, ActionOutcome, ActionRegistry, ActionRequest, SurfaceAction, ViewCommandsAction};
pub use context::InvocationContext;
pub use error::{ActionError, DispatchError};
pub use service::{
    DispatchOutcome, DispatchService, DispatchSettings, COMMAND_NOT_FOUND, INSUFFICIENT_ROLE, UNKNOWN_ROLE,
};
