pub mod matrix;
pub mod role;
pub mod sanitizer;
pub mod scope;

pub use matrix::{AccessDecision, Action, Ownership, PermissionModel, PermissionsSummary, Resource};
pub use role::{Role, UnknownRole};
pub use sanitizer::{CommandSanitizer, SanitizerError};
pub use scope::{filter_visible, Allowance, Assignable, DataScope, RbacContext};
