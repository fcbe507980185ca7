pub mod entry;
pub mod log;
pub mod sink;

pub use entry::{AuditEntry, AuditFilter, EXECUTE_COMMAND};
pub use log::{AuditLog, DEFAULT_RETENTION};
pub use sink::{AuditSink, AuditSinkError, JsonlFileSink, NullSink};
