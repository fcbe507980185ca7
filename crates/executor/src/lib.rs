//! Client for remote command execution over a persistent duplex connection.

pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod transport;

pub use config::{CloudEnvironmentConfig, ConnectionType, Credentials, Endpoints, ExecutorSettings, Provider};
pub use envelope::{Origin, RemoteContext};
pub use error::ExecutorError;
pub use executor::{
    CancelHandle, CommandResult, ConnectionState, RemoteExecutor, ResultMetadata, Submission, REMOTE_EXECUTE,
};
pub use transport::{Connector, Duplex, MemoryConnector, ServerEnd, WebSocketConnector};
