//! JSON frames exchanged with the terminal proxy. Every frame carries a
//! `type` discriminator; correlation uses the `id` field only.

use chrono::{DateTime, Utc};
use opsdeck_policy::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Surface the invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "gui")]
    Graphical,
    #[serde(rename = "terminal")]
    Console,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteContext {
    pub user_id: String,
    #[serde(rename = "userRole")]
    pub role: Role,
    #[serde(rename = "interface")]
    pub origin: Origin,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub provider: String,
    pub region: Option<String>,
    pub connection_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    ExecuteCommand {
        id: String,
        command: String,
        context: RemoteContext,
        environment: EnvironmentInfo,
        timestamp: DateTime<Utc>,
    },
    Authenticate {
        credentials: Value,
        provider: String,
        timestamp: DateTime<Utc>,
    },
    CancelCommand {
        id: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    CommandResult {
        id: String,
        success: bool,
        #[serde(default)]
        output: String,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        metadata: Option<Value>,
    },
    CommandProgress {
        id: String,
        #[serde(default)]
        progress: Value,
    },
    AuthenticationResult {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        error: String,
    },
}
