use crate::error::ExecutorError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Ssh,
    Api,
    Websocket,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Ssh => "ssh",
            ConnectionType::Api => "api",
            ConnectionType::Websocket => "websocket",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub project_id: Option<String>,
    pub subscription_id: Option<String>,
    pub key_file_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub terminal_proxy: Option<String>,
    pub command_executor: Option<String>,
    pub file_system: Option<String>,
}

/// Where and how to reach a remote execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudEnvironmentConfig {
    pub provider: Provider,
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub enabled: bool,
}

impl CloudEnvironmentConfig {
    pub fn terminal_proxy(&self) -> Option<&str> {
        self.endpoints
            .terminal_proxy
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Identity of the backend, used to share one executor per endpoint.
    pub fn endpoint_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.provider,
            self.connection_type.as_str(),
            self.terminal_proxy().unwrap_or_default()
        )
    }

    pub fn ensure_usable(&self) -> Result<&str, ExecutorError> {
        if !self.enabled {
            return Err(ExecutorError::NotConfigured("cloud environment is disabled".into()));
        }
        self.terminal_proxy()
            .ok_or_else(|| ExecutorError::NotConfigured("no terminal proxy endpoint".into()))
    }

    /// The proxy endpoint with its scheme switched to `ws`/`wss`, tagged with
    /// provider and connection type.
    pub fn websocket_url(&self) -> Result<String, ExecutorError> {
        let base = self.ensure_usable()?;
        let ws = match base.strip_prefix("http") {
            Some(rest) => format!("ws{}", rest),
            None => base.to_string(),
        };
        let separator = if ws.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{}{}provider={}&connectionType={}",
            ws,
            separator,
            urlencoding::encode(self.provider.as_str()),
            urlencoding::encode(self.connection_type.as_str())
        ))
    }

    /// Provider-specific credential subset sent in the authentication frame.
    pub fn auth_credentials(&self) -> Value {
        let c = &self.credentials;
        match self.provider {
            Provider::Aws => json!({
                "accessKey": c.access_key,
                "secretKey": c.secret_key,
                "region": c.region,
            }),
            Provider::Gcp => json!({
                "projectId": c.project_id,
                "keyFilePath": c.key_file_path,
            }),
            Provider::Azure => json!({
                "subscriptionId": c.subscription_id,
            }),
        }
    }
}

/// Timeouts for one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
        }
    }
}
