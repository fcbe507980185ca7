//! Application configuration, read from YAML.

use opsdeck_audit::DEFAULT_RETENTION;
use opsdeck_dispatch::{DispatchSettings, InvocationContext};
use opsdeck_executor::{CloudEnvironmentConfig, ExecutorSettings, Origin};
use opsdeck_policy::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "opsdeck.yaml";
pub const CONFIG_ENV: &str = "OPSDECK_CONFIG";
pub const USER_ENV: &str = "OPSDECK_USER";
pub const ROLE_ENV: &str = "OPSDECK_ROLE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub action_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            command_timeout_ms: 30_000,
            action_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub session_id: Option<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            role: Role::Analyst,
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON Lines audit file. No file means in-memory only.
    pub audit_log: Option<PathBuf>,
    pub audit_retention: usize,
    /// Extra command definitions merged into the built-in catalog.
    pub catalog_extensions: Option<PathBuf>,
    pub executor: TimeoutConfig,
    pub cloud: Option<CloudEnvironmentConfig>,
    pub identity: Identity,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audit_log: Some(PathBuf::from("opsdeck-audit.jsonl")),
            audit_retention: DEFAULT_RETENTION,
            catalog_extensions: None,
            executor: TimeoutConfig::default(),
            cloud: None,
            identity: Identity::default(),
        }
    }
}

impl AppConfig {
    /// Resolve the config path (explicit, then `OPSDECK_CONFIG`, then
    /// `opsdeck.yaml`), load it, apply identity overrides from the
    /// environment and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };

        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// A missing or empty file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(user) = lookup(USER_ENV).filter(|u| !u.trim().is_empty()) {
            self.identity.user_id = user.trim().to_string();
        }
        if let Some(role) = lookup(ROLE_ENV).filter(|r| !r.trim().is_empty()) {
            self.identity.role = role
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", ROLE_ENV, e)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit_retention == 0 {
            return Err(ConfigError::Invalid("audit_retention must be positive".into()));
        }

        let t = &self.executor;
        if t.connect_timeout_ms == 0 || t.command_timeout_ms == 0 || t.action_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }

        if self.identity.user_id.trim().is_empty() {
            return Err(ConfigError::Invalid("identity.user_id is empty".into()));
        }

        if let Some(cloud) = self.cloud.as_ref().filter(|c| c.enabled) {
            cloud
                .ensure_usable()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        Ok(())
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            action_timeout: Duration::from_millis(self.executor.action_timeout_ms),
            executor: ExecutorSettings {
                connect_timeout: Duration::from_millis(self.executor.connect_timeout_ms),
                command_timeout: Duration::from_millis(self.executor.command_timeout_ms),
            },
        }
    }

    /// Context for invocations typed into the console.
    pub fn console_context(&self) -> InvocationContext {
        let mut context = InvocationContext::new(self.identity.user_id.clone(), self.identity.role, Origin::Console);
        if let Some(session) = &self.identity.session_id {
            context = context.with_session(session.clone());
        }
        if let Some(cloud) = &self.cloud {
            context = context.with_remote(cloud.clone());
        }
        context
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = AppConfig::from_yaml("   \n").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[(USER_ENV, "dana"), (ROLE_ENV, "senior-operator")]))
            .unwrap();
        assert_eq!(config.identity.user_id, "dana");
        assert_eq!(config.identity.role, Role::SeniorDc);
    }

    #[test]
    fn test_unknown_role_override_rejected() {
        let mut config = AppConfig::default();
        let err = config.apply_overrides(env(&[(ROLE_ENV, "root")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("root")));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = AppConfig::default();
        config.executor.command_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audit_retention = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_console_context_carries_remote() {
        let config = AppConfig::from_yaml(
            r#"
identity:
  user_id: dee
  role: dc
  session_id: fixed
cloud:
  provider: aws
  connection_type: websocket
  endpoints:
    terminal_proxy: http://localhost:9000
  enabled: true
"#,
        )
        .unwrap();
        let context = config.console_context();
        assert_eq!(context.user_id, "dee");
        assert_eq!(context.session_id, "fixed");
        assert_eq!(context.origin, Origin::Console);
        assert!(context.remote.is_some());
    }
}
