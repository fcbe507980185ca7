use crate::action::{ActionHandler, ActionOutcome, ActionRegistry, ActionRequest, ViewCommandsAction};
use crate::context::InvocationContext;
use crate::error::DispatchError;
use opsdeck_audit::{AuditEntry, AuditLog, EXECUTE_COMMAND};
use opsdeck_catalog::{CategorySummary, Category, CommandCatalog, CommandDefinition};
use opsdeck_executor::{
    CloudEnvironmentConfig, CommandResult, Connector, ExecutorSettings, Origin, RemoteExecutor, WebSocketConnector,
};
use opsdeck_policy::{PermissionModel, Role};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

pub const INSUFFICIENT_ROLE: &str = "insufficient role permissions";
pub const UNKNOWN_ROLE: &str = "unknown role";
pub const COMMAND_NOT_FOUND: &str = "command not found";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Remote(CommandResult),
    Action(ActionOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub action_timeout: Duration,
    pub executor: ExecutorSettings,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(30),
            executor: ExecutorSettings::default(),
        }
    }
}

/// One executor per remote endpoint, created on first use.
struct ExecutorPool {
    connector: Arc<dyn Connector>,
    settings: ExecutorSettings,
    audit: Arc<AuditLog>,
    executors: Mutex<HashMap<String, Arc<RemoteExecutor>>>,
}

impl ExecutorPool {
    fn get(&self, config: &CloudEnvironmentConfig) -> Arc<RemoteExecutor> {
        let key = config.endpoint_key();
        let mut executors = self.executors.lock();

        if let Some(existing) = executors.get(&key).filter(|e| e.config() == config) {
            return existing.clone();
        }

        info!("Creating remote executor for {}", key);
        let executor = Arc::new(
            RemoteExecutor::with_connector(config.clone(), self.settings, self.connector.clone())
                .with_audit(self.audit.clone()),
        );
        if let Some(replaced) = executors.insert(key, executor.clone()) {
            replaced.disconnect();
        }
        executor
    }

    fn len(&self) -> usize {
        self.executors.lock().len()
    }

    fn shutdown(&self) {
        let executors: Vec<_> = self.executors.lock().drain().map(|(_, e)| e).collect();
        for executor in executors {
            executor.disconnect();
        }
    }
}

/// Single entry point for invoking catalog commands from any surface.
///
/// Every call is resolved against the catalog, authorized against the
/// caller's role and validated before anything runs. Each call leaves exactly
/// one `execute_command` entry in the audit log: denied if it was rejected
/// before running, allowed otherwise.
pub struct DispatchService {
    catalog: Arc<CommandCatalog>,
    permissions: PermissionModel,
    audit: Arc<AuditLog>,
    actions: ActionRegistry,
    executors: ExecutorPool,
    settings: DispatchSettings,
}

impl DispatchService {
    pub fn new(catalog: Arc<CommandCatalog>, audit: Arc<AuditLog>, settings: DispatchSettings) -> Self {
        let mut actions = ActionRegistry::new();
        actions.register(ViewCommandsAction::NAME, Arc::new(ViewCommandsAction::new(catalog.clone())));

        Self {
            executors: ExecutorPool {
                connector: Arc::new(WebSocketConnector),
                settings: settings.executor,
                audit: audit.clone(),
                executors: Mutex::new(HashMap::new()),
            },
            catalog,
            permissions: PermissionModel::new(),
            audit,
            actions,
            settings,
        }
    }

    /// Replace the transport used for remote executors created from now on.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.executors.shutdown();
        self.executors.connector = connector;
        self
    }

    pub fn register_action(&mut self, action_name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> &mut Self {
        self.actions.register(action_name, handler);
        self
    }

    pub async fn execute(
        &self,
        command_id: &str,
        parameters: &Map<String, Value>,
        context: &InvocationContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        info!("Dispatching {} for {} ({})", command_id, context.user_id, context.role);

        // 1. Resolve
        let Some(definition) = self.catalog.by_id(command_id) else {
            self.deny(&context.user_id, context.role.as_str(), command_id, COMMAND_NOT_FOUND);
            return Err(DispatchError::CommandNotFound(command_id.to_string()));
        };

        // 2. Authorize
        if !definition.is_available_to(context.role) {
            self.deny(&context.user_id, context.role.as_str(), command_id, INSUFFICIENT_ROLE);
            return Err(DispatchError::InsufficientPermission {
                command: command_id.to_string(),
                role: context.role,
            });
        }

        // 3. Validate
        let params = match definition.validate_parameters(parameters) {
            Ok(params) => params,
            Err(e) => {
                self.deny(&context.user_id, context.role.as_str(), command_id, &e.to_string());
                return Err(e.into());
            }
        };

        // 4. Admitted
        self.audit.record(AuditEntry::allowed(
            context.user_id.as_str(),
            context.role.as_str(),
            EXECUTE_COMMAND,
            command_id,
        ));

        // 5. Route
        let text = definition.render_text(&params);
        match context.remote_target() {
            Some(remote) => {
                let scoped = self.permissions.scope_command(&text, context.role, &context.user_id);
                let executor = self.executors.get(remote);
                let result = executor.execute(&scoped, &context.remote_context()).await?;
                Ok(DispatchOutcome::Remote(result))
            }
            None => {
                let request = ActionRequest {
                    command_id: definition.id.clone(),
                    action_name: definition.action_name.clone(),
                    text,
                    parameters: params,
                    user_id: context.user_id.clone(),
                    role: context.role,
                    origin: context.origin,
                    session_id: context.session_id.clone(),
                };
                let handler = self.actions.resolve(&definition.action_name);
                let outcome = self.execute_with_protection(handler, request).await?;
                Ok(DispatchOutcome::Action(outcome))
            }
        }
    }

    /// Entry point for callers that hold the role as an unvalidated string.
    pub async fn execute_as(
        &self,
        command_id: &str,
        parameters: &Map<String, Value>,
        user_id: &str,
        raw_role: &str,
        origin: Origin,
    ) -> Result<DispatchOutcome, DispatchError> {
        let role: Role = match raw_role.parse() {
            Ok(role) => role,
            Err(_) => {
                warn!("Rejecting {} for {}: unknown role '{}'", command_id, user_id, raw_role);
                self.deny(user_id, raw_role, command_id, UNKNOWN_ROLE);
                return Err(DispatchError::UnknownRole(raw_role.to_string()));
            }
        };
        let context = InvocationContext::new(user_id, role, origin);
        self.execute(command_id, parameters, &context).await
    }

    async fn execute_with_protection(
        &self,
        handler: Arc<dyn ActionHandler>,
        request: ActionRequest,
    ) -> Result<ActionOutcome, DispatchError> {
        let action = request.action_name.clone();
        let limit = self.settings.action_timeout;

        // Spawned so a panicking handler cannot take the caller down
        let mut handle = tokio::spawn(async move { handler.handle(request).await });

        match timeout(limit, &mut handle).await {
            Ok(Ok(result)) => result.map_err(DispatchError::from),
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    error!("Action {} panicked", action);
                    Err(DispatchError::Action(format!("{} panicked", action)))
                } else {
                    error!("Action {} cancelled", action);
                    Err(DispatchError::Action(format!("{} cancelled", action)))
                }
            }
            Err(_) => {
                handle.abort();
                warn!("Action {} timed out after {:?}", action, limit);
                Err(DispatchError::Action(format!("{} timed out after {:?}", action, limit)))
            }
        }
    }

    fn deny(&self, user_id: &str, role: &str, command_id: &str, reason: &str) {
        warn!("Denied {} for {}: {}", command_id, user_id, reason);
        self.audit
            .record(AuditEntry::denied(user_id, role, EXECUTE_COMMAND, command_id, reason));
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn permissions(&self) -> &PermissionModel {
        &self.permissions
    }

    pub fn definition(&self, command_id: &str) -> Option<&CommandDefinition> {
        self.catalog.by_id(command_id)
    }

    pub fn available_commands(&self, role: Role) -> Vec<&CommandDefinition> {
        self.catalog.available_commands(role)
    }

    pub fn commands_by_category(&self, role: Role) -> BTreeMap<Category, Vec<&CommandDefinition>> {
        self.catalog.commands_by_category(role)
    }

    pub fn search(&self, query: &str, role: Role) -> Vec<&CommandDefinition> {
        self.catalog.search(query, role)
    }

    pub fn categories(&self, role: Role) -> Vec<CategorySummary> {
        self.catalog.categories(role)
    }

    pub fn usage_statistics(&self) -> BTreeMap<String, u64> {
        self.audit.usage_statistics()
    }

    pub fn execution_history(&self, user_id: &str, limit: usize) -> Vec<AuditEntry> {
        self.audit.execution_history(user_id, limit)
    }

    pub fn active_executors(&self) -> usize {
        self.executors.len()
    }

    /// Close every remote connection.
    pub fn shutdown(&self) {
        self.executors.shutdown();
    }
}
