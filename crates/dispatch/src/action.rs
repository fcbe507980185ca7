use crate::error::ActionError;
use async_trait::async_trait;
use opsdeck_catalog::{CommandCatalog, ValidatedParams};
use opsdeck_executor::Origin;
use opsdeck_policy::Role;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything an in-process handler gets to see about an admitted command.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub command_id: String,
    pub action_name: String,
    /// Canonical console text with parameters rendered.
    pub text: String,
    pub parameters: ValidatedParams,
    pub user_id: String,
    pub role: Role,
    pub origin: Origin,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub action: String,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, request: ActionRequest) -> Result<ActionOutcome, ActionError>;
}

/// Fallback for actions with no registered handler: echo the structured
/// action back so the calling surface can trigger it.
pub struct SurfaceAction;

#[async_trait]
impl ActionHandler for SurfaceAction {
    async fn handle(&self, request: ActionRequest) -> Result<ActionOutcome, ActionError> {
        Ok(ActionOutcome {
            message: format!("{} dispatched", request.action_name),
            data: json!({
                "command": request.text,
                "parameters": request.parameters.to_json(),
            }),
            action: request.action_name,
        })
    }
}

/// Lists the commands available to the requesting role, grouped by category.
pub struct ViewCommandsAction {
    catalog: Arc<CommandCatalog>,
}

impl ViewCommandsAction {
    pub const NAME: &'static str = "system.viewCommands";

    pub fn new(catalog: Arc<CommandCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ActionHandler for ViewCommandsAction {
    async fn handle(&self, request: ActionRequest) -> Result<ActionOutcome, ActionError> {
        let grouped = self.catalog.commands_by_category(request.role);
        let total: usize = grouped.values().map(Vec::len).sum();

        let categories: Vec<Value> = grouped
            .into_iter()
            .map(|(category, commands)| {
                json!({
                    "category": category,
                    "name": category.display_name(),
                    "commands": commands
                        .iter()
                        .map(|c| json!({"id": c.id, "name": c.name, "text": c.text_form}))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();

        Ok(ActionOutcome {
            action: request.action_name,
            message: format!("{} commands available to {}", total, request.role),
            data: json!({ "categories": categories }),
        })
    }
}

/// Handlers keyed by action name.
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    fallback: Arc<dyn ActionHandler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(SurfaceAction),
        }
    }

    pub fn register(&mut self, action_name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> &mut Self {
        self.handlers.insert(action_name.into(), handler);
        self
    }

    pub fn get(&self, action_name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_name).cloned()
    }

    /// The registered handler, or the surface fallback.
    pub fn resolve(&self, action_name: &str) -> Arc<dyn ActionHandler> {
        self.get(action_name).unwrap_or_else(|| self.fallback.clone())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
