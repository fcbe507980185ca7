//! Line-oriented console over the dispatch service.

use opsdeck_dispatch::{DispatchOutcome, DispatchService, InvocationContext};
use opsdeck_interfaces::Interface;
use opsdeck_policy::Resource;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("dangling escape at end of line")]
    DanglingEscape,
    #[error("expected key=value, got '{0}'")]
    MalformedArgument(String),
    #[error("empty parameter name in '{0}'")]
    EmptyKey(String),
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleLine {
    Empty,
    Exit,
    WhoAmI,
    Categories,
    Stats,
    History(usize),
    Search(String),
    Invoke {
        command_id: String,
        parameters: Map<String, Value>,
    },
}

/// Split on whitespace, honouring single and double quotes and backslash
/// escapes.
pub fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (_, '\\') => {
                let escaped = chars.next().ok_or(ParseError::DanglingEscape)?;
                current.push(escaped);
                in_token = true;
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

pub fn parse_line(line: &str) -> Result<ConsoleLine, ParseError> {
    let tokens = tokenize(line)?;
    let Some((head, rest)) = tokens.split_first() else {
        return Ok(ConsoleLine::Empty);
    };

    let parsed = match head.as_str() {
        "exit" | "quit" if rest.is_empty() => ConsoleLine::Exit,
        "whoami" if rest.is_empty() => ConsoleLine::WhoAmI,
        "categories" if rest.is_empty() => ConsoleLine::Categories,
        "stats" if rest.is_empty() => ConsoleLine::Stats,
        "history" if rest.len() <= 1 => {
            let limit = match rest.first() {
                Some(n) => n
                    .parse()
                    .map_err(|_| ParseError::MalformedArgument(n.clone()))?,
                None => DEFAULT_HISTORY,
            };
            ConsoleLine::History(limit)
        }
        "search" => ConsoleLine::Search(rest.join(" ")),
        _ => {
            let mut parameters = Map::new();
            for arg in rest {
                let (key, value) = arg
                    .split_once('=')
                    .ok_or_else(|| ParseError::MalformedArgument(arg.clone()))?;
                if key.is_empty() {
                    return Err(ParseError::EmptyKey(arg.clone()));
                }
                parameters.insert(key.to_string(), Value::String(value.to_string()));
            }
            ConsoleLine::Invoke {
                command_id: head.clone(),
                parameters,
            }
        }
    };
    Ok(parsed)
}

pub struct Console {
    service: Arc<DispatchService>,
    interface: Arc<dyn Interface>,
    context: InvocationContext,
}

impl Console {
    pub fn new(service: Arc<DispatchService>, interface: Arc<dyn Interface>, context: InvocationContext) -> Self {
        Self {
            service,
            interface,
            context,
        }
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    /// Read lines until `exit` or end of input.
    pub async fn run(&self) {
        info!("Console session {} started", self.context.session_id);
        self.interface
            .show_status(&format!(
                "{} signed in as {} ({} commands available, type 'help')",
                self.context.user_id,
                self.context.role,
                self.service.available_commands(self.context.role).len()
            ))
            .await;

        while let Some(line) = self.interface.receive_input().await {
            if !self.handle_line(&line).await {
                break;
            }
        }

        info!("Console session {} ended", self.context.session_id);
    }

    /// Returns false once the session should end.
    pub async fn handle_line(&self, line: &str) -> bool {
        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.interface.show_error(&e.to_string()).await;
                return true;
            }
        };

        match parsed {
            ConsoleLine::Empty => {}
            ConsoleLine::Exit => return false,
            ConsoleLine::WhoAmI => {
                let context = &self.context;
                let remote = match &context.remote {
                    Some(cloud) if cloud.enabled => format!("remote {}", cloud.provider),
                    _ => "local".to_string(),
                };
                self.interface
                    .send_output(&format!(
                        "{} ({}) session {} [{}]",
                        context.user_id, context.role, context.session_id, remote
                    ))
                    .await;

                let permissions = self.service.permissions();
                let scope = permissions.scope_for(context.role);
                let visibility = if scope.has_full_visibility() {
                    "all projects and records"
                } else {
                    "assigned only"
                };
                self.interface.send_output(&format!("  scope:  {}", visibility)).await;

                let summary = permissions.permissions_summary(context.role);
                for (action, resources) in [
                    ("view", &summary.can_view),
                    ("create", &summary.can_create),
                    ("update", &summary.can_update),
                    ("delete", &summary.can_delete),
                ] {
                    self.interface
                        .send_output(&format!("  {:<7} {}", format!("{}:", action), resource_list(resources)))
                        .await;
                }
            }
            ConsoleLine::Categories => {
                for summary in self.service.categories(self.context.role) {
                    self.interface
                        .send_output(&format!("{:<12} {:<28} {}", summary.category.as_str(), summary.display_name, summary.count))
                        .await;
                }
            }
            ConsoleLine::Stats => {
                let stats = self.service.usage_statistics();
                if stats.is_empty() {
                    self.interface.send_output("no commands executed yet").await;
                }
                for (command, count) in stats {
                    self.interface.send_output(&format!("{:<24} {}", command, count)).await;
                }
            }
            ConsoleLine::History(limit) => {
                let history = self.service.execution_history(&self.context.user_id, limit);
                if history.is_empty() {
                    self.interface.send_output("no history").await;
                }
                for entry in history {
                    let verdict = if entry.allowed { "ok" } else { "denied" };
                    let mut line = format!(
                        "{} {:<24} {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.resource,
                        verdict
                    );
                    if let Some(reason) = entry.reason {
                        line.push_str(&format!(" ({})", reason));
                    }
                    self.interface.send_output(&line).await;
                }
            }
            ConsoleLine::Search(query) => {
                let matches = self.service.search(&query, self.context.role);
                if matches.is_empty() {
                    self.interface.send_output(&format!("no commands match '{}'", query)).await;
                }
                for command in matches {
                    self.interface
                        .send_output(&format!("{:<24} {}", command.id, command.description))
                        .await;
                }
            }
            ConsoleLine::Invoke {
                command_id,
                parameters,
            } => self.invoke(&command_id, &parameters).await,
        }
        true
    }

    async fn invoke(&self, command_id: &str, parameters: &Map<String, Value>) {
        debug!("Console invoking {} with {} parameters", command_id, parameters.len());
        match self.service.execute(command_id, parameters, &self.context).await {
            Ok(DispatchOutcome::Remote(result)) => {
                if !result.output.is_empty() {
                    self.interface.send_output(result.output.trim_end()).await;
                }
                self.interface
                    .show_status(&format!(
                        "{} completed in {}ms ({})",
                        command_id, result.execution_time_ms, result.metadata.execution_id
                    ))
                    .await;
            }
            Ok(DispatchOutcome::Action(outcome)) => {
                self.interface.send_output(&outcome.message).await;
                if !outcome.data.is_null() {
                    let rendered = serde_json::to_string_pretty(&outcome.data).unwrap_or_default();
                    self.interface.send_output(&rendered).await;
                }
            }
            Err(e) => self.interface.show_error(&e.to_string()).await,
        }
    }
}

fn resource_list(resources: &[Resource]) -> String {
    if resources.is_empty() {
        return "none".to_string();
    }
    resources.iter().map(Resource::as_str).collect::<Vec<_>>().join(", ")
}
