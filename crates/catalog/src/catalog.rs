use crate::builtin;
use crate::definition::{Category, CommandDefinition};
use crate::params::ParamKind;
use opsdeck_policy::Role;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog integrity check failed: {}", .0.join("; "))]
    Integrity(Vec<String>),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub display_name: &'static str,
    pub count: usize,
}

/// Registry of every invokable command. Immutable once built.
#[derive(Debug, Clone)]
pub struct CommandCatalog {
    commands: Vec<CommandDefinition>,
    index: HashMap<String, usize>,
}

impl CommandCatalog {
    /// The built-in command set. Its integrity is covered by tests.
    pub fn builtin() -> Self {
        Self::index(builtin::definitions())
    }

    /// Build a catalog after checking every definition.
    pub fn from_definitions(definitions: Vec<CommandDefinition>) -> Result<Self, CatalogError> {
        let definitions = normalize(definitions)?;
        Ok(Self::index(definitions))
    }

    /// Built-in commands plus definitions read from a YAML list.
    pub fn with_extensions(yaml: &str) -> Result<Self, CatalogError> {
        let extra: Vec<CommandDefinition> = serde_yaml::from_str(yaml)?;
        debug!("Loaded {} catalog extensions", extra.len());
        let mut definitions = builtin::definitions();
        definitions.extend(extra);
        Self::from_definitions(definitions)
    }

    pub fn load_extensions(path: &std::path::Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::with_extensions(&content)
    }

    fn index(commands: Vec<CommandDefinition>) -> Self {
        let index = commands
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Self { commands, index }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn all(&self) -> &[CommandDefinition] {
        &self.commands
    }

    pub fn by_id(&self, id: &str) -> Option<&CommandDefinition> {
        self.index.get(id).map(|&i| &self.commands[i])
    }

    pub fn available_commands(&self, role: Role) -> Vec<&CommandDefinition> {
        self.commands
            .iter()
            .filter(|c| c.is_available_to(role))
            .collect()
    }

    pub fn commands_by_category(&self, role: Role) -> BTreeMap<Category, Vec<&CommandDefinition>> {
        let mut grouped: BTreeMap<Category, Vec<&CommandDefinition>> = BTreeMap::new();
        for command in self.available_commands(role) {
            grouped.entry(command.category).or_default().push(command);
        }
        grouped
    }

    /// Case-insensitive substring search over name, description, text form
    /// and category. An empty query returns everything `role` may run.
    pub fn search(&self, query: &str, role: Role) -> Vec<&CommandDefinition> {
        let needle = query.trim().to_lowercase();
        self.available_commands(role)
            .into_iter()
            .filter(|c| needle.is_empty() || c.matches(&needle))
            .collect()
    }

    pub fn categories(&self, role: Role) -> Vec<CategorySummary> {
        let grouped = self.commands_by_category(role);
        Category::ALL
            .into_iter()
            .map(|category| CategorySummary {
                category,
                display_name: category.display_name(),
                count: grouped.get(&category).map_or(0, Vec::len),
            })
            .collect()
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Check every definition and coerce parameter defaults into their declared
/// kind. All violations are collected before failing.
fn normalize(mut definitions: Vec<CommandDefinition>) -> Result<Vec<CommandDefinition>, CatalogError> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    for def in &mut definitions {
        if def.id.trim().is_empty() {
            problems.push(format!("command '{}' has an empty id", def.name));
        } else if !seen.insert(def.id.clone()) {
            problems.push(format!("duplicate command id: {}", def.id));
        }
        if def.required_roles.is_empty() {
            problems.push(format!("{}: no role may run this command", def.id));
        }
        if def.text_form.trim().is_empty() || def.action_name.trim().is_empty() {
            problems.push(format!("{}: missing text form or action name", def.id));
        }

        let mut param_names = HashSet::new();
        for spec in &mut def.parameters {
            if !param_names.insert(spec.name.clone()) {
                problems.push(format!("{}: duplicate parameter {}", def.id, spec.name));
            }
            if spec.kind == ParamKind::Enum && spec.allowed_values.as_ref().map_or(true, Vec::is_empty) {
                problems.push(format!("{}.{}: enum without allowed values", def.id, spec.name));
                continue;
            }
            if let Some(default) = spec.default.take() {
                match spec.coerce(&default.to_json()) {
                    Ok(value) => spec.default = Some(value),
                    Err(e) => problems.push(format!("{}: default rejected: {}", def.id, e)),
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(definitions)
    } else {
        warn!("Rejected catalog with {} problems", problems.len());
        Err(CatalogError::Integrity(problems))
    }
}
