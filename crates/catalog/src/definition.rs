use crate::params::{validate_parameters, ParamError, ParamValue, ParameterSpec, ValidatedParams};
use opsdeck_policy::Role;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pov,
    Trr,
    Scenario,
    Ai,
    Content,
    System,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Pov,
        Category::Trr,
        Category::Scenario,
        Category::Ai,
        Category::Content,
        Category::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pov => "pov",
            Category::Trr => "trr",
            Category::Scenario => "scenario",
            Category::Ai => "ai",
            Category::Content => "content",
            Category::System => "system",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Pov => "POV Management",
            Category::Trr => "TRR Management",
            Category::Scenario => "Security Scenarios",
            Category::Ai => "AI & Analytics",
            Category::Content => "Content Creation",
            Category::System => "System",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invokable operation, identical for the console and graphical surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Canonical console form, before parameters are appended.
    pub text_form: String,
    /// Structured action the graphical surface triggers.
    pub action_name: String,
    pub category: Category,
    pub required_roles: Vec<Role>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl CommandDefinition {
    pub fn is_available_to(&self, role: Role) -> bool {
        self.required_roles.contains(&role)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn validate_parameters(&self, bag: &Map<String, Value>) -> Result<ValidatedParams, ParamError> {
        validate_parameters(&self.parameters, bag)
    }

    /// `query` must already be lowercased.
    pub(crate) fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
            || self.text_form.to_lowercase().contains(query)
            || self.category.as_str().contains(query)
    }

    /// Render the canonical console text with validated parameters appended.
    pub fn render_text(&self, params: &ValidatedParams) -> String {
        let mut text = self.text_form.clone();
        for (name, value) in params.iter() {
            match value {
                ParamValue::Boolean(true) => text.push_str(&format!(" --{}", name)),
                ParamValue::Boolean(false) => {}
                other => {
                    let escaped = other.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                    text.push_str(&format!(" --{} \"{}\"", name, escaped));
                }
            }
        }
        text
    }
}
