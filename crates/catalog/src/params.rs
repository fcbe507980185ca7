//! Parameter contracts and their validation.
//!
//! Callers hand in a loosely typed JSON bag (the graphical surface sends JSON,
//! the console sends strings). Each declared parameter coerces its raw value
//! into a [`ParamValue`] of its own kind, or rejects it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Enum,
    File,
}

/// A validated parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Number(f64),
    String(String),
    Enum(String),
    File(String),
}

impl ParamValue {
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Boolean(b) => Value::Bool(*b),
            ParamValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ParamValue::String(s) | ParamValue::Enum(s) | ParamValue::File(s) => {
                Value::String(s.clone())
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) | ParamValue::Enum(s) | ParamValue::File(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Boolean(b) => write!(f, "{}", b),
            ParamValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::String(s) | ParamValue::Enum(s) | ParamValue::File(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("Required parameter missing: {0}")]
    Missing(String),

    #[error("Invalid value for parameter {name}: {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
}

impl ParameterSpec {
    fn new(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            description: description.to_string(),
            allowed_values: None,
            default: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Number, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Boolean, description)
    }

    pub fn file(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::File, description)
    }

    pub fn enumeration(name: &str, description: &str, values: &[&str]) -> Self {
        let mut spec = Self::new(name, ParamKind::Enum, description);
        spec.allowed_values = Some(values.iter().map(|v| v.to_string()).collect());
        spec
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default, coerced to this parameter's kind. A value that does
    /// not coerce is kept as a string and rejected when the catalog is built.
    pub fn with_default(mut self, value: &str) -> Self {
        let coerced = self
            .coerce(&Value::String(value.to_string()))
            .unwrap_or_else(|_| ParamValue::String(value.to_string()));
        self.default = Some(coerced);
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> ParamError {
        ParamError::Invalid {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Coerce a raw value into this parameter's kind.
    pub fn coerce(&self, raw: &Value) -> Result<ParamValue, ParamError> {
        match self.kind {
            ParamKind::String => match raw {
                Value::String(s) => Ok(ParamValue::String(s.trim().to_string())),
                Value::Number(n) => Ok(ParamValue::String(n.to_string())),
                Value::Bool(b) => Ok(ParamValue::String(b.to_string())),
                _ => Err(self.invalid("expected a string")),
            },
            ParamKind::Number => {
                let parsed = match raw {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                match parsed {
                    Some(n) if n.is_finite() => Ok(ParamValue::Number(n)),
                    _ => Err(self.invalid("expected a number")),
                }
            }
            ParamKind::Boolean => match raw {
                Value::Bool(b) => Ok(ParamValue::Boolean(*b)),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" => Ok(ParamValue::Boolean(true)),
                    "false" => Ok(ParamValue::Boolean(false)),
                    _ => Err(self.invalid("expected true or false")),
                },
                _ => Err(self.invalid("expected a boolean")),
            },
            ParamKind::Enum => {
                let Value::String(s) = raw else {
                    return Err(self.invalid("expected one of the allowed values"));
                };
                let allowed = self.allowed_values.as_deref().unwrap_or_default();
                if allowed.iter().any(|v| v == s) {
                    Ok(ParamValue::Enum(s.clone()))
                } else {
                    Err(self.invalid(format!("'{}' is not one of [{}]", s, allowed.join(", "))))
                }
            }
            ParamKind::File => match raw {
                Value::String(s) if !s.trim().is_empty() => Ok(ParamValue::File(s.trim().to_string())),
                _ => Err(self.invalid("expected a file reference")),
            },
        }
    }
}

fn is_absent(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Parameters that passed validation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidatedParams {
    values: Vec<(String, ParamValue)>,
}

impl ValidatedParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect()
    }
}

/// Validate a parameter bag against an ordered spec list. Names the specs do
/// not declare are dropped.
pub fn validate_parameters(
    specs: &[ParameterSpec],
    bag: &Map<String, Value>,
) -> Result<ValidatedParams, ParamError> {
    let mut values = Vec::with_capacity(specs.len());

    for spec in specs {
        match bag.get(&spec.name).filter(|raw| !is_absent(raw)) {
            Some(raw) => values.push((spec.name.clone(), spec.coerce(raw)?)),
            None if spec.required => return Err(ParamError::Missing(spec.name.clone())),
            None => {
                if let Some(default) = &spec.default {
                    values.push((spec.name.clone(), default.clone()));
                }
            }
        }
    }

    Ok(ValidatedParams { values })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn report_specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::enumeration("type", "Report type", &["executive", "technical"]).required(),
            ParameterSpec::enumeration("format", "Output format", &["pdf", "excel"]).with_default("pdf"),
            ParameterSpec::number("pages", "Page limit"),
            ParameterSpec::boolean("draft", "Draft mode"),
        ]
    }

    #[test]
    fn test_missing_required() {
        let err = validate_parameters(&report_specs(), &bag(json!({}))).unwrap_err();
        assert_eq!(err, ParamError::Missing("type".into()));
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let err = validate_parameters(&report_specs(), &bag(json!({"type": "  "}))).unwrap_err();
        assert_eq!(err, ParamError::Missing("type".into()));
    }

    #[test]
    fn test_enum_value_outside_allowed() {
        let err = validate_parameters(&report_specs(), &bag(json!({"type": "poem"}))).unwrap_err();
        assert!(matches!(err, ParamError::Invalid { ref name, .. } if name == "type"));
    }

    #[test]
    fn test_defaults_fill_optional() {
        let params = validate_parameters(&report_specs(), &bag(json!({"type": "technical"}))).unwrap();
        assert_eq!(params.get("format"), Some(&ParamValue::Enum("pdf".into())));
        assert_eq!(params.get("pages"), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_with_default_coerces_to_kind() {
        assert_eq!(
            ParameterSpec::boolean("draft", "Draft").with_default("true").default,
            Some(ParamValue::Boolean(true))
        );
        assert_eq!(
            ParameterSpec::number("pages", "Pages").with_default("10").default,
            Some(ParamValue::Number(10.0))
        );
        assert_eq!(
            ParameterSpec::number("pages", "Pages").with_default("ten").default,
            Some(ParamValue::String("ten".into()))
        );
    }

    #[test]
    fn test_number_accepts_numeric_strings() {
        let params =
            validate_parameters(&report_specs(), &bag(json!({"type": "executive", "pages": "12"}))).unwrap();
        assert_eq!(params.get("pages"), Some(&ParamValue::Number(12.0)));
    }

    #[test]
    fn test_number_rejects_garbage() {
        let err = validate_parameters(&report_specs(), &bag(json!({"type": "executive", "pages": "many"})))
            .unwrap_err();
        assert!(matches!(err, ParamError::Invalid { ref name, .. } if name == "pages"));
    }

    #[test]
    fn test_boolean_from_text() {
        let params =
            validate_parameters(&report_specs(), &bag(json!({"type": "executive", "draft": "TRUE"}))).unwrap();
        assert_eq!(params.get("draft"), Some(&ParamValue::Boolean(true)));
    }

    #[test]
    fn test_unknown_parameters_dropped() {
        let params =
            validate_parameters(&report_specs(), &bag(json!({"type": "executive", "rogue": "x"}))).unwrap();
        assert!(params.get("rogue").is_none());
    }

    #[test]
    fn test_declaration_order_preserved() {
        let params = validate_parameters(
            &report_specs(),
            &bag(json!({"draft": true, "pages": 3, "type": "executive"})),
        )
        .unwrap();
        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["type", "format", "pages", "draft"]);
    }

    #[test]
    fn test_string_is_trimmed() {
        let spec = ParameterSpec::string("customer", "Customer");
        assert_eq!(spec.coerce(&json!("  Acme ")).unwrap(), ParamValue::String("Acme".into()));
    }

    #[test]
    fn test_file_requires_reference() {
        let spec = ParameterSpec::file("file", "CSV");
        assert!(spec.coerce(&json!(42)).is_err());
        assert_eq!(spec.coerce(&json!("data.csv")).unwrap(), ParamValue::File("data.csv".into()));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(ParamValue::Number(3.0).to_string(), "3");
        assert_eq!(ParamValue::Number(2.5).to_string(), "2.5");
    }
}
