//! Step conditions evaluated against a context's shared state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Comparison applied to a shared-state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Exists,
    NotExists,
    Equals,
    NotEquals,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
        })
    }
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "exists" => Ok(Self::Exists),
            "not_exists" => Ok(Self::NotExists),
            "equals" | "eq" => Ok(Self::Equals),
            "not_equals" | "ne" => Ok(Self::NotEquals),
            other => Err(ConditionError::UnknownOperator(other.to_string())),
        }
    }
}

/// Reasons a condition cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("condition has an empty field name")]
    EmptyField,

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{0}' requires a value")]
    MissingValue(Operator),
}

/// Gate on a workflow step.
///
/// The operator is kept as written so that a malformed definition still
/// deserializes and is reported when evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Shared-state key to inspect.
    pub field: String,
    /// One of `exists`, `not_exists`, `equals`, `not_equals`.
    pub operator: String,
    /// Right-hand side for the comparison operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Condition {
    /// Condition that holds when `field` is present.
    pub fn exists(field: impl Into<String>) -> Self {
        Self { field: field.into(), operator: Operator::Exists.to_string(), value: None }
    }

    /// Condition that holds when `field` is absent.
    pub fn not_exists(field: impl Into<String>) -> Self {
        Self { field: field.into(), operator: Operator::NotExists.to_string(), value: None }
    }

    /// Condition that holds when `field` equals `value`.
    pub fn equals(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), operator: Operator::Equals.to_string(), value: Some(value) }
    }

    /// Condition that holds unless `field` equals `value`.
    pub fn not_equals(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), operator: Operator::NotEquals.to_string(), value: Some(value) }
    }

    /// Evaluates the condition against `state`.
    ///
    /// A missing field never equals anything, so `not_equals` holds for it.
    pub fn evaluate(&self, state: &HashMap<String, Value>) -> Result<bool, ConditionError> {
        if self.field.trim().is_empty() {
            return Err(ConditionError::EmptyField);
        }
        let operator: Operator = self.operator.parse()?;
        let current = state.get(&self.field);

        match operator {
            Operator::Exists => Ok(current.is_some()),
            Operator::NotExists => Ok(current.is_none()),
            Operator::Equals | Operator::NotEquals => {
                let expected = self.value.as_ref().ok_or(ConditionError::MissingValue(operator))?;
                let equal = current == Some(expected);
                Ok(if operator == Operator::Equals { equal } else { !equal })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> HashMap<String, Value> {
        HashMap::from([
            ("language".to_string(), json!("rust")),
            ("attempts".to_string(), json!(2)),
        ])
    }

    #[test]
    fn test_exists() {
        assert!(Condition::exists("language").evaluate(&state()).unwrap());
        assert!(!Condition::exists("x").evaluate(&state()).unwrap());
        assert!(Condition::not_exists("x").evaluate(&state()).unwrap());
    }

    #[test]
    fn test_equals_compares_json_values() {
        assert!(Condition::equals("language", json!("rust")).evaluate(&state()).unwrap());
        assert!(!Condition::equals("attempts", json!("2")).evaluate(&state()).unwrap());
        assert!(!Condition::equals("missing", json!(null)).evaluate(&state()).unwrap());
        assert!(Condition::not_equals("missing", json!(1)).evaluate(&state()).unwrap());
        assert!(!Condition::not_equals("attempts", json!(2)).evaluate(&state()).unwrap());
    }

    #[test]
    fn test_malformed_conditions() {
        let unknown = Condition { field: "language".to_string(), operator: "matches".to_string(), value: None };
        assert_eq!(
            unknown.evaluate(&state()),
            Err(ConditionError::UnknownOperator("matches".to_string()))
        );

        let no_value = Condition { field: "language".to_string(), operator: "equals".to_string(), value: None };
        assert_eq!(no_value.evaluate(&state()), Err(ConditionError::MissingValue(Operator::Equals)));

        assert_eq!(Condition::exists("  ").evaluate(&state()), Err(ConditionError::EmptyField));
    }

    #[test]
    fn test_deserialize_from_json() {
        let condition: Condition =
            serde_json::from_value(json!({"field": "x", "operator": "exists"})).unwrap();
        assert_eq!(condition, Condition::exists("x"));
    }
}
