//! Named rules declared in a schema's `x-jsf-logic` block.
//!
//! ```json
//! "x-jsf-logic": {
//!   "validations": {
//!     "adult": { "rule": { ">=": [{ "var": "age" }, 18] }, "errorMessage": "Too young" }
//!   },
//!   "computedValues": {
//!     "min_age": { "rule": { "+": [{ "var": "base_age" }, 1] } }
//!   }
//! }
//! ```

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Operators, evaluate, ops};
use crate::error::{FormError, Result};

/// Schema key holding the rule tables.
pub const LOGIC_KEY: &str = "x-jsf-logic";

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("template pattern is valid")
});

/// A named rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rule {
    /// JSON-Logic expression.
    pub rule: Value,
    /// Message reported when a validation rule fails.
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// Validations and computed values extracted from one `x-jsf-logic` block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleTable {
    /// Boolean rules, by name.
    #[serde(default)]
    pub validations: HashMap<String, Rule>,
    /// Value-producing rules, by name.
    #[serde(rename = "computedValues", default)]
    pub computed_values: HashMap<String, Rule>,
}

impl RuleTable {
    /// Extract the rule table of a schema node, if it declares one.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidRule`] when the block is not shaped like
    /// a rule table.
    pub fn from_schema(schema: &Value) -> Result<Option<Self>> {
        let Some(block) = schema.get(LOGIC_KEY) else {
            return Ok(None);
        };
        let table = serde_json::from_value(block.clone()).map_err(|e| FormError::InvalidRule {
            path: LOGIC_KEY.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(table))
    }

    /// True when neither table has entries.
    pub fn is_empty(&self) -> bool {
        self.validations.is_empty() && self.computed_values.is_empty()
    }
}

/// Evaluates named rules of one table with one operator table.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    table: &'a RuleTable,
    operators: &'a Operators,
}

impl<'a> RuleEngine<'a> {
    /// Bind a rule table to an operator table.
    pub fn new(table: &'a RuleTable, operators: &'a Operators) -> Self {
        Self { table, operators }
    }

    /// Evaluate the validation `name` to a boolean.
    ///
    /// # Errors
    ///
    /// [`FormError::UnknownRule`] when no such validation is declared, or
    /// any evaluation error.
    pub fn evaluate_validation(&self, name: &str, values: &Value) -> Result<bool> {
        let rule = self
            .table
            .validations
            .get(name)
            .ok_or_else(|| FormError::UnknownRule {
                table: "validations",
                name: name.to_string(),
            })?;
        let result = evaluate(&rule.rule, values, self.operators)?;
        trace!("validation `{name}` -> {result}");
        Ok(ops::truthy(&result))
    }

    /// Error message declared for the validation `name`.
    pub fn validation_message(&self, name: &str) -> Option<&'a str> {
        self.table
            .validations
            .get(name)
            .and_then(|r| r.error_message.as_deref())
    }

    /// Evaluate the computed value `name`.
    ///
    /// # Errors
    ///
    /// [`FormError::UnknownRule`] when no such computed value is declared,
    /// or any evaluation error.
    pub fn evaluate_computed_value(&self, name: &str, values: &Value) -> Result<Value> {
        let rule = self
            .table
            .computed_values
            .get(name)
            .ok_or_else(|| FormError::UnknownRule {
                table: "computedValues",
                name: name.to_string(),
            })?;
        let result = evaluate(&rule.rule, values, self.operators)?;
        trace!("computed value `{name}` -> {result}");
        Ok(result)
    }

    /// Substitute every `{{name}}` placeholder with the computed value `name`.
    ///
    /// `null` results substitute as an empty string.
    ///
    /// # Errors
    ///
    /// Same as [`RuleEngine::evaluate_computed_value`].
    pub fn interpolate(&self, template: &str, values: &Value) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in TEMPLATE.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            match self.evaluate_computed_value(name.as_str(), values)? {
                Value::Null => {}
                value => out.push_str(&ops::to_text(&value)),
            }
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }

    /// Evaluate a computed attribute declaration.
    ///
    /// A string containing `{{...}}` is a template, any other string names
    /// a computed value, an object is evaluated key by key. Returns `None`
    /// when the attribute should stay unset.
    ///
    /// # Errors
    ///
    /// [`FormError::InvalidRule`] for declarations of another shape, or any
    /// evaluation error.
    pub fn computed_attribute(&self, decl: &Value, values: &Value) -> Result<Option<Value>> {
        match decl {
            Value::String(s) if TEMPLATE.is_match(s) => {
                Ok(Some(Value::String(self.interpolate(s, values)?)))
            }
            Value::String(name) => match self.evaluate_computed_value(name, values)? {
                Value::Null => Ok(None),
                value => Ok(Some(value)),
            },
            Value::Object(entries) => {
                let mut out = Map::new();
                for (key, nested) in entries {
                    if let Some(value) = self.computed_attribute(nested, values)? {
                        out.insert(key.clone(), value);
                    }
                }
                Ok((!out.is_empty()).then_some(Value::Object(out)))
            }
            other => Err(FormError::InvalidRule {
                path: "x-jsf-logic-computedAttrs".to_string(),
                reason: format!("expected a rule name, template or object, found {other}"),
            }),
        }
    }
}

/// Make the value tree total over the schema's declared properties.
///
/// Every property the schema declares but `values` lacks is filled in with
/// `null`, recursing into object-typed properties, so rules can rely on a
/// complete, JSON-safe value space.
pub fn total_values(schema: &Value, values: &Value) -> Value {
    let mut out = values.as_object().cloned().unwrap_or_default();
    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(out);
    };
    for (name, prop) in props {
        let declares_object = prop.get("properties").is_some();
        match out.get_mut(name) {
            None => {
                let filled = if declares_object {
                    total_values(prop, &Value::Null)
                } else {
                    Value::Null
                };
                out.insert(name.clone(), filled);
            }
            Some(existing) if declares_object && existing.is_object() => {
                *existing = total_values(prop, existing);
            }
            Some(_) => {}
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> RuleTable {
        RuleTable::from_schema(&json!({
            "x-jsf-logic": {
                "validations": {
                    "adult": {"rule": {">=": [{"var": "age"}, 18]}, "errorMessage": "Too young"}
                },
                "computedValues": {
                    "next_age": {"rule": {"+": [{"var": "age"}, 1]}},
                    "nothing": {"rule": {"var": "absent"}}
                }
            }
        }))
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_validation() {
        let table = table();
        let ops = Operators::new();
        let engine = RuleEngine::new(&table, &ops);
        assert!(engine.evaluate_validation("adult", &json!({"age": 20})).unwrap());
        assert!(!engine.evaluate_validation("adult", &json!({"age": null})).unwrap());
        assert_eq!(engine.validation_message("adult"), Some("Too young"));
    }

    #[test]
    fn test_unknown_rule_is_error() {
        let table = table();
        let ops = Operators::new();
        let engine = RuleEngine::new(&table, &ops);
        let err = engine.evaluate_computed_value("missing", &json!({})).unwrap_err();
        assert!(matches!(err, FormError::UnknownRule { table: "computedValues", .. }));
        assert!(engine.evaluate_validation("next_age", &json!({})).is_err());
    }

    #[test]
    fn test_interpolate() {
        let table = table();
        let ops = Operators::new();
        let engine = RuleEngine::new(&table, &ops);
        let out = engine
            .interpolate("Next year you will be {{ next_age }}.{{nothing}}", &json!({"age": 41}))
            .unwrap();
        assert_eq!(out, "Next year you will be 42.");
    }

    #[test]
    fn test_computed_attribute_shapes() {
        let table = table();
        let ops = Operators::new();
        let engine = RuleEngine::new(&table, &ops);
        let values = json!({"age": 9});

        assert_eq!(engine.computed_attribute(&json!("next_age"), &values).unwrap(), Some(json!(10)));
        assert_eq!(engine.computed_attribute(&json!("nothing"), &values).unwrap(), None);
        assert_eq!(
            engine
                .computed_attribute(&json!({"minimum": "Must be {{next_age}}", "x": "nothing"}), &values)
                .unwrap(),
            Some(json!({"minimum": "Must be 10"}))
        );
        assert!(engine.computed_attribute(&json!(3), &values).is_err());
    }

    #[test]
    fn test_no_logic_block() {
        assert_eq!(RuleTable::from_schema(&json!({"type": "object"})).unwrap(), None);
        assert!(RuleTable::from_schema(&json!({"x-jsf-logic": {"validations": 3}})).is_err());
    }

    #[test]
    fn test_total_values() {
        let schema = json!({
            "properties": {
                "a": {"type": "string"},
                "b": {"type": "object", "properties": {"c": {"type": "number"}}},
                "d": {"type": "number"}
            }
        });
        let total = total_values(&schema, &json!({"d": 1, "b": {}}));
        assert_eq!(total, json!({"d": 1, "b": {"c": null}, "a": null}));
    }
}
