//! Matching of `if` clauses against the current values.
//!
//! The rules differ from plain JSON Schema `if` evaluation in two ways:
//!
//! - absent and `null` values match vacuously unless the clause lists the
//!   property in its own `required`, because front ends tend to submit
//!   `null` for every empty field;
//! - `const` compares through string coercion, since a front end may hold
//!   `"1"` where the schema says `1`.

use regex::Regex;
use serde_json::{Map, Value};

use crate::{
    config::MissingPropertyPolicy,
    error::{FormError, Result},
    logic::ops::to_text,
    merge::{merge_schema, required_names},
    validator::{SchemaValidator, ValidationKind},
};

/// Decides whether an `if` clause holds for a value tree.
pub struct ConditionMatcher<'a> {
    validator: &'a dyn SchemaValidator,
    policy: MissingPropertyPolicy,
}

impl<'a> ConditionMatcher<'a> {
    /// Matcher using `validator` for the generic fallback.
    pub fn new(validator: &'a dyn SchemaValidator, policy: MissingPropertyPolicy) -> Self {
        Self { validator, policy }
    }

    /// True when `clause` holds for `values`.
    ///
    /// `scope` is the schema node declaring the properties the clause
    /// talks about. `path` is used in diagnostics only.
    ///
    /// # Errors
    ///
    /// [`FormError::MissingProperty`] under [`MissingPropertyPolicy::Error`],
    /// [`FormError::InvalidPattern`], or a schema that does not compile.
    pub fn matches(
        &self,
        clause: &Value,
        scope: &Value,
        values: &Map<String, Value>,
        path: &str,
    ) -> Result<bool> {
        let clause = match clause {
            Value::Bool(b) => return Ok(*b),
            Value::Object(clause) => clause,
            other => {
                warn!("ignoring malformed if clause at `{path}`: {other}");
                return Ok(false);
            }
        };

        let required: Vec<String> = clause
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let properties = clause.get("properties").and_then(Value::as_object);

        for name in &required {
            let declared = properties.is_some_and(|p| p.contains_key(name));
            if !declared && is_blank(values.get(name)) {
                return Ok(false);
            }
        }

        if let Some(properties) = properties {
            for (name, sub) in properties {
                let Some(field_schema) = self.field_schema(scope, name, path)? else {
                    return Ok(false);
                };
                let is_required = required.contains(name);
                if !self.property_matches(
                    name,
                    sub,
                    field_schema,
                    values.get(name),
                    is_required,
                    path,
                )? {
                    trace!("if clause at `{path}`: `{name}` does not match");
                    return Ok(false);
                }
            }
        }

        if let Some(all) = clause.get("allOf").and_then(Value::as_array) {
            for sub in all {
                if !self.matches(sub, scope, values, path)? {
                    return Ok(false);
                }
            }
        }
        if let Some(any) = clause.get("anyOf").and_then(Value::as_array) {
            let mut matched = false;
            for sub in any {
                if self.matches(sub, scope, values, path)? {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Ok(false);
            }
        }
        if let Some(not) = clause.get("not")
            && self.matches(not, scope, values, path)?
        {
            return Ok(false);
        }

        Ok(true)
    }

    /// True when a value required by `clause` has the wrong JSON type for
    /// its own declared schema.
    ///
    /// A conditional must not fire on a value of the wrong type even when
    /// it happens to coerce to the expected constant.
    ///
    /// # Errors
    ///
    /// A declared property schema that does not compile.
    pub fn has_type_errors(
        &self,
        clause: &Value,
        scope: &Value,
        values: &Map<String, Value>,
    ) -> Result<bool> {
        for name in required_names(clause) {
            let Some(value) = values.get(&name).filter(|v| !v.is_null()) else {
                continue;
            };
            let Some(schema) = scope
                .get("properties")
                .and_then(|p| p.get(&name))
                .filter(|s| s.is_object())
            else {
                continue;
            };
            let errors = self.validator.validate(value, schema)?;
            if errors.iter().any(|e| e.kind == ValidationKind::Type) {
                debug!("`{name}` has the wrong type, condition suppressed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn field_schema<'s>(&self, scope: &'s Value, name: &str, path: &str) -> Result<Option<&'s Value>> {
        if let Some(schema) = scope.get("properties").and_then(|p| p.get(name)) {
            return Ok(Some(schema));
        }
        let full = join(path, name);
        match self.policy {
            MissingPropertyPolicy::NoMatch => {
                debug!("conditional references undeclared property `{full}`, no match");
                Ok(None)
            }
            MissingPropertyPolicy::Error => Err(FormError::MissingProperty { path: full }),
        }
    }

    fn property_matches(
        &self,
        name: &str,
        sub: &Value,
        field_schema: &Value,
        value: Option<&Value>,
        required: bool,
        path: &str,
    ) -> Result<bool> {
        let value = match value {
            None | Some(Value::Null) => return Ok(!required),
            Some(v) => v,
        };

        let sub = match sub {
            Value::Bool(b) => return Ok(*b),
            Value::Object(sub) => sub,
            _ => return Ok(false),
        };

        if let Some(expected) = sub.get("const") {
            return Ok(to_text(value) == to_text(expected));
        }

        if let Some(options) = sub.get("enum").and_then(Value::as_array) {
            return Ok(options.contains(value));
        }

        if let (Some(pattern), Value::Array(items)) = (
            sub.get("contains")
                .and_then(|c| c.get("pattern"))
                .and_then(Value::as_str),
            value,
        ) {
            let re = Regex::new(pattern).map_err(|source| FormError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            return Ok(items.iter().any(|item| re.is_match(&to_text(item))));
        }

        if sub.contains_key("properties") {
            let Value::Object(nested) = value else {
                return Ok(false);
            };
            return self.matches(
                &Value::Object(sub.clone()),
                field_schema,
                nested,
                &join(path, name),
            );
        }

        let mut merged = if field_schema.is_object() {
            field_schema.clone()
        } else {
            Value::Object(Map::new())
        };
        merge_schema(&mut merged, &Value::Object(sub.clone()));
        Ok(self.validator.validate(value, &merged)?.is_empty())
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::JsonSchemaValidator;
    use serde_json::json;

    fn check(clause: Value, scope: Value, values: Value) -> bool {
        let matcher = ConditionMatcher::new(&JsonSchemaValidator, MissingPropertyPolicy::NoMatch);
        matcher
            .matches(&clause, &scope, values.as_object().unwrap(), "")
            .unwrap()
    }

    fn scope() -> Value {
        json!({
            "properties": {
                "a": {"type": "number"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "kind": {"type": "string"},
                "address": {
                    "type": "object",
                    "properties": {"country": {"type": "string"}}
                }
            }
        })
    }

    #[test]
    fn test_vacuous_match_on_absent_value() {
        let clause = json!({"properties": {"a": {"const": 1}}});
        assert!(check(clause.clone(), scope(), json!({})));
        assert!(check(clause, scope(), json!({"a": null})));

        let clause = json!({"properties": {"a": {"const": 1}}, "required": ["a"]});
        assert!(!check(clause.clone(), scope(), json!({})));
        assert!(!check(clause, scope(), json!({"a": null})));
    }

    #[test]
    fn test_const_loose_string_equality() {
        let clause = json!({"properties": {"a": {"const": 1}}, "required": ["a"]});
        assert!(check(clause.clone(), scope(), json!({"a": 1})));
        assert!(check(clause.clone(), scope(), json!({"a": "1"})));
        assert!(!check(clause, scope(), json!({"a": 2})));
    }

    #[test]
    fn test_enum_uses_native_equality() {
        let clause = json!({"properties": {"kind": {"enum": ["x", "y"]}}, "required": ["kind"]});
        assert!(check(clause.clone(), scope(), json!({"kind": "y"})));
        assert!(!check(clause, scope(), json!({"kind": "z"})));
    }

    #[test]
    fn test_contains_pattern() {
        let clause = json!({"properties": {"tags": {"contains": {"pattern": "^urgent"}}}, "required": ["tags"]});
        assert!(check(clause.clone(), scope(), json!({"tags": ["low", "urgent-ish"]})));
        assert!(!check(clause, scope(), json!({"tags": ["low"]})));
    }

    #[test]
    fn test_nested_properties() {
        let clause = json!({
            "properties": {"address": {"properties": {"country": {"const": "PT"}}, "required": ["country"]}},
            "required": ["address"]
        });
        assert!(check(clause.clone(), scope(), json!({"address": {"country": "PT"}})));
        assert!(!check(clause.clone(), scope(), json!({"address": {"country": "ES"}})));
        assert!(!check(clause, scope(), json!({"address": "PT"})));
    }

    #[test]
    fn test_generic_fallback_uses_field_schema() {
        let clause = json!({"properties": {"a": {"minimum": 10}}, "required": ["a"]});
        assert!(check(clause.clone(), scope(), json!({"a": 11})));
        assert!(!check(clause.clone(), scope(), json!({"a": 9})));
        assert!(!check(clause, scope(), json!({"a": "11"})));
    }

    #[test]
    fn test_undeclared_property_policy() {
        let clause = json!({"properties": {"ghost": {"const": 1}}});
        assert!(!check(clause.clone(), scope(), json!({"ghost": 1})));

        let strict = ConditionMatcher::new(&JsonSchemaValidator, MissingPropertyPolicy::Error);
        let err = strict
            .matches(&clause, &scope(), json!({}).as_object().unwrap(), "root")
            .unwrap_err();
        assert!(matches!(err, FormError::MissingProperty { path } if path == "root.ghost"));
    }

    #[test]
    fn test_composed_clauses() {
        let any = json!({"anyOf": [
            {"properties": {"a": {"const": 1}}, "required": ["a"]},
            {"properties": {"kind": {"const": "x"}}, "required": ["kind"]}
        ]});
        assert!(check(any.clone(), scope(), json!({"kind": "x"})));
        assert!(!check(any, scope(), json!({"a": 2})));

        let not = json!({"not": {"properties": {"a": {"const": 1}}, "required": ["a"]}});
        assert!(check(not.clone(), scope(), json!({"a": 2})));
        assert!(!check(not, scope(), json!({"a": 1})));
    }

    #[test]
    fn test_type_errors_suppress() {
        let matcher = ConditionMatcher::new(&JsonSchemaValidator, MissingPropertyPolicy::NoMatch);
        let clause = json!({"properties": {"a": {"const": 1}}, "required": ["a"]});
        let values = json!({"a": "1"});
        assert!(
            matcher
                .has_type_errors(&clause, &scope(), values.as_object().unwrap())
                .unwrap()
        );
        let values = json!({"a": 1});
        assert!(
            !matcher
                .has_type_errors(&clause, &scope(), values.as_object().unwrap())
                .unwrap()
        );
    }
}
