//! Conditional schema resolution.
//!
//! [`SchemaResolver::resolve`] folds every conditional branch that applies
//! to the current values into a copy of the schema and evaluates computed
//! attributes. The input schema is never modified: one deep copy is taken on
//! entry and every step works on that copy.
//!
//! ## Walk
//!
//! For each object node, depth first:
//!
//! 1. collect conditionals: the node's own `if`, then each `allOf` entry
//!    with an `if`, then each `x-jsf-logic.allOf` entry with an `if`;
//! 2. for each one, merge `then` when it matches and `else` when it does
//!    not (after resolving the branch's own conditionals), and strip
//!    `if`/`then`/`else` from the copy;
//! 3. hide properties that only a conditional branch makes required, unless
//!    they ended up required;
//! 4. recurse into object properties and array `items`, resolving object
//!    items once per submitted element into `prefixItems`;
//! 5. evaluate `x-jsf-logic-computedAttrs` of the node's properties.
//!
//! Later conditionals win scalar conflicts. `required` is always a union.
//! Roots declaring a draft older than 2020-12 get the tuple form instead:
//! an `items` array plus `additionalItems`.

use serde_json::{Map, Value};

use crate::{
    condition::ConditionMatcher,
    config::FormOptions,
    error::{FormError, Result},
    logic::{
        Operators,
        rules::{RuleEngine, RuleTable},
        total_values,
    },
    merge::{merge_schema, required_names},
    validator::SchemaValidator,
};

/// Key of per-property computed attribute declarations.
pub const COMPUTED_ATTRS_KEY: &str = "x-jsf-logic-computedAttrs";

/// Rule table and the values its rules are evaluated against.
struct LogicScope<'r> {
    table: &'r RuleTable,
    values: &'r Value,
}

/// An `if` clause with its branches, detached from the schema.
struct Conditional {
    clause: Value,
    then: Option<Value>,
    otherwise: Option<Value>,
}

impl Conditional {
    fn take(node: &mut Map<String, Value>) -> Option<Self> {
        let clause = node.remove("if")?;
        Some(Self {
            clause,
            then: node.remove("then"),
            otherwise: node.remove("else"),
        })
    }

    fn take_all(node: &mut Value) -> Vec<Self> {
        let mut out = Vec::new();
        let Some(obj) = node.as_object_mut() else {
            return out;
        };
        out.extend(Self::take(obj));
        if let Some(Value::Array(entries)) = obj.get_mut("allOf") {
            out.extend(
                entries
                    .iter_mut()
                    .filter_map(Value::as_object_mut)
                    .filter_map(Self::take),
            );
        }
        if let Some(Value::Array(entries)) = obj
            .get_mut(crate::logic::rules::LOGIC_KEY)
            .and_then(|logic| logic.get_mut("allOf"))
        {
            out.extend(
                entries
                    .iter_mut()
                    .filter_map(Value::as_object_mut)
                    .filter_map(Self::take),
            );
        }
        out
    }

    /// Names required by either branch, including nested conditionals.
    fn branch_required(&self, out: &mut Vec<String>) {
        for branch in [&self.then, &self.otherwise].into_iter().flatten() {
            collect_required(branch, out);
        }
    }
}

fn collect_required(branch: &Value, out: &mut Vec<String>) {
    for name in required_names(branch) {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    for key in ["then", "else"] {
        if let Some(nested) = branch.get(key) {
            collect_required(nested, out);
        }
    }
    if let Some(entries) = branch.get("allOf").and_then(Value::as_array) {
        for entry in entries {
            collect_required(entry, out);
        }
    }
}

/// Resolves conditional schemas against values.
pub struct SchemaResolver<'a> {
    operators: &'a Operators,
    validator: &'a dyn SchemaValidator,
    options: &'a FormOptions,
}

impl<'a> SchemaResolver<'a> {
    /// Create a resolver.
    pub fn new(
        operators: &'a Operators,
        validator: &'a dyn SchemaValidator,
        options: &'a FormOptions,
    ) -> Self {
        Self {
            operators,
            validator,
            options,
        }
    }

    /// Resolve `schema` against `values`.
    ///
    /// Deterministic: the same `(schema, values)` always produce the same
    /// result, and `schema` is left untouched.
    ///
    /// # Errors
    ///
    /// - [`FormError::InvalidSchema`] if `schema` is not an object;
    /// - [`FormError::NotAnObject`] if `values`, or a value under an
    ///   object-typed property, is neither an object nor `null`;
    /// - [`FormError::UnknownRule`] and other rule errors;
    /// - [`FormError::MissingProperty`] under the `error` policy.
    pub fn resolve(&self, schema: &Value, values: &Value) -> Result<Value> {
        if !schema.is_object() {
            return Err(FormError::InvalidSchema(format!(
                "expected an object schema, found {schema}"
            )));
        }
        let values = object_values(values, "")?;

        let table = RuleTable::from_schema(schema)?.unwrap_or_default();
        let rule_values = total_values(schema, &Value::Object(values.clone()));
        let logic = LogicScope {
            table: &table,
            values: &rule_values,
        };

        let mut resolved = schema.clone();
        self.resolve_node(&mut resolved, &values, &logic, "", true)?;
        if uses_tuple_items(schema) {
            to_tuple_items(&mut resolved);
        }
        Ok(resolved)
    }

    fn engine<'r>(&'r self, logic: &LogicScope<'r>) -> RuleEngine<'r> {
        RuleEngine::new(logic.table, self.operators)
    }

    fn resolve_node(
        &self,
        node: &mut Value,
        values: &Map<String, Value>,
        logic: &LogicScope<'_>,
        path: &str,
        conditionals: bool,
    ) -> Result<()> {
        if !node.is_object() {
            return Ok(());
        }

        if conditionals {
            let base_required = required_names(node);
            let mut revealed = Vec::new();
            self.fold_conditionals(node, None, values, logic, path, &mut revealed)?;
            hide_revealed(node, &base_required, &revealed, path);
        }

        let names: Vec<String> = node
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();

        for name in names {
            let child_path = join(path, &name);
            let Some(prop) = node
                .get_mut("properties")
                .and_then(|p| p.get_mut(&name))
                .filter(|p| p.is_object())
            else {
                continue;
            };

            if is_object_schema(prop) {
                let nested = match values.get(&name) {
                    Some(v) => object_values(v, &child_path)?,
                    None => Map::new(),
                };
                self.resolve_nested(prop, &nested, logic, &child_path, true)?;
            } else if has_type(prop, "array") {
                let elements: &[Value] = match values.get(&name) {
                    Some(Value::Array(elements)) => elements.as_slice(),
                    _ => &[],
                };
                self.resolve_items(prop, elements, logic, &child_path)?;
            }
        }

        self.apply_computed_attrs(node, logic, path)
    }

    /// Resolve the `items` of an array node.
    ///
    /// Object item schemas are resolved once per submitted element and the
    /// results become positional `prefixItems`, so every element gets its
    /// own conditionals. `items` itself is resolved against an empty element
    /// and covers anything past the submitted ones. Other item schemas keep
    /// their conditionals for the validator.
    fn resolve_items(
        &self,
        node: &mut Value,
        elements: &[Value],
        logic: &LogicScope<'_>,
        path: &str,
    ) -> Result<()> {
        let Some(template) = node.get("items").filter(|i| i.is_object()).cloned() else {
            return Ok(());
        };
        let template_path = format!("{path}[]");
        if !is_object_schema(&template) {
            if let Some(items) = node.get_mut("items") {
                self.resolve_nested(items, &Map::new(), logic, &template_path, false)?;
            }
            return Ok(());
        }

        let mut positional = Vec::with_capacity(elements.len());
        if node.get("prefixItems").is_some() {
            warn!("`{path}` declares its own prefixItems, elements are not resolved one by one");
        } else {
            for (index, element) in elements.iter().enumerate() {
                let element_path = format!("{path}.{index}");
                let values = object_values(element, &element_path)?;
                let mut item = template.clone();
                self.resolve_nested(&mut item, &values, logic, &element_path, true)?;
                positional.push(item);
            }
        }

        let mut item = template;
        self.resolve_nested(&mut item, &Map::new(), logic, &template_path, true)?;
        if let Some(obj) = node.as_object_mut() {
            obj.insert("items".into(), item);
            if !positional.is_empty() {
                obj.insert("prefixItems".into(), Value::Array(positional));
            }
        }
        Ok(())
    }

    /// Recurse into a nested node, switching to its own rule table when it
    /// declares one.
    fn resolve_nested(
        &self,
        node: &mut Value,
        values: &Map<String, Value>,
        logic: &LogicScope<'_>,
        path: &str,
        conditionals: bool,
    ) -> Result<()> {
        match RuleTable::from_schema(node)? {
            Some(table) => {
                let rule_values = total_values(node, &Value::Object(values.clone()));
                let own = LogicScope {
                    table: &table,
                    values: &rule_values,
                };
                self.resolve_node(node, values, &own, path, conditionals)
            }
            None => self.resolve_node(node, values, logic, path, conditionals),
        }
    }

    /// Fold the conditionals of `target` into it.
    ///
    /// `parent` is the node a branch belongs to; conditions inside a branch
    /// are matched against the parent merged with the branch so far.
    fn fold_conditionals(
        &self,
        target: &mut Value,
        parent: Option<&Value>,
        values: &Map<String, Value>,
        logic: &LogicScope<'_>,
        path: &str,
        revealed: &mut Vec<String>,
    ) -> Result<()> {
        for conditional in Conditional::take_all(target) {
            conditional.branch_required(revealed);

            let scope = match parent {
                Some(parent) => {
                    let mut scope = parent.clone();
                    merge_schema(&mut scope, target);
                    scope
                }
                None => target.clone(),
            };

            let matched = self.condition_holds(&conditional.clause, &scope, values, logic, path)?;
            debug!(
                "conditional at `{}` {}",
                if path.is_empty() { "<root>" } else { path },
                if matched { "matched" } else { "did not match" }
            );

            let branch = if matched {
                conditional.then
            } else {
                conditional.otherwise
            };
            if let Some(mut branch) = branch {
                self.fold_conditionals(&mut branch, Some(&scope), values, logic, path, revealed)?;
                trace!("merging branch into `{path}`: {branch}");
                merge_schema(target, &branch);
            }
        }
        Ok(())
    }

    fn condition_holds(
        &self,
        clause: &Value,
        scope: &Value,
        values: &Map<String, Value>,
        logic: &LogicScope<'_>,
        path: &str,
    ) -> Result<bool> {
        let matcher = ConditionMatcher::new(self.validator, self.options.missing_property);
        if !matcher.matches(clause, scope, values, path)? {
            return Ok(false);
        }
        if matcher.has_type_errors(clause, scope, values)? {
            return Ok(false);
        }

        if let Some(checks) = clause.get("validations").and_then(Value::as_object) {
            let engine = self.engine(logic);
            for (name, expectation) in checks {
                let expected = expectation
                    .get("const")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                if engine.evaluate_validation(name, logic.values)? != expected {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn apply_computed_attrs(
        &self,
        node: &mut Value,
        logic: &LogicScope<'_>,
        path: &str,
    ) -> Result<()> {
        let Some(props) = node.get_mut("properties").and_then(Value::as_object_mut) else {
            return Ok(());
        };
        let engine = self.engine(logic);

        for (name, prop) in props.iter_mut() {
            let Some(Value::Object(decls)) = prop.get(COMPUTED_ATTRS_KEY).cloned() else {
                continue;
            };
            let Some(target) = prop.as_object_mut() else {
                continue;
            };
            for (attr, decl) in &decls {
                if let Some(value) = engine.computed_attribute(decl, logic.values)? {
                    trace!("computed `{}`.{attr} = {value}", join(path, name));
                    target.insert(attr.clone(), value);
                }
            }
        }
        Ok(())
    }
}

/// Replace properties revealed only by conditionals with the `false`
/// sentinel unless they ended up required.
fn hide_revealed(node: &mut Value, base_required: &[String], revealed: &[String], path: &str) {
    if revealed.is_empty() {
        return;
    }
    let required = required_names(node);
    let Some(props) = node.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };
    for name in revealed {
        if required.contains(name) || base_required.contains(name) {
            continue;
        }
        if let Some(prop) = props.get_mut(name) {
            trace!("hiding conditional property `{}`", join(path, name));
            *prop = Value::Bool(false);
        }
    }
}

/// Whether the root `$schema` names a draft older than 2020-12, where
/// positional item schemas are written as an `items` array.
fn uses_tuple_items(schema: &Value) -> bool {
    schema
        .get("$schema")
        .and_then(Value::as_str)
        .is_some_and(|uri| {
            ["draft-04", "draft-06", "draft-07", "2019-09"]
                .iter()
                .any(|draft| uri.contains(draft))
        })
}

/// Rewrite `prefixItems` + `items` into `items` array + `additionalItems`.
fn to_tuple_items(node: &mut Value) {
    let Some(obj) = node.as_object_mut() else {
        return;
    };
    if let Some(prefix) = obj.remove("prefixItems") {
        if let Some(template) = obj.remove("items") {
            obj.insert("additionalItems".into(), template);
        }
        obj.insert("items".into(), prefix);
    }
    if let Some(Value::Object(props)) = obj.get_mut("properties") {
        props.values_mut().for_each(to_tuple_items);
    }
    match obj.get_mut("items") {
        Some(Value::Array(entries)) => entries.iter_mut().for_each(to_tuple_items),
        Some(item) => to_tuple_items(item),
        None => {}
    }
    if let Some(extra) = obj.get_mut("additionalItems") {
        to_tuple_items(extra);
    }
}

fn object_values(value: &Value, path: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(FormError::NotAnObject {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.to_string()
            },
            actual: other.to_string(),
        }),
    }
}

fn has_type(node: &Value, ty: &str) -> bool {
    match node.get("type") {
        Some(Value::String(s)) => s == ty,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(ty)),
        _ => false,
    }
}

/// An object-typed schema node, or an untyped one declaring properties.
pub(crate) fn is_object_schema(node: &Value) -> bool {
    has_type(node, "object") || (node.get("type").is_none() && node.get("properties").is_some())
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

    fn resolve(schema: &Value, values: Value) -> Value {
        let ops = Operators::new();
        let options = FormOptions::default();
        SchemaResolver::new(&ops, &JsonSchemaValidator, &options)
            .resolve(schema, &values)
            .unwrap()
    }

    fn jobs() -> Value {
        json!({
            "properties": {
                "isAdult": {"type": "boolean"},
                "hasJob": {"type": "boolean"},
                "salary": {"type": "string"}
            },
            "allOf": [
                {
                    "if": {"properties": {"isAdult": {"const": true}}, "required": ["isAdult"]},
                    "then": {"required": ["hasJob"]}
                },
                {
                    "if": {"properties": {"hasJob": {"const": true}}, "required": ["hasJob"]},
                    "then": {"required": ["salary"]}
                }
            ]
        })
    }

    #[test]
    fn test_does_not_mutate_input() {
        let schema = jobs();
        let before = schema.clone();
        let _ = resolve(&schema, json!({"isAdult": true, "hasJob": true}));
        assert_eq!(schema, before);
    }

    #[test]
    fn test_idempotent() {
        let schema = jobs();
        let values = json!({"isAdult": true});
        assert_eq!(resolve(&schema, values.clone()), resolve(&schema, values));
    }

    #[test]
    fn test_required_union_across_all_of() {
        let resolved = resolve(&jobs(), json!({"isAdult": true, "hasJob": true}));
        assert_eq!(resolved["required"], json!(["hasJob", "salary"]));
        assert_eq!(resolved["properties"]["salary"], json!({"type": "string"}));
    }

    #[test]
    fn test_conditional_fields_hidden_until_required() {
        let resolved = resolve(&jobs(), json!({"isAdult": true}));
        assert_eq!(resolved["required"], json!(["hasJob"]));
        assert_eq!(resolved["properties"]["hasJob"], json!({"type": "boolean"}));
        assert_eq!(resolved["properties"]["salary"], json!(false));

        let resolved = resolve(&jobs(), json!({}));
        assert_eq!(resolved["properties"]["hasJob"], json!(false));
        assert_eq!(resolved["properties"]["isAdult"], json!({"type": "boolean"}));
    }

    #[test]
    fn test_branches_are_stripped() {
        let resolved = resolve(&jobs(), json!({"isAdult": true}));
        for entry in resolved["allOf"].as_array().unwrap() {
            assert!(entry.get("if").is_none());
            assert!(entry.get("then").is_none());
            assert!(entry.get("else").is_none());
        }
    }

    #[test]
    fn test_else_branch_and_precedence() {
        let schema = json!({
            "properties": {
                "plan": {"type": "string"},
                "seats": {"type": "number", "maximum": 100}
            },
            "if": {"properties": {"plan": {"const": "pro"}}, "required": ["plan"]},
            "then": {"properties": {"seats": {"maximum": 500}}},
            "else": {"properties": {"seats": {"maximum": 5}}},
            "allOf": [{
                "if": {"properties": {"plan": {"const": "pro"}}, "required": ["plan"]},
                "then": {"properties": {"seats": {"maximum": 1000}}}
            }]
        });
        let resolved = resolve(&schema, json!({"plan": "pro"}));
        assert_eq!(resolved["properties"]["seats"]["maximum"], json!(1000));
        assert!(resolved.get("if").is_none());

        let resolved = resolve(&schema, json!({"plan": "free"}));
        assert_eq!(resolved["properties"]["seats"]["maximum"], json!(5));
    }

    #[test]
    fn test_type_error_suppresses_then() {
        let schema = json!({
            "properties": {"count": {"type": "number"}, "reason": {"type": "string"}},
            "if": {"properties": {"count": {"minimum": 1}}, "required": ["count"]},
            "then": {"required": ["reason"]}
        });
        let resolved = resolve(&schema, json!({"count": "not-a-number"}));
        assert!(resolved.get("required").is_none());

        let resolved = resolve(&schema, json!({"count": 2}));
        assert_eq!(resolved["required"], json!(["reason"]));
    }

    #[test]
    fn test_nested_fieldset_conditionals() {
        let schema = json!({
            "properties": {
                "address": {
                    "type": "object",
                    "properties": {
                        "country": {"type": "string"},
                        "state": {"type": "string"}
                    },
                    "if": {"properties": {"country": {"const": "US"}}, "required": ["country"]},
                    "then": {"required": ["state"]}
                }
            }
        });
        let resolved = resolve(&schema, json!({"address": {"country": "US"}}));
        assert_eq!(resolved["properties"]["address"]["required"], json!(["state"]));

        let resolved = resolve(&schema, json!({}));
        assert_eq!(resolved["properties"]["address"]["properties"]["state"], json!(false));
    }

    #[test]
    fn test_nested_conditionals_inside_branch() {
        let schema = json!({
            "properties": {
                "a": {"type": "boolean"},
                "b": {"type": "boolean"},
                "c": {"type": "string"}
            },
            "if": {"properties": {"a": {"const": true}}, "required": ["a"]},
            "then": {
                "if": {"properties": {"b": {"const": true}}, "required": ["b"]},
                "then": {"required": ["c"]}
            }
        });
        let resolved = resolve(&schema, json!({"a": true, "b": true}));
        assert_eq!(resolved["required"], json!(["c"]));
        let resolved = resolve(&schema, json!({"a": true}));
        assert_eq!(resolved["properties"]["c"], json!(false));
    }

    #[test]
    fn test_validation_conditionals() {
        let schema = json!({
            "properties": {
                "age": {"type": "number"},
                "guardian": {"type": "string"}
            },
            "x-jsf-logic": {
                "validations": {
                    "minor": {"rule": {"<": [{"var": "age"}, 18]}}
                },
                "allOf": [{
                    "if": {"validations": {"minor": {"const": true}}},
                    "then": {"required": ["guardian"]}
                }]
            }
        });
        let resolved = resolve(&schema, json!({"age": 12}));
        assert_eq!(resolved["required"], json!(["guardian"]));
        assert!(resolved["x-jsf-logic"]["allOf"][0].get("then").is_none());

        let resolved = resolve(&schema, json!({"age": 30}));
        assert_eq!(resolved["properties"]["guardian"], json!(false));
    }

    #[test]
    fn test_computed_attrs() {
        let schema = json!({
            "properties": {
                "max": {"type": "number"},
                "amount": {
                    "type": "number",
                    "x-jsf-logic-computedAttrs": {
                        "maximum": "max_amount",
                        "description": "At most {{max_amount}}"
                    }
                }
            },
            "x-jsf-logic": {
                "computedValues": {"max_amount": {"rule": {"*": [{"var": "max"}, 2]}}}
            }
        });
        let resolved = resolve(&schema, json!({"max": 10}));
        assert_eq!(resolved["properties"]["amount"]["maximum"], json!(20));
        assert_eq!(resolved["properties"]["amount"]["description"], json!("At most 20"));
    }

    #[test]
    fn test_unknown_computed_value_is_error() {
        let schema = json!({
            "properties": {
                "amount": {"type": "number", "x-jsf-logic-computedAttrs": {"maximum": "nope"}}
            }
        });
        let ops = Operators::new();
        let options = FormOptions::default();
        let err = SchemaResolver::new(&ops, &JsonSchemaValidator, &options)
            .resolve(&schema, &json!({}))
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownRule { .. }));
    }

    #[test]
    fn test_non_object_value_for_object_property() {
        let schema = json!({
            "properties": {"address": {"type": "object", "properties": {}}}
        });
        let ops = Operators::new();
        let options = FormOptions::default();
        let err = SchemaResolver::new(&ops, &JsonSchemaValidator, &options)
            .resolve(&schema, &json!({"address": 3}))
            .unwrap_err();
        assert!(matches!(err, FormError::NotAnObject { path, .. } if path == "address"));
    }

    fn pets() -> Value {
        json!({
            "properties": {
                "pets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"kind": {"type": "string"}, "breed": {"type": "string"}},
                        "if": {"properties": {"kind": {"const": "dog"}}},
                        "then": {"required": ["breed"]}
                    }
                }
            }
        })
    }

    #[test]
    fn test_array_items_resolved_per_element() {
        let resolved = resolve(&pets(), json!({"pets": [{"kind": "cat"}, {"kind": null}, {"kind": "dog", "breed": "pug"}]}));
        let pets = &resolved["properties"]["pets"];
        let positional = pets["prefixItems"].as_array().unwrap();
        assert_eq!(positional.len(), 3);
        assert_eq!(positional[0]["properties"]["breed"], json!(false));
        assert!(positional[0].get("if").is_none());
        assert_eq!(positional[1]["required"], json!(["breed"]));
        assert_eq!(positional[2]["required"], json!(["breed"]));

        assert!(pets["items"].get("if").is_none());
        assert_eq!(pets["items"]["required"], json!(["breed"]));
    }

    #[test]
    fn test_array_items_without_values() {
        let resolved = resolve(&pets(), json!({}));
        let pets = &resolved["properties"]["pets"];
        assert!(pets.get("prefixItems").is_none());
        assert!(pets["items"].get("then").is_none());
    }

    #[test]
    fn test_array_element_must_be_object() {
        let ops = Operators::new();
        let options = FormOptions::default();
        let err = SchemaResolver::new(&ops, &JsonSchemaValidator, &options)
            .resolve(&pets(), &json!({"pets": ["dog"]}))
            .unwrap_err();
        assert!(matches!(err, FormError::NotAnObject { path, .. } if path == "pets.0"));
    }

    #[test]
    fn test_array_items_in_older_drafts() {
        let mut schema = pets();
        schema["$schema"] = json!("http://json-schema.org/draft-07/schema#");
        let resolved = resolve(&schema, json!({"pets": [{"kind": "dog"}]}));
        let pets = &resolved["properties"]["pets"];
        assert!(pets.get("prefixItems").is_none());
        assert_eq!(pets["items"][0]["required"], json!(["breed"]));
        assert!(pets["additionalItems"].is_object());
    }

    #[test]
    fn test_nested_all_of_in_branch_keeps_node_entries() {
        let schema = json!({
            "properties": {
                "a": {"type": "boolean"},
                "b": {"type": "boolean"},
                "c": {"type": "string"},
                "x": {"type": "string"}
            },
            "allOf": [
                {
                    "if": {"properties": {"a": {"const": true}}, "required": ["a"]},
                    "then": {
                        "allOf": [{
                            "if": {"properties": {"b": {"const": true}}, "required": ["b"]},
                            "then": {"required": ["c"]}
                        }]
                    }
                },
                {"properties": {"x": {"minLength": 2}}}
            ]
        });
        let resolved = resolve(&schema, json!({"a": true, "b": true}));
        assert_eq!(resolved["required"], json!(["c"]));
        let entries = resolved["allOf"].as_array().unwrap();
        assert!(entries.contains(&json!({"properties": {"x": {"minLength": 2}}})));

        let errors = JsonSchemaValidator
            .validate(&json!({"a": true, "b": true, "c": "ok", "x": "y"}), &resolved)
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, crate::validator::ValidationKind::MinLength);
    }
}
