//! Deep merge and prune over JSON trees.
//!
//! Every function here is total: any pair of [`Value`]s has a defined
//! result. Objects merge key by key, everything else is replaced.

use serde_json::{Map, Value};

/// Merge `source` into `target`.
///
/// Objects are merged recursively, any other shape in `source` replaces
/// the value in `target`. Arrays are replaced, not concatenated.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => deep_merge_map(t, s),
        (t, s) => *t = s.clone(),
    }
}

/// Merge the entries of `source` into `target`.
pub fn deep_merge_map(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match target.get_mut(key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge a schema branch into a schema node.
///
/// Same as [`deep_merge`] except for the keywords that combine:
///
/// - `required` arrays are unioned at every level, keeping first-seen order;
/// - `allOf` entries of the branch are appended to the node's;
/// - an `anyOf`/`oneOf` the node already has is kept, and the branch's one
///   is added to `allOf` so both still apply.
pub fn merge_schema(target: &mut Value, branch: &Value) {
    match (target, branch) {
        (Value::Object(t), Value::Object(b)) => merge_schema_map(t, b),
        (t, b) => *t = b.clone(),
    }
}

fn merge_schema_map(target: &mut Map<String, Value>, branch: &Map<String, Value>) {
    for (key, value) in branch {
        match key.as_str() {
            "required" => {
                union_required(target, value);
                continue;
            }
            "allOf" => {
                if let Value::Array(entries) = value {
                    append_all_of(target, entries.iter().cloned());
                    continue;
                }
            }
            "anyOf" | "oneOf" if target.contains_key(key) && target.get(key) != Some(value) => {
                let mut wrapped = Map::new();
                wrapped.insert(key.clone(), value.clone());
                append_all_of(target, std::iter::once(Value::Object(wrapped)));
                continue;
            }
            _ => {}
        }
        match target.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                merge_schema(existing, value)
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn append_all_of(target: &mut Map<String, Value>, entries: impl IntoIterator<Item = Value>) {
    let all_of = target
        .entry("allOf")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !all_of.is_array() {
        *all_of = Value::Array(Vec::new());
    }
    if let Value::Array(list) = all_of {
        list.extend(entries);
    }
}

fn union_required(target: &mut Map<String, Value>, extra: &Value) {
    let Some(extra) = extra.as_array() else {
        return;
    };
    let required = target
        .entry("required")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !required.is_array() {
        *required = Value::Array(Vec::new());
    }
    if let Value::Array(list) = required {
        for name in extra {
            if !list.contains(name) {
                list.push(name.clone());
            }
        }
    }
}

/// Remove from `target` every key that `reference` does not define.
///
/// Recurses into keys where both sides hold objects.
pub fn prune_missing(target: &mut Map<String, Value>, reference: &Map<String, Value>) {
    target.retain(|key, _| reference.contains_key(key));
    for (key, value) in target.iter_mut() {
        if let (Value::Object(t), Some(Value::Object(r))) = (value, reference.get(key)) {
            prune_missing(t, r);
        }
    }
}

/// Names listed in a schema node's `required` array.
pub fn required_names(node: &Value) -> Vec<String> {
    node.get("required")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_nested() {
        let mut target = json!({"a": {"b": 1, "c": [1, 2]}, "d": "x"});
        deep_merge(&mut target, &json!({"a": {"c": [3], "e": true}, "d": {"f": 1}}));
        assert_eq!(target, json!({"a": {"b": 1, "c": [3], "e": true}, "d": {"f": 1}}));
    }

    #[test]
    fn test_merge_schema_unions_required() {
        let mut node = json!({
            "required": ["a"],
            "properties": {"a": {"type": "string"}, "n": {"type": "object", "required": ["x"]}}
        });
        merge_schema(
            &mut node,
            &json!({
                "required": ["b", "a"],
                "properties": {"a": {"maxLength": 3}, "n": {"required": ["y"]}}
            }),
        );
        assert_eq!(node["required"], json!(["a", "b"]));
        assert_eq!(node["properties"]["a"], json!({"type": "string", "maxLength": 3}));
        assert_eq!(node["properties"]["n"]["required"], json!(["x", "y"]));
    }

    #[test]
    fn test_merge_schema_combines_composition_keywords() {
        let mut node = json!({
            "allOf": [{"properties": {"x": {"minLength": 2}}}],
            "anyOf": [{"required": ["a"]}, {"required": ["b"]}]
        });
        merge_schema(
            &mut node,
            &json!({
                "allOf": [{"properties": {"y": {"maxLength": 4}}}],
                "anyOf": [{"required": ["c"]}]
            }),
        );
        assert_eq!(
            node["allOf"],
            json!([
                {"properties": {"x": {"minLength": 2}}},
                {"properties": {"y": {"maxLength": 4}}},
                {"anyOf": [{"required": ["c"]}]}
            ])
        );
        assert_eq!(node["anyOf"], json!([{"required": ["a"]}, {"required": ["b"]}]));

        let mut node = json!({"properties": {}});
        merge_schema(&mut node, &json!({"oneOf": [{"required": ["a"]}]}));
        assert_eq!(node["oneOf"], json!([{"required": ["a"]}]));
    }

    #[test]
    fn test_merge_schema_into_false_property() {
        let mut node = json!({"properties": {"a": false}});
        merge_schema(&mut node, &json!({"properties": {"a": {"type": "string"}}}));
        assert_eq!(node["properties"]["a"], json!({"type": "string"}));
    }

    #[test]
    fn test_prune_missing() {
        let mut target = json!({"a": 1, "b": {"c": 1, "d": 2}, "e": 3});
        let reference = json!({"a": 0, "b": {"d": 0}});
        prune_missing(
            target.as_object_mut().unwrap(),
            reference.as_object().unwrap(),
        );
        assert_eq!(target, json!({"a": 1, "b": {"d": 2}}));
    }
}
