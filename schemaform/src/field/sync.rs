//! Field synchronization.
//!
//! After every value change the schema is resolved again and the field
//! builder produces a fresh field tree from it. [`FieldSynchronizer`] folds
//! that fresh tree into the live one: existing [`Field`]s are updated in
//! place, never replaced, so handles held by callers stay valid.

use serde_json::Value;

use super::{Field, FieldHandle, builder::FieldBuilder};
use crate::error::Result;

/// Keeps a live field tree in line with resolved schemas.
pub struct FieldSynchronizer<'a> {
    builder: &'a dyn FieldBuilder,
    strict: bool,
}

impl<'a> FieldSynchronizer<'a> {
    pub fn new(builder: &'a dyn FieldBuilder, strict: bool) -> Self {
        Self { builder, strict }
    }

    /// Update `fields` from `resolved`.
    ///
    /// # Arguments
    ///
    /// * `fields` - the live field tree
    /// * `resolved` - schema resolved against the current values
    /// * `original` - the unresolved schema, for type information of
    ///   hidden properties
    ///
    /// # Errors
    ///
    /// Whatever the field builder returns.
    pub fn sync(&self, fields: &[FieldHandle], resolved: &Value, original: &Value) -> Result<()> {
        let fresh: Vec<FieldHandle> = self
            .builder
            .build_fields(resolved, original, self.strict)?
            .into_iter()
            .map(Field::into_handle)
            .collect();
        merge_tree(fields, &fresh, "");
        Ok(())
    }
}

fn merge_tree(existing: &[FieldHandle], fresh: &[FieldHandle], path: &str) {
    for handle in existing {
        let mut field = handle.borrow_mut();
        let Some(counterpart) = fresh.iter().find(|f| f.borrow().name == field.name) else {
            warn!("no counterpart for field `{}` after resolution", join(path, &field.name));
            continue;
        };
        let counterpart = counterpart.borrow();
        field.merge_from(&counterpart);

        let Some(fresh_children) = &counterpart.fields else {
            continue;
        };
        match field.fields.clone() {
            Some(children) => merge_tree(&children, fresh_children, &join(path, &field.name)),
            None => field.fields = Some(fresh_children.clone()),
        }
    }
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
    use std::rc::Rc;

    use super::*;
    use crate::field::{builder::DefaultFieldBuilder, find_field};
    use serde_json::json;

    fn original() -> Value {
        json!({
            "properties": {
                "amount": {"type": "number"},
                "address": {
                    "type": "object",
                    "properties": {"zip": {"type": "string"}}
                }
            }
        })
    }

    fn build(schema: &Value) -> Vec<FieldHandle> {
        DefaultFieldBuilder
            .build_fields(schema, &original(), false)
            .unwrap()
            .into_iter()
            .map(Field::into_handle)
            .collect()
    }

    #[test]
    fn test_identity_preserved() {
        let fields = build(&original());
        let amount = find_field(&fields, "amount").unwrap();
        let zip = find_field(&fields, "address.zip").unwrap();

        let mut resolved = original();
        resolved["required"] = json!(["amount"]);
        resolved["properties"]["address"]["required"] = json!(["zip"]);
        FieldSynchronizer::new(&DefaultFieldBuilder, false)
            .sync(&fields, &resolved, &original())
            .unwrap();

        assert!(Rc::ptr_eq(&amount, &find_field(&fields, "amount").unwrap()));
        assert!(Rc::ptr_eq(&zip, &find_field(&fields, "address.zip").unwrap()));
        assert!(amount.borrow().required);
        assert!(zip.borrow().required);
    }

    #[test]
    fn test_attribute_pruned_when_no_longer_implied() {
        let fields = build(&original());
        let sync = FieldSynchronizer::new(&DefaultFieldBuilder, false);

        let mut resolved = original();
        resolved["properties"]["amount"]["maximum"] = json!(100);
        sync.sync(&fields, &resolved, &original()).unwrap();
        let amount = find_field(&fields, "amount").unwrap();
        assert_eq!(amount.borrow().attribute("maximum"), Some(&json!(100)));

        sync.sync(&fields, &original(), &original()).unwrap();
        assert!(amount.borrow().attribute("maximum").is_none());
    }

    #[test]
    fn test_hidden_then_revealed() {
        let mut resolved = original();
        resolved["properties"]["amount"] = json!(false);
        let fields = build(&resolved);
        let amount = find_field(&fields, "amount").unwrap();
        assert!(!amount.borrow().is_visible);

        FieldSynchronizer::new(&DefaultFieldBuilder, false)
            .sync(&fields, &original(), &original())
            .unwrap();
        assert!(amount.borrow().is_visible);
    }
}
