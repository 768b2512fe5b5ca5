//! Building fields from schema properties.

use serde_json::{Map, Value};

use super::{Field, InputType};
use crate::{
    error::{FormError, Result},
    merge::required_names,
};

/// Presentation block of a property.
pub const PRESENTATION_KEY: &str = "x-jsf-presentation";
/// Per-keyword custom error messages of a property.
pub const ERROR_MESSAGE_KEY: &str = "x-jsf-errorMessage";

/// Schema keywords copied to field attributes as they are.
const PASS_THROUGH: &[&str] = &[
    "const",
    "default",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "minItems",
    "maxItems",
    "multipleOf",
    "readOnly",
    "deprecated",
];

/// Builds field descriptors from schema nodes.
///
/// Implementations must be deterministic and must return one field per
/// schema property, in declaration order.
pub trait FieldBuilder {
    /// Build one field.
    ///
    /// # Arguments
    ///
    /// * `name` - property name
    /// * `schema` - the property in the resolved schema, possibly `false`
    /// * `required` - whether the resolved parent requires it
    /// * `original` - the same property in the unresolved schema, used for
    ///   type information when `schema` is a boolean
    /// * `strict` - fail on properties whose input type cannot be inferred
    fn build_field(
        &self,
        name: &str,
        schema: &Value,
        required: bool,
        original: Option<&Value>,
        strict: bool,
    ) -> Result<Field>;

    /// Build the fields of every property of an object schema node.
    fn build_fields(&self, schema: &Value, original: &Value, strict: bool) -> Result<Vec<Field>> {
        let Some(props) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        let required = required_names(schema);
        let original_props = original.get("properties");
        props
            .iter()
            .map(|(name, prop)| {
                let original = original_props.and_then(|p| p.get(name));
                self.build_field(name, prop, required.contains(name), original, strict)
            })
            .collect()
    }
}

/// Field builder for `x-jsf-*` annotated schemas.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFieldBuilder;

impl FieldBuilder for DefaultFieldBuilder {
    fn build_field(
        &self,
        name: &str,
        schema: &Value,
        required: bool,
        original: Option<&Value>,
        strict: bool,
    ) -> Result<Field> {
        let hidden = matches!(schema, Value::Bool(false));
        let empty = Value::Object(Map::new());
        let typed = if schema.is_object() {
            schema
        } else {
            original.filter(|o| o.is_object()).unwrap_or(&empty)
        };
        let original = original.unwrap_or(typed);

        let mut field = Field::new(name);
        field.input_type = infer_input_type(name, typed, strict)?;
        field.json_type = json_type(typed).map(str::to_string);
        field.label = typed.get("title").and_then(Value::as_str).map(str::to_string);
        field.description = typed
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        field.required = required;
        field.is_visible = required || !hidden;
        field.schema = typed.clone();
        field.attributes = attributes(typed, field.input_type);

        let children = match field.input_type {
            InputType::Fieldset => Some(self.build_fields(typed, original, strict)?),
            InputType::GroupArray => {
                let items = item_template(typed).unwrap_or(&empty);
                let original_items = item_template(original).unwrap_or(items);
                Some(self.build_fields(items, original_items, strict)?)
            }
            _ => None,
        };
        field.fields = children.map(|c| c.into_iter().map(Field::into_handle).collect());

        Ok(field)
    }
}

fn json_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(ty) => Some(ty.as_str()),
        Value::Array(types) => types.iter().filter_map(Value::as_str).find(|t| *t != "null"),
        _ => None,
    }
}

fn const_options(schema: &Value) -> Option<&Vec<Value>> {
    ["oneOf", "anyOf"].into_iter().find_map(|key| {
        schema
            .get(key)
            .and_then(Value::as_array)
            .filter(|list| !list.is_empty() && list.iter().all(|o| o.get("const").is_some()))
    })
}

fn infer_input_type(name: &str, schema: &Value, strict: bool) -> Result<InputType> {
    if let Some(declared) = schema
        .get(PRESENTATION_KEY)
        .and_then(|p| p.get("inputType"))
        .and_then(Value::as_str)
    {
        if let Some(ty) = InputType::from_name(declared) {
            return Ok(ty);
        }
        if strict {
            return Err(FormError::UnknownInputType(name.to_string()));
        }
        warn!("field `{name}`: unknown input type `{declared}`, using text");
        return Ok(InputType::Text);
    }

    if const_options(schema).is_some() {
        return Ok(InputType::Radio);
    }
    if schema.get("enum").is_some() {
        return Ok(InputType::Select);
    }

    let ty = match json_type(schema) {
        Some("string") => match schema.get("format").and_then(Value::as_str) {
            Some("email") => InputType::Email,
            Some("date") => InputType::Date,
            _ => InputType::Text,
        },
        Some("number" | "integer") => InputType::Number,
        Some("boolean") => InputType::Checkbox,
        Some("object") => InputType::Fieldset,
        Some("array") => {
            match item_template(schema) {
                Some(items) if json_type(items) == Some("object") || items.get("properties").is_some() => {
                    InputType::GroupArray
                }
                Some(items) if items.get("enum").is_some() || const_options(items).is_some() => {
                    InputType::Select
                }
                _ => return fallback(name, strict),
            }
        }
        None if schema.get("properties").is_some() => InputType::Fieldset,
        _ => return fallback(name, strict),
    };
    Ok(ty)
}

/// Schema shared by array elements. In the tuple form (`items` array) that
/// is `additionalItems`.
fn item_template(schema: &Value) -> Option<&Value> {
    match schema.get("items") {
        Some(Value::Array(_)) => schema.get("additionalItems"),
        items => items,
    }
}

fn fallback(name: &str, strict: bool) -> Result<InputType> {
    if strict {
        return Err(FormError::UnknownInputType(name.to_string()));
    }
    debug!("field `{name}`: no input type inferred, using text");
    Ok(InputType::Text)
}

fn attributes(schema: &Value, input_type: InputType) -> Map<String, Value> {
    let mut attrs = Map::new();

    for key in PASS_THROUGH {
        if let Some(value) = schema.get(*key) {
            attrs.insert(key.to_string(), value.clone());
        }
    }
    if let Some(messages) = schema.get(ERROR_MESSAGE_KEY) {
        attrs.insert("errorMessage".into(), messages.clone());
    }

    let options_source = match item_template(schema) {
        Some(items) if input_type == InputType::Select && json_type(schema) == Some("array") => {
            attrs.insert("multiple".into(), Value::Bool(true));
            items
        }
        _ => schema,
    };
    if let Some(options) = options(options_source) {
        attrs.insert("options".into(), Value::Array(options));
    }

    if let Some(Value::Object(presentation)) = schema.get(PRESENTATION_KEY) {
        for (key, value) in presentation {
            if key != "inputType" {
                attrs.insert(key.clone(), value.clone());
            }
        }
    }
    attrs
}

fn options(schema: &Value) -> Option<Vec<Value>> {
    if let Some(list) = const_options(schema) {
        return Some(
            list.iter()
                .map(|o| {
                    let value = o.get("const").cloned().unwrap_or(Value::Null);
                    let label = o.get("title").cloned().unwrap_or_else(|| value.clone());
                    let mut option = Map::new();
                    option.insert("label".into(), label);
                    option.insert("value".into(), value);
                    if let Some(description) = o.get("description") {
                        option.insert("description".into(), description.clone());
                    }
                    Value::Object(option)
                })
                .collect(),
        );
    }
    let values = schema.get("enum").and_then(Value::as_array)?;
    Some(
        values
            .iter()
            .map(|v| {
                let mut option = Map::new();
                option.insert("label".into(), v.clone());
                option.insert("value".into(), v.clone());
                Value::Object(option)
            })
            .collect(),
    )
}
