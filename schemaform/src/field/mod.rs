//! Field descriptors.
//!
//! A [`Field`] is the UI-facing projection of one schema property. Fields
//! are long-lived: callers keep [`FieldHandle`]s to them across value
//! changes, and synchronization updates them in place.
//!
//! ## Modules
//!
//! - [`builder`] - the field builder collaborator and its default
//! - [`sync`] - keeps a live field tree in line with a resolved schema

use std::{cell::OnceCell, cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::Result,
    merge::{deep_merge_map, prune_missing},
    validator::{CompiledSchema, ValidationError},
};

pub mod builder;
pub mod sync;

/// Shared, mutable handle to a field. Identity is [`Rc::ptr_eq`].
pub type FieldHandle = Rc<RefCell<Field>>;

/// Input classification of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    /// Single-line text.
    Text,
    /// Numeric input.
    Number,
    /// Text with email format.
    Email,
    /// Date picker.
    Date,
    /// Boolean toggle.
    Checkbox,
    /// One of a few constant options.
    Radio,
    /// One or more of a list of options.
    Select,
    /// Multi-line text.
    Textarea,
    /// File upload.
    File,
    /// Nested object.
    Fieldset,
    /// Repeated group of nested fields.
    GroupArray,
}

impl InputType {
    /// Parse an `x-jsf-presentation.inputType` name.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "text" => InputType::Text,
            "number" => InputType::Number,
            "email" => InputType::Email,
            "date" => InputType::Date,
            "checkbox" => InputType::Checkbox,
            "radio" => InputType::Radio,
            "select" => InputType::Select,
            "textarea" => InputType::Textarea,
            "file" => InputType::File,
            "fieldset" => InputType::Fieldset,
            "group-array" => InputType::GroupArray,
            _ => return None,
        };
        Some(ty)
    }

    /// Name used in `x-jsf-presentation.inputType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Number => "number",
            InputType::Email => "email",
            InputType::Date => "date",
            InputType::Checkbox => "checkbox",
            InputType::Radio => "radio",
            InputType::Select => "select",
            InputType::Textarea => "textarea",
            InputType::File => "file",
            InputType::Fieldset => "fieldset",
            InputType::GroupArray => "group-array",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field descriptor.
#[derive(Debug)]
pub struct Field {
    /// Property name.
    pub name: String,
    /// Input classification.
    pub input_type: InputType,
    /// JSON type from the schema, if declared.
    pub json_type: Option<String>,
    /// Label, from `title`.
    pub label: Option<String>,
    /// Description, from `description`.
    pub description: Option<String>,
    /// Whether the field is shown.
    pub is_visible: bool,
    /// Whether a value is required.
    pub required: bool,
    /// Schema the field's value is validated against.
    pub schema: Value,
    /// Presentation attributes and pass-through keywords.
    pub attributes: Map<String, Value>,
    /// Child fields of fieldsets and group arrays.
    pub fields: Option<Vec<FieldHandle>>,
    validator: OnceCell<CompiledSchema>,
}

impl Field {
    /// A visible, optional text field with an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: InputType::Text,
            json_type: None,
            label: None,
            description: None,
            is_visible: true,
            required: false,
            schema: Value::Object(Map::new()),
            attributes: Map::new(),
            fields: None,
            validator: OnceCell::new(),
        }
    }

    /// Wrap the field in a shared handle.
    pub fn into_handle(self) -> FieldHandle {
        Rc::new(RefCell::new(self))
    }

    /// Attribute by name.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<FieldHandle> {
        self.fields
            .as_ref()?
            .iter()
            .find(|f| f.borrow().name == name)
            .cloned()
    }

    /// Whether the lazy validator has been compiled.
    pub fn has_validator(&self) -> bool {
        self.validator.get().is_some()
    }

    /// Validate a value for this field.
    ///
    /// A missing or `null` value fails only when the field is both required
    /// and visible. Error paths start with the field name.
    ///
    /// # Errors
    ///
    /// The field's schema does not compile.
    pub fn validate(&self, value: Option<&Value>) -> Result<Vec<ValidationError>> {
        let prefix = [self.name.clone()];
        let Some(value) = value.filter(|v| !v.is_null()) else {
            if self.required && self.is_visible {
                return Ok(vec![ValidationError::required(prefix.to_vec())]);
            }
            return Ok(Vec::new());
        };
        Ok(self
            .compiled()?
            .validate(value)
            .into_iter()
            .map(|e| e.prefixed(&prefix))
            .collect())
    }

    fn compiled(&self) -> Result<&CompiledSchema> {
        if let Some(compiled) = self.validator.get() {
            return Ok(compiled);
        }
        let compiled = CompiledSchema::compile(&self.schema)?;
        trace!("compiled validator for field `{}`", self.name);
        Ok(self.validator.get_or_init(|| compiled))
    }

    /// Update this field from a freshly built one, keeping its identity.
    ///
    /// Attributes the fresh field no longer defines are removed, then the
    /// fresh attributes are merged in. The lazy validator is dropped when
    /// the schema, required flag or visibility changed. Children are not
    /// touched; see [`sync`].
    pub fn merge_from(&mut self, fresh: &Field) {
        let before = self.attributes.len();
        prune_missing(&mut self.attributes, &fresh.attributes);
        if self.attributes.len() != before {
            debug!(
                "field `{}`: pruned {} attribute(s)",
                self.name,
                before - self.attributes.len()
            );
        }
        deep_merge_map(&mut self.attributes, &fresh.attributes);

        let stale = self.schema != fresh.schema
            || self.required != fresh.required
            || self.is_visible != fresh.is_visible;

        self.input_type = fresh.input_type;
        self.json_type = fresh.json_type.clone();
        self.label = fresh.label.clone();
        self.description = fresh.description.clone();
        self.is_visible = fresh.is_visible;
        self.required = fresh.required;
        if self.schema != fresh.schema {
            self.schema = fresh.schema.clone();
        }
        if stale && self.validator.take().is_some() {
            trace!("field `{}`: validator reset", self.name);
        }
    }

    /// JSON view of the field and its children.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".into(), Value::String(self.name.clone()));
        out.insert("inputType".into(), Value::String(self.input_type.to_string()));
        if let Some(ty) = &self.json_type {
            out.insert("jsonType".into(), Value::String(ty.clone()));
        }
        if let Some(label) = &self.label {
            out.insert("label".into(), Value::String(label.clone()));
        }
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::String(description.clone()));
        }
        out.insert("isVisible".into(), Value::Bool(self.is_visible));
        out.insert("required".into(), Value::Bool(self.required));
        for (key, value) in &self.attributes {
            out.entry(key.clone()).or_insert_with(|| value.clone());
        }
        if let Some(children) = &self.fields {
            out.insert(
                "fields".into(),
                Value::Array(children.iter().map(|c| c.borrow().to_json()).collect()),
            );
        }
        Value::Object(out)
    }
}

/// Find a field by dotted path, e.g. `address.street`.
pub fn find_field(fields: &[FieldHandle], path: &str) -> Option<FieldHandle> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.iter().find(|f| f.borrow().name == first)?.clone();
    for segment in segments {
        let next = current.borrow().child(segment)?;
        current = next;
    }
    Some(current)
}
