//! Schema validation.
//!
//! Validation failures are data: a list of [`ValidationError`] records, each
//! carrying the path into the value tree and the kind of violation. The
//! default implementation compiles schemas with the `jsonschema` crate.

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FormError, Result};

/// Kind of a validation failure, named after the keyword that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationKind {
    /// Wrong JSON type.
    Type,
    /// Required value is absent.
    Required,
    /// Value differs from `const`.
    Const,
    /// Value is not one of `enum`.
    Enum,
    /// String does not match `pattern`.
    Pattern,
    /// String does not match `format`.
    Format,
    /// Below `minimum`.
    Minimum,
    /// Above `maximum`.
    Maximum,
    /// Not above `exclusiveMinimum`.
    ExclusiveMinimum,
    /// Not below `exclusiveMaximum`.
    ExclusiveMaximum,
    /// Shorter than `minLength`.
    MinLength,
    /// Longer than `maxLength`.
    MaxLength,
    /// Fewer than `minItems`.
    MinItems,
    /// More than `maxItems`.
    MaxItems,
    /// Not a multiple of `multipleOf`.
    MultipleOf,
    /// A value was given for a property whose schema is `false`.
    Forbidden,
    /// A named `x-jsf-logic` validation failed.
    Rule,
    /// Any other keyword.
    Other,
}

impl ValidationKind {
    /// Keyword used to look up custom messages in `x-jsf-errorMessage`.
    pub fn keyword(&self) -> &'static str {
        match self {
            ValidationKind::Type => "type",
            ValidationKind::Required => "required",
            ValidationKind::Const => "const",
            ValidationKind::Enum => "enum",
            ValidationKind::Pattern => "pattern",
            ValidationKind::Format => "format",
            ValidationKind::Minimum => "minimum",
            ValidationKind::Maximum => "maximum",
            ValidationKind::ExclusiveMinimum => "exclusiveMinimum",
            ValidationKind::ExclusiveMaximum => "exclusiveMaximum",
            ValidationKind::MinLength => "minLength",
            ValidationKind::MaxLength => "maxLength",
            ValidationKind::MinItems => "minItems",
            ValidationKind::MaxItems => "maxItems",
            ValidationKind::MultipleOf => "multipleOf",
            ValidationKind::Forbidden => "forbidden",
            ValidationKind::Rule => "rule",
            ValidationKind::Other => "other",
        }
    }

    fn of(kind: &ValidationErrorKind) -> Self {
        match kind {
            ValidationErrorKind::Type { .. } => ValidationKind::Type,
            ValidationErrorKind::Required { .. } => ValidationKind::Required,
            ValidationErrorKind::Constant { .. } => ValidationKind::Const,
            ValidationErrorKind::Enum { .. } => ValidationKind::Enum,
            ValidationErrorKind::Pattern { .. } => ValidationKind::Pattern,
            ValidationErrorKind::Format { .. } => ValidationKind::Format,
            ValidationErrorKind::Minimum { .. } => ValidationKind::Minimum,
            ValidationErrorKind::Maximum { .. } => ValidationKind::Maximum,
            ValidationErrorKind::ExclusiveMinimum { .. } => ValidationKind::ExclusiveMinimum,
            ValidationErrorKind::ExclusiveMaximum { .. } => ValidationKind::ExclusiveMaximum,
            ValidationErrorKind::MinLength { .. } => ValidationKind::MinLength,
            ValidationErrorKind::MaxLength { .. } => ValidationKind::MaxLength,
            ValidationErrorKind::MinItems { .. } => ValidationKind::MinItems,
            ValidationErrorKind::MaxItems { .. } => ValidationKind::MaxItems,
            ValidationErrorKind::MultipleOf { .. } => ValidationKind::MultipleOf,
            ValidationErrorKind::FalseSchema { .. } => ValidationKind::Forbidden,
            _ => ValidationKind::Other,
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Path from the validated root to the failing value.
    pub path: Vec<String>,
    /// What failed.
    pub kind: ValidationKind,
    /// The failing value (`null` for absent required values).
    pub value: Value,
    /// JSON pointer of the failing keyword inside the schema.
    pub schema_path: String,
    /// Human readable message.
    pub message: String,
}

impl ValidationError {
    /// A "required" failure for the value at `path`.
    pub fn required(path: Vec<String>) -> Self {
        Self {
            path,
            kind: ValidationKind::Required,
            value: Value::Null,
            schema_path: "/required".to_string(),
            message: "Required field".to_string(),
        }
    }

    /// Dot-separated form of [`ValidationError::path`].
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// Same error with `prefix` prepended to its path.
    pub fn prefixed(mut self, prefix: &[String]) -> Self {
        let mut path = prefix.to_vec();
        path.append(&mut self.path);
        self.path = path;
        self
    }

    fn from_jsonschema(error: jsonschema::ValidationError<'_>) -> Self {
        let kind = ValidationKind::of(&error.kind);
        let mut path = pointer_segments(&error.instance_path.to_string());
        let mut value = error.instance.clone().into_owned();
        let message = match kind {
            ValidationKind::Required => "Required field".to_string(),
            ValidationKind::Forbidden => "Not allowed".to_string(),
            _ => error.to_string(),
        };
        if let ValidationErrorKind::Required { property } = &error.kind {
            if let Some(name) = property.as_str() {
                path.push(name.to_string());
            }
            value = Value::Null;
        }
        Self {
            path,
            kind,
            value,
            schema_path: error.schema_path.to_string(),
            message,
        }
    }
}

fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Schema validator collaborator.
pub trait SchemaValidator {
    /// Validate `value` against `schema`.
    ///
    /// # Errors
    ///
    /// Only when the schema itself cannot be compiled. Failures of `value`
    /// are returned in the `Ok` list.
    fn validate(&self, value: &Value, schema: &Value) -> Result<Vec<ValidationError>>;
}

/// A schema compiled once and validated against many times.
pub struct CompiledSchema {
    schema: Value,
    inner: jsonschema::Validator,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile `schema`. Formats are asserted, not just annotated.
    ///
    /// # Errors
    ///
    /// [`FormError::InvalidSchema`] when the schema does not compile.
    pub fn compile(schema: &Value) -> Result<Self> {
        let inner = jsonschema::options()
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| FormError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            schema: schema.clone(),
            inner,
        })
    }

    /// The schema this validator was compiled from.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate `value`, collecting every failure.
    pub fn validate(&self, value: &Value) -> Vec<ValidationError> {
        self.inner
            .iter_errors(value)
            .map(ValidationError::from_jsonschema)
            .collect()
    }
}

/// Default [`SchemaValidator`] backed by the `jsonschema` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, value: &Value, schema: &Value) -> Result<Vec<ValidationError>> {
        Ok(CompiledSchema::compile(schema)?.validate(value))
    }
}
