//! Headless form orchestration.
//!
//! [`HeadlessForm`] owns a schema and its live field tree. Every call to
//! [`HeadlessForm::handle_validation`] resolves the schema against the new
//! values, syncs the fields, and validates.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::FormOptions,
    error::{FormError, Result},
    field::{
        Field, FieldHandle,
        builder::{DefaultFieldBuilder, ERROR_MESSAGE_KEY, FieldBuilder},
        find_field,
        sync::FieldSynchronizer,
    },
    logic::{
        Operators,
        ops::to_text,
        rules::{RuleEngine, RuleTable},
        total_values,
    },
    resolver::{SchemaResolver, is_object_schema},
    validator::{JsonSchemaValidator, SchemaValidator, ValidationError, ValidationKind},
};

/// Key listing the named validations a property must pass.
pub const FIELD_VALIDATIONS_KEY: &str = "x-jsf-logic-validations";

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormValidation {
    /// Every failure, in the order they were found.
    pub errors: Vec<ValidationError>,
    /// First message per dotted field path.
    pub form_errors: BTreeMap<String, String>,
}

impl FormValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A schema-driven form without a UI.
pub struct HeadlessForm {
    schema: Value,
    fields: Vec<FieldHandle>,
    options: FormOptions,
    operators: Operators,
    builder: Box<dyn FieldBuilder>,
    validator: Box<dyn SchemaValidator>,
}

impl HeadlessForm {
    /// Create a form for `schema` with the default collaborators.
    ///
    /// # Errors
    ///
    /// [`FormError::InvalidSchema`] if `schema` is not an object, or any
    /// error from the initial resolution and field build.
    pub fn new(schema: Value, options: FormOptions) -> Result<Self> {
        Self::with_collaborators(
            schema,
            options,
            Box::new(DefaultFieldBuilder),
            Box::new(JsonSchemaValidator),
        )
    }

    /// Create a form with custom operators available to every pass,
    /// including the initial resolution.
    ///
    /// # Errors
    ///
    /// Same as [`HeadlessForm::new`], plus [`FormError::InvalidOperator`]
    /// when `operators` shadows a built-in.
    pub fn with_operators(schema: Value, options: FormOptions, operators: Operators) -> Result<Self> {
        Self::build(
            schema,
            options,
            Operators::new().extended(&operators)?,
            Box::new(DefaultFieldBuilder),
            Box::new(JsonSchemaValidator),
        )
    }

    /// Create a form with a custom field builder and schema validator.
    pub fn with_collaborators(
        schema: Value,
        options: FormOptions,
        builder: Box<dyn FieldBuilder>,
        validator: Box<dyn SchemaValidator>,
    ) -> Result<Self> {
        Self::build(schema, options, Operators::new(), builder, validator)
    }

    fn build(
        schema: Value,
        options: FormOptions,
        operators: Operators,
        builder: Box<dyn FieldBuilder>,
        validator: Box<dyn SchemaValidator>,
    ) -> Result<Self> {
        if !schema.is_object() {
            return Err(FormError::InvalidSchema(format!(
                "expected an object schema, found {schema}"
            )));
        }
        let resolved = SchemaResolver::new(&operators, validator.as_ref(), &options)
            .resolve(&schema, &Value::Null)?;
        let fields = builder
            .build_fields(&resolved, &schema, options.strict_input_type)?
            .into_iter()
            .map(Field::into_handle)
            .collect::<Vec<_>>();
        debug!("form created with {} top-level field(s)", fields.len());

        Ok(Self {
            schema,
            fields,
            options,
            operators,
            builder,
            validator,
        })
    }

    /// Create a form for a Rust type's JSON schema.
    pub fn for_type<C: JsonSchema>(options: FormOptions) -> anyhow::Result<Self> {
        let schema = serde_json::to_value(schemars::schema_for!(C))?;
        Ok(Self::new(schema, options)?)
    }

    /// Register a custom operator for every later pass.
    ///
    /// The form is already built at this point, so operators used by
    /// computed attributes must go through [`HeadlessForm::with_operators`].
    ///
    /// # Errors
    ///
    /// [`FormError::InvalidOperator`] for an empty or built-in name.
    pub fn with_operator(
        mut self,
        name: impl Into<String>,
        op: impl Fn(&[Value]) -> anyhow::Result<Value> + 'static,
    ) -> Result<Self> {
        self.operators.register(name, op)?;
        Ok(self)
    }

    /// The schema the form was created with.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    /// Top-level fields.
    pub fn fields(&self) -> &[FieldHandle] {
        &self.fields
    }

    /// Field by dotted path.
    pub fn field(&self, path: &str) -> Option<FieldHandle> {
        find_field(&self.fields, path)
    }

    /// Resolve the schema against `values` without touching the fields.
    pub fn resolved_schema(&self, values: &Value) -> Result<Value> {
        self.resolver(&self.operators).resolve(&self.schema, values)
    }

    fn resolver<'a>(&'a self, operators: &'a Operators) -> SchemaResolver<'a> {
        SchemaResolver::new(operators, self.validator.as_ref(), &self.options)
    }

    /// Validate `values` and update the fields.
    ///
    /// # Errors
    ///
    /// Only programmer errors: malformed rules, unknown operators, schemas
    /// that do not compile. Invalid values are reported in the returned
    /// [`FormValidation`].
    pub fn handle_validation(&self, values: &Value) -> Result<FormValidation> {
        self.run(values, &self.operators)
    }

    /// Same as [`HeadlessForm::handle_validation`] with extra custom
    /// operators for this pass only.
    pub fn handle_validation_with(&self, values: &Value, extra: &Operators) -> Result<FormValidation> {
        let operators = self.operators.extended(extra)?;
        self.run(values, &operators)
    }

    fn run(&self, values: &Value, operators: &Operators) -> Result<FormValidation> {
        let resolved = self.resolver(operators).resolve(&self.schema, values)?;
        FieldSynchronizer::new(self.builder.as_ref(), self.options.strict_input_type).sync(
            &self.fields,
            &resolved,
            &self.schema,
        )?;

        let mut submitted = values.clone();
        if self.options.legacy.treat_null_as_undefined {
            strip_nulls(&mut submitted);
        }
        if self.options.legacy.allow_forbidden_values {
            strip_hidden(&mut submitted, &resolved);
        }

        let mut errors = self.validator.validate(&submitted, &resolved)?;

        let table = RuleTable::from_schema(&resolved)?.unwrap_or_default();
        let rule_values = total_values(&resolved, values);
        let scope = RuleScope {
            engine: RuleEngine::new(&table, operators),
            values: &rule_values,
        };
        collect_rule_errors(&resolved, values, &scope, operators, &mut Vec::new(), &mut errors)?;

        let mut form_errors = BTreeMap::new();
        for error in &errors {
            let message = message_for(error, &resolved, &self.schema);
            form_errors.entry(error.dotted_path()).or_insert(message);
        }
        debug!("validation pass: {} error(s)", errors.len());

        Ok(FormValidation {
            errors,
            form_errors,
        })
    }
}

struct RuleScope<'r> {
    engine: RuleEngine<'r>,
    values: &'r Value,
}

fn collect_rule_errors(
    node: &Value,
    values: &Value,
    scope: &RuleScope<'_>,
    operators: &Operators,
    path: &mut Vec<String>,
    errors: &mut Vec<ValidationError>,
) -> Result<()> {
    let Some(props) = node.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (name, prop) in props {
        if !prop.is_object() {
            continue;
        }
        path.push(name.clone());
        let value = values.get(name).cloned().unwrap_or(Value::Null);

        if let Some(names) = prop.get(FIELD_VALIDATIONS_KEY).and_then(Value::as_array) {
            for rule in names.iter().filter_map(Value::as_str) {
                if scope.engine.evaluate_validation(rule, scope.values)? {
                    continue;
                }
                errors.push(ValidationError {
                    path: path.clone(),
                    kind: ValidationKind::Rule,
                    value: value.clone(),
                    schema_path: format!("/properties/{name}/{FIELD_VALIDATIONS_KEY}"),
                    message: scope
                        .engine
                        .validation_message(rule)
                        .unwrap_or("Invalid value")
                        .to_string(),
                });
            }
        }

        if is_object_schema(prop) {
            match RuleTable::from_schema(prop)? {
                Some(table) => {
                    let nested_values = total_values(prop, &value);
                    let nested = RuleScope {
                        engine: RuleEngine::new(&table, operators),
                        values: &nested_values,
                    };
                    collect_rule_errors(prop, &value, &nested, operators, path, errors)?;
                }
                None => collect_rule_errors(prop, &value, scope, operators, path, errors)?,
            }
        }
        path.pop();
    }
    Ok(())
}

/// Drop `null` entries from objects, recursively.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// Drop values submitted for properties the resolved schema hides.
fn strip_hidden(value: &mut Value, schema: &Value) {
    match value {
        Value::Object(map) => {
            let Some(props) = schema.get("properties").and_then(Value::as_object) else {
                return;
            };
            map.retain(|name, _| !matches!(props.get(name), Some(Value::Bool(false))));
            for (name, v) in map.iter_mut() {
                if let Some(prop) = props.get(name) {
                    strip_hidden(v, prop);
                }
            }
        }
        Value::Array(elements) => {
            for (index, element) in elements.iter_mut().enumerate() {
                if let Some(item) = schema_at(schema, &[index.to_string()]) {
                    strip_hidden(element, item);
                }
            }
        }
        _ => {}
    }
}

/// Schema node for a value path: properties by name, positional item
/// schemas or `items` for indices.
fn schema_at<'s>(schema: &'s Value, path: &[String]) -> Option<&'s Value> {
    let mut node = schema;
    for segment in path {
        node = match node.get("properties").and_then(|p| p.get(segment)) {
            Some(next) => next,
            None => {
                let index = segment.parse::<usize>().ok()?;
                let tuple = node.get("items").and_then(Value::as_array);
                node.get("prefixItems")
                    .and_then(|p| p.get(index))
                    .or_else(|| tuple.and_then(|t| t.get(index)))
                    .or_else(|| match tuple {
                        Some(_) => node.get("additionalItems"),
                        None => node.get("items"),
                    })?
            }
        };
    }
    Some(node)
}

fn message_for(error: &ValidationError, resolved: &Value, original: &Value) -> String {
    let schema = schema_at(resolved, &error.path)
        .filter(|s| s.is_object())
        .or_else(|| schema_at(original, &error.path));

    if let Some(custom) = schema
        .and_then(|s| s.get(ERROR_MESSAGE_KEY))
        .and_then(|m| m.get(error.kind.keyword()))
        .and_then(Value::as_str)
    {
        return custom.to_string();
    }
    default_message(error, schema.unwrap_or(&Value::Null))
}

fn default_message(error: &ValidationError, schema: &Value) -> String {
    let keyword = |key: &str| schema.get(key).map(to_text).unwrap_or_default();
    match error.kind {
        ValidationKind::Required => "Required field".to_string(),
        ValidationKind::Type => match schema.get("type").and_then(Value::as_str) {
            Some(ty) => format!("The value must be a {ty}"),
            None => "Invalid type".to_string(),
        },
        ValidationKind::Const => format!("The only accepted value is {}", keyword("const")),
        ValidationKind::Enum => format!("The option {} is not valid", to_text(&error.value)),
        ValidationKind::Pattern => "Must have a valid format".to_string(),
        ValidationKind::Format => match schema.get("format").and_then(Value::as_str) {
            Some("email") => "Please enter a valid email address".to_string(),
            Some(format) => format!("Must be a valid {format} format"),
            None => "Must have a valid format".to_string(),
        },
        ValidationKind::Minimum => format!("Must be greater or equal to {}", keyword("minimum")),
        ValidationKind::Maximum => format!("Must be smaller or equal to {}", keyword("maximum")),
        ValidationKind::ExclusiveMinimum => {
            format!("Must be greater than {}", keyword("exclusiveMinimum"))
        }
        ValidationKind::ExclusiveMaximum => {
            format!("Must be smaller than {}", keyword("exclusiveMaximum"))
        }
        ValidationKind::MinLength => {
            format!("Please insert at least {} characters", keyword("minLength"))
        }
        ValidationKind::MaxLength => {
            format!("Please insert up to {} characters", keyword("maxLength"))
        }
        ValidationKind::MinItems => format!("Must have at least {} items", keyword("minItems")),
        ValidationKind::MaxItems => format!("Must have at most {} items", keyword("maxItems")),
        ValidationKind::MultipleOf => format!("Must be a multiple of {}", keyword("multipleOf")),
        ValidationKind::Forbidden => "Not allowed".to_string(),
        ValidationKind::Rule | ValidationKind::Other => error.message.clone(),
    }
}
