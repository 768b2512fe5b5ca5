//! # schemaform
//!
//! Conditional JSON Schema resolution and headless form field
//! synchronization.
//!
//! A form is described by a JSON Schema whose `if`/`then`/`else` branches
//! and `x-jsf-logic` rules depend on the values being entered. On every
//! value change the schema is resolved into a plain schema with the
//! applicable branches folded in, and a long-lived field tree is updated in
//! place to match it.
//!
//! ## Features
//!
//! - `if`/`then`/`else` resolution across `allOf` and `x-jsf-logic.allOf`
//! - Lenient condition matching for partially filled forms
//! - JSON-Logic validations and computed values with per-form custom operators
//! - Computed field attributes and `{{name}}` templates
//! - Field descriptors that keep their identity across value changes
//! - Validation errors as data, with per-keyword custom messages
//!
//! ## Quick Start
//!
//! ```rust
//! use schemaform::{FormOptions, HeadlessForm};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "properties": {
//!         "isAdult": {"type": "boolean"},
//!         "hasJob": {"type": "boolean"}
//!     },
//!     "if": {"properties": {"isAdult": {"const": true}}, "required": ["isAdult"]},
//!     "then": {"required": ["hasJob"]}
//! });
//! let form = HeadlessForm::new(schema, FormOptions::default()).unwrap();
//! let has_job = form.field("hasJob").unwrap();
//! assert!(!has_job.borrow().is_visible);
//!
//! let result = form.handle_validation(&json!({"isAdult": true})).unwrap();
//! assert!(has_job.borrow().is_visible);
//! assert_eq!(result.form_errors["hasJob"], "Required field");
//! ```
//!
//! ## Modules
//!
//! - [`condition`] - matching of `if` clauses against values
//! - [`config`] - form options
//! - [`error`] - error types
//! - [`field`] - field descriptors, builder and synchronizer
//! - [`form`] - the [`HeadlessForm`] entry point
//! - [`logic`] - the side rule language
//! - [`merge`] - deep merge over JSON trees
//! - [`resolver`] - conditional schema resolution
//! - [`validator`] - schema validation

#[macro_use]
extern crate log;

pub mod condition;
pub mod config;
pub mod error;

/// Field descriptors and their synchronization with resolved schemas.
pub mod field;

/// Orchestration of resolve, sync and validate.
pub mod form;

/// JSON-Logic rules: evaluator, operator table and `x-jsf-logic` tables.
pub mod logic;

pub mod merge;
pub mod resolver;
pub mod validator;

pub use config::{FormOptions, LegacyOptions, MissingPropertyPolicy};
pub use error::{FormError, Result};
pub use field::{
    Field, FieldHandle, InputType,
    builder::{DefaultFieldBuilder, FieldBuilder},
    sync::FieldSynchronizer,
};
pub use form::{FormValidation, HeadlessForm};
pub use logic::{Operator, Operators};
pub use resolver::SchemaResolver;
pub use serde_json::Value;
pub use validator::{JsonSchemaValidator, SchemaValidator, ValidationError, ValidationKind};
