//! Error types and result definitions.
//!
//! Only programmer errors surface as [`FormError`]: a malformed rule, an
//! operator registered with a bad name, a schema that cannot be compiled.
//! Failed validation of user values is reported as data through
//! [`crate::validator::ValidationError`] instead.

use thiserror::Error;

/// Errors raised while resolving schemas, evaluating rules or syncing fields.
#[derive(Error, Debug)]
pub enum FormError {
    /// A rule name was referenced that is not declared in `x-jsf-logic`.
    #[error("rule `{name}` is not declared in x-jsf-logic.{table}")]
    UnknownRule {
        /// Rule table searched (`validations` or `computedValues`).
        table: &'static str,
        /// Name that was looked up.
        name: String,
    },

    /// A rule used an operator that is neither built-in nor registered.
    #[error("unknown rule operator `{0}`")]
    UnknownOperator(String),

    /// A custom operator could not be registered.
    #[error("invalid custom operator `{name}`: {reason}")]
    InvalidOperator {
        /// Operator name supplied by the caller.
        name: String,
        /// Why the registration was rejected.
        reason: String,
    },

    /// A rule expression is structurally malformed.
    #[error("invalid rule at `{path}`: {reason}")]
    InvalidRule {
        /// Location of the rule inside the schema.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A custom operator returned an error.
    #[error("operator `{name}` failed: {source}")]
    Operator {
        /// Operator name.
        name: String,
        /// Error returned by the operator.
        #[source]
        source: anyhow::Error,
    },

    /// A value that must be an object is something else.
    #[error("expected an object at `{path}`, found {actual}")]
    NotAnObject {
        /// Dotted path of the offending value.
        path: String,
        /// The value that was found instead.
        actual: String,
    },

    /// A conditional references a property the schema does not declare.
    #[error("conditional references undeclared property `{path}`")]
    MissingProperty {
        /// Dotted path of the referenced property.
        path: String,
    },

    /// A `pattern` could not be compiled.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern text.
        pattern: String,
        /// Regex compilation failure.
        #[source]
        source: regex::Error,
    },

    /// A schema could not be compiled or is not shaped like a schema.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The field builder could not infer an input type in strict mode.
    #[error("cannot infer input type for field `{0}`")]
    UnknownInputType(String),

    /// Options could not be parsed.
    #[error("invalid options: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type alias for schemaform operations.
pub type Result<T> = std::result::Result<T, FormError>;
