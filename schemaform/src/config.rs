//! Form options.
//!
//! Options are plain serde structures so they can be embedded in a host
//! application's own configuration file. They are usually written in TOML:
//!
//! ```toml
//! strict_input_type = false
//! missing_property = "no-match"
//!
//! [legacy]
//! treat_null_as_undefined = true
//! allow_forbidden_values = false
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options controlling resolution, field building and validation.
#[derive(Default, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FormOptions {
    /// Fail when the field builder cannot infer an input type instead of
    /// falling back to a plain text input.
    pub strict_input_type: bool,
    /// What to do when a conditional references an undeclared property.
    pub missing_property: MissingPropertyPolicy,
    /// Legacy compatibility toggles forwarded to validation.
    pub legacy: LegacyOptions,
}

/// Policy for conditionals that reference a property missing from the schema.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPropertyPolicy {
    /// The conditional does not match.
    #[default]
    NoMatch,
    /// Resolution fails with [`crate::FormError::MissingProperty`].
    Error,
}

/// Legacy compatibility toggles.
#[derive(Default, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct LegacyOptions {
    /// Drop `null` leaves from submitted values before validating, so an
    /// empty optional field does not trip a type check.
    pub treat_null_as_undefined: bool,
    /// Silently drop values submitted for hidden fields instead of
    /// reporting them as forbidden.
    pub allow_forbidden_values: bool,
}

impl FormOptions {
    /// Parse options from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FormError::Config`] when the text is not valid TOML
    /// or does not match the option layout.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Set strict input type inference.
    pub fn with_strict_input_type(mut self, strict: bool) -> Self {
        self.strict_input_type = strict;
        self
    }

    /// Set the missing property policy.
    pub fn with_missing_property(mut self, policy: MissingPropertyPolicy) -> Self {
        self.missing_property = policy;
        self
    }

    /// Replace the legacy toggles.
    pub fn with_legacy(mut self, legacy: LegacyOptions) -> Self {
        self.legacy = legacy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let opts = FormOptions::from_toml_str(
            r#"
            strict_input_type = true
            missing_property = "error"

            [legacy]
            allow_forbidden_values = true
            "#,
        )
        .unwrap();

        assert!(opts.strict_input_type);
        assert_eq!(opts.missing_property, MissingPropertyPolicy::Error);
        assert!(opts.legacy.allow_forbidden_values);
        assert!(!opts.legacy.treat_null_as_undefined);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let opts = FormOptions::from_toml_str("").unwrap();
        assert_eq!(opts, FormOptions::default());
    }

    #[test]
    fn test_bad_toml() {
        let err = FormOptions::from_toml_str("missing_property = \"sometimes\"").unwrap_err();
        assert!(matches!(err, crate::FormError::Config(_)));
    }
}
