//! Side rule language.
//!
//! Rules are JSON-Logic expressions: an object with a single key names the
//! operator, its value holds the arguments. Everything else is a literal.
//!
//! ## Operator table
//!
//! There is no process-wide registry. Each evaluation receives an
//! [`Operators`] table holding the built-ins plus any operators the caller
//! registered, so two forms with different custom operators can be
//! validated side by side (or one inside the other) without interfering.
//!
//! ## Modules
//!
//! - [`ops`] - built-in operators and value coercions
//! - [`rules`] - named validations and computed values from `x-jsf-logic`

use std::{collections::HashMap, fmt, rc::Rc};

use serde_json::{Map, Value};

use crate::error::{FormError, Result};

pub mod ops;
pub mod rules;

pub use rules::{Rule, RuleEngine, RuleTable, total_values};

/// A rule operator. Receives its arguments already evaluated.
pub type Operator = Rc<dyn Fn(&[Value]) -> anyhow::Result<Value>>;

/// Operators that control evaluation of their own arguments.
const SPECIAL_FORMS: &[&str] = &[
    "var",
    "missing",
    "missing_some",
    "if",
    "?:",
    "and",
    "or",
    "map",
    "filter",
    "reduce",
    "all",
    "some",
    "none",
];

/// Operator table used to evaluate rules.
#[derive(Clone)]
pub struct Operators {
    table: HashMap<String, Operator>,
    custom: Vec<String>,
}

impl Default for Operators {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Operators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operators")
            .field("builtins", &self.table.len())
            .field("custom", &self.custom)
            .finish()
    }
}

impl Operators {
    /// Table with only the built-in operators.
    pub fn new() -> Self {
        let table = ops::BUILTINS
            .iter()
            .map(|(name, f)| (name.to_string(), Rc::new(*f) as Operator))
            .collect();
        Self {
            table,
            custom: Vec::new(),
        }
    }

    /// Register a custom operator.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidOperator`] if the name is empty or
    /// shadows a built-in operator. Re-registering a custom operator
    /// replaces it.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        op: impl Fn(&[Value]) -> anyhow::Result<Value> + 'static,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FormError::InvalidOperator {
                name,
                reason: "name must not be empty".into(),
            });
        }
        let builtin = SPECIAL_FORMS.contains(&name.as_str())
            || (self.table.contains_key(&name) && !self.custom.contains(&name));
        if builtin {
            return Err(FormError::InvalidOperator {
                name,
                reason: "shadows a built-in operator".into(),
            });
        }
        if !self.custom.contains(&name) {
            self.custom.push(name.clone());
        }
        self.table.insert(name, Rc::new(op));
        Ok(())
    }

    /// Copy of this table extended with another table's custom operators.
    ///
    /// # Errors
    ///
    /// Same as [`Operators::register`].
    pub fn extended(&self, other: &Operators) -> Result<Operators> {
        let mut merged = self.clone();
        for name in &other.custom {
            if let Some(op) = other.table.get(name) {
                let op = op.clone();
                merged.register(name.clone(), move |args: &[Value]| op(args))?;
            }
        }
        Ok(merged)
    }

    /// Look up an eagerly evaluated operator.
    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.table.get(name)
    }

    /// Names of the registered custom operators, in registration order.
    pub fn custom_names(&self) -> &[String] {
        &self.custom
    }
}

/// Evaluate a rule against `data`.
///
/// # Errors
///
/// Unknown operators, malformed special forms and failing custom operators
/// are errors. Type mismatches inside built-ins are not: they evaluate to
/// `null` the way JSON-Logic does.
pub fn evaluate(rule: &Value, data: &Value, operators: &Operators) -> Result<Value> {
    match rule {
        Value::Object(map) if map.len() == 1 => {
            let Some((op, args)) = map.iter().next() else {
                return Ok(Value::Null);
            };
            apply(op, args, data, operators)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| evaluate(item, data, operators))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn arg_list(args: &Value) -> Vec<&Value> {
    match args {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    }
}

fn apply(op: &str, raw: &Value, data: &Value, operators: &Operators) -> Result<Value> {
    let args = arg_list(raw);
    let eval = |v: &Value| evaluate(v, data, operators);

    match op {
        "var" => {
            let path = match args.first().copied() {
                Some(p) => eval(p)?,
                None => Value::Null,
            };
            let default = match args.get(1).copied() {
                Some(d) => Some(eval(d)?),
                None => None,
            };
            Ok(lookup(data, &path).cloned().or(default).unwrap_or(Value::Null))
        }
        "missing" => {
            let mut names = Vec::new();
            for a in args.iter().copied() {
                match eval(a)? {
                    Value::Array(items) => names.extend(items),
                    other => names.push(other),
                }
            }
            Ok(Value::Array(missing(data, &names)))
        }
        "missing_some" => {
            let need = match args.first().copied() {
                Some(n) => ops::to_number(&eval(n)?).unwrap_or(0.0),
                None => 0.0,
            };
            let names = match args.get(1).copied() {
                Some(n) => match eval(n)? {
                    Value::Array(items) => items,
                    other => vec![other],
                },
                None => Vec::new(),
            };
            let absent = missing(data, &names);
            let present = names.len() - absent.len();
            if present as f64 >= need {
                Ok(Value::Array(Vec::new()))
            } else {
                Ok(Value::Array(absent))
            }
        }
        "if" | "?:" => {
            let mut i = 0;
            while i + 1 < args.len() {
                if ops::truthy(&eval(args[i])?) {
                    return eval(args[i + 1]);
                }
                i += 2;
            }
            match args.get(i).copied() {
                Some(otherwise) => eval(otherwise),
                None => Ok(Value::Null),
            }
        }
        "and" => {
            let mut last = Value::Bool(true);
            for a in args.iter().copied() {
                last = eval(a)?;
                if !ops::truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        "or" => {
            let mut last = Value::Bool(false);
            for a in args.iter().copied() {
                last = eval(a)?;
                if ops::truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        "map" | "filter" | "all" | "some" | "none" => {
            let items = match args.first().copied() {
                Some(a) => match eval(a)? {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                },
                None => Vec::new(),
            };
            let body = args.get(1).copied().unwrap_or(&Value::Null);
            iterate(op, items, body, operators)
        }
        "reduce" => {
            let items = match args.first().copied() {
                Some(a) => match eval(a)? {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                },
                None => Vec::new(),
            };
            let body = args.get(1).copied().unwrap_or(&Value::Null);
            let mut acc = match args.get(2).copied() {
                Some(init) => eval(init)?,
                None => Value::Null,
            };
            for current in items {
                let mut scope = Map::new();
                scope.insert("current".into(), current);
                scope.insert("accumulator".into(), acc);
                acc = evaluate(body, &Value::Object(scope), operators)?;
            }
            Ok(acc)
        }
        _ => {
            let Some(f) = operators.get(op) else {
                return Err(FormError::UnknownOperator(op.to_string()));
            };
            let values = args
                .iter()
                .copied()
                .map(eval)
                .collect::<Result<Vec<_>>>()?;
            f(&values).map_err(|source| FormError::Operator {
                name: op.to_string(),
                source,
            })
        }
    }
}

fn iterate(op: &str, items: Vec<Value>, body: &Value, operators: &Operators) -> Result<Value> {
    match op {
        "map" => items
            .iter()
            .map(|item| evaluate(body, item, operators))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        "filter" => {
            let mut kept = Vec::new();
            for item in items {
                if ops::truthy(&evaluate(body, &item, operators)?) {
                    kept.push(item);
                }
            }
            Ok(Value::Array(kept))
        }
        "all" => {
            if items.is_empty() {
                return Ok(Value::Bool(false));
            }
            for item in &items {
                if !ops::truthy(&evaluate(body, item, operators)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        _ => {
            let mut any = false;
            for item in &items {
                if ops::truthy(&evaluate(body, item, operators)?) {
                    any = true;
                    break;
                }
            }
            Ok(Value::Bool(if op == "none" { !any } else { any }))
        }
    }
}

/// Resolve a `var` path (dotted string or array index) inside `data`.
///
/// An empty path or `null` returns `data` itself.
pub fn lookup<'a>(data: &'a Value, path: &Value) -> Option<&'a Value> {
    let path = match path {
        Value::Null => return Some(data),
        Value::String(s) if s.is_empty() => return Some(data),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn missing(data: &Value, names: &[Value]) -> Vec<Value> {
    names
        .iter()
        .filter(|name| match lookup(data, name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
        .cloned()
        .collect()
}
