//! Built-in operators with eagerly evaluated arguments, plus the value
//! coercions shared by the rest of the crate.

use serde_json::Value;

/// Signature of a built-in operator.
pub type BuiltinFn = fn(&[Value]) -> anyhow::Result<Value>;

/// Eager built-ins, registered in every [`super::Operators`] table.
pub(crate) const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("==", op_loose_eq),
    ("!=", op_loose_ne),
    ("===", op_strict_eq),
    ("!==", op_strict_ne),
    ("!", op_not),
    ("!!", op_truthy),
    (">", op_gt),
    (">=", op_ge),
    ("<", op_lt),
    ("<=", op_le),
    ("+", op_add),
    ("-", op_sub),
    ("*", op_mul),
    ("/", op_div),
    ("%", op_mod),
    ("min", op_min),
    ("max", op_max),
    ("cat", op_cat),
    ("substr", op_substr),
    ("in", op_in),
    ("merge", op_merge),
    ("log", op_log),
];

fn arg(args: &[Value], idx: usize) -> &Value {
    args.get(idx).unwrap_or(&Value::Null)
}

/// JSON-Logic truthiness: `false`, `null`, `0`, `""` and `[]` are falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// Numeric coercion. `None` stands for NaN.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse().ok()
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Build a JSON number, preferring an integer representation.
pub fn number(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Value::from(f as i64);
    }
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn format_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

/// String coercion used for concatenation, templates and loose equality.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_default(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                v => to_text(v),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Loose equality with JavaScript `==` coercions.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::Number(_)) => to_number(a) == to_number(b),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(_), _) => loose_eq(&number(to_number(a).unwrap_or(0.0)), b),
        (_, Value::Bool(_)) => loose_eq(a, &number(to_number(b).unwrap_or(0.0))),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (to_number(a), to_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => a == b,
        (Value::Array(_) | Value::Object(_), _) => loose_eq(&Value::String(to_text(a)), b),
        (_, Value::Array(_) | Value::Object(_)) => loose_eq(a, &Value::String(to_text(b))),
    }
}

/// Strict equality. Numbers compare by value so `1` and `1.0` are equal.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    to_number(a)?.partial_cmp(&to_number(b)?)
}

fn chain(args: &[Value], ok: fn(std::cmp::Ordering) -> bool) -> Value {
    let holds = args.len() >= 2
        && args
            .windows(2)
            .take(2)
            .all(|w| compare(&w[0], &w[1]).is_some_and(ok));
    Value::Bool(holds)
}

fn op_loose_eq(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(loose_eq(arg(args, 0), arg(args, 1))))
}

fn op_loose_ne(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(!loose_eq(arg(args, 0), arg(args, 1))))
}

fn op_strict_eq(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(strict_eq(arg(args, 0), arg(args, 1))))
}

fn op_strict_ne(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(!strict_eq(arg(args, 0), arg(args, 1))))
}

fn op_not(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(!truthy(arg(args, 0))))
}

fn op_truthy(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(truthy(arg(args, 0))))
}

fn op_gt(args: &[Value]) -> anyhow::Result<Value> {
    Ok(chain(&args[..args.len().min(2)], |o| o.is_gt()))
}

fn op_ge(args: &[Value]) -> anyhow::Result<Value> {
    Ok(chain(&args[..args.len().min(2)], |o| o.is_ge()))
}

// `<` and `<=` accept a third argument: `{"<": [1, x, 10]}` is a range check.
fn op_lt(args: &[Value]) -> anyhow::Result<Value> {
    Ok(chain(args, |o| o.is_lt()))
}

fn op_le(args: &[Value]) -> anyhow::Result<Value> {
    Ok(chain(args, |o| o.is_le()))
}

fn numbers(args: &[Value]) -> Option<Vec<f64>> {
    args.iter().map(to_number).collect()
}

fn op_add(args: &[Value]) -> anyhow::Result<Value> {
    Ok(numbers(args)
        .map(|n| number(n.iter().sum()))
        .unwrap_or(Value::Null))
}

fn op_mul(args: &[Value]) -> anyhow::Result<Value> {
    Ok(numbers(args)
        .map(|n| number(n.iter().product()))
        .unwrap_or(Value::Null))
}

fn op_sub(args: &[Value]) -> anyhow::Result<Value> {
    let result = match args {
        [a] => to_number(a).map(|a| -a),
        [a, b, ..] => to_number(a).zip(to_number(b)).map(|(a, b)| a - b),
        [] => None,
    };
    Ok(result.map(number).unwrap_or(Value::Null))
}

fn op_div(args: &[Value]) -> anyhow::Result<Value> {
    let result = to_number(arg(args, 0))
        .zip(to_number(arg(args, 1)))
        .map(|(a, b)| a / b);
    Ok(result.map(number).unwrap_or(Value::Null))
}

fn op_mod(args: &[Value]) -> anyhow::Result<Value> {
    let result = to_number(arg(args, 0))
        .zip(to_number(arg(args, 1)))
        .map(|(a, b)| a % b);
    Ok(result.map(number).unwrap_or(Value::Null))
}

fn op_min(args: &[Value]) -> anyhow::Result<Value> {
    Ok(numbers(args)
        .and_then(|n| n.into_iter().reduce(f64::min))
        .map(number)
        .unwrap_or(Value::Null))
}

fn op_max(args: &[Value]) -> anyhow::Result<Value> {
    Ok(numbers(args)
        .and_then(|n| n.into_iter().reduce(f64::max))
        .map(number)
        .unwrap_or(Value::Null))
}

fn op_cat(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::String(args.iter().map(to_text).collect()))
}

fn op_substr(args: &[Value]) -> anyhow::Result<Value> {
    let chars: Vec<char> = to_text(arg(args, 0)).chars().collect();
    let len = chars.len() as i64;
    let clamp = |i: i64| i.clamp(0, len) as usize;

    let start = to_number(arg(args, 1)).unwrap_or(0.0) as i64;
    let start = if start < 0 { clamp(len + start) } else { clamp(start) };
    let end = match args.get(2) {
        Some(n) => {
            let n = to_number(n).unwrap_or(0.0) as i64;
            if n < 0 {
                clamp(len + n)
            } else {
                clamp(start as i64 + n)
            }
        }
        None => chars.len(),
    };

    let out: String = if end > start {
        chars[start..end].iter().collect()
    } else {
        String::new()
    };
    Ok(Value::String(out))
}

fn op_in(args: &[Value]) -> anyhow::Result<Value> {
    let needle = arg(args, 0);
    let found = match arg(args, 1) {
        Value::String(haystack) => haystack.contains(&to_text(needle)),
        Value::Array(items) => items.iter().any(|item| strict_eq(item, needle)),
        _ => false,
    };
    Ok(Value::Bool(found))
}

fn op_merge(args: &[Value]) -> anyhow::Result<Value> {
    let mut out = Vec::new();
    for value in args {
        match value {
            Value::Array(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::Array(out))
}

fn op_log(args: &[Value]) -> anyhow::Result<Value> {
    let value = arg(args, 0).clone();
    debug!("rule log: {value}");
    Ok(value)
}
