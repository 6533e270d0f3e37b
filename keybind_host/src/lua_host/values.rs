use mlua::{Function, Value, Variadic};

/// Drop the receiver of a `kb:bind(...)` style call so `kb.bind(...)` and
/// the method form see the same arguments.
pub(crate) fn strip_self(args: Variadic<Value>, expected: usize) -> Vec<Value> {
    let mut values: Vec<Value> = args.into_iter().collect();
    if values.len() > expected && matches!(values.first(), Some(Value::Table(_))) {
        values.remove(0);
    }
    values
}

/// Reads a descriptor flag such as `is_repeatable`. Follows Lua truthiness,
/// except that `0` and the strings `"0"`, `"false"`, `"no"` and `"off"` clear
/// the flag too, as key configs tend to write them.
pub(crate) fn descriptor_flag(value: &Value) -> bool {
    match value {
        Value::Nil | Value::Boolean(false) | Value::Integer(0) => false,
        Value::Number(n) => *n != 0.0,
        Value::String(text) => !matches!(
            text.to_str().map(|t| t.trim().to_ascii_lowercase()).as_deref(),
            Ok("" | "0" | "false" | "no" | "off")
        ),
        _ => true,
    }
}

/// Text of a key, action or owner name passed as a string or number.
/// Integral floats lose their fraction so `1.0` names the same key as `1`.
pub(crate) fn name_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => text.to_str().ok().map(str::to_owned),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(format!("{n:.0}")),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(flag) => flag.to_string(),
        Value::Function(func) => describe_function(func),
        Value::Table(_) => "<table>".to_string(),
        other => name_text(other).unwrap_or_else(|| format!("<{}>", other.type_name())),
    }
}

fn describe_function(func: &Function) -> String {
    let info = func.info();
    if let Some(name) = info.name.filter(|name| !name.is_empty()) {
        return name;
    }
    match (info.short_src, info.line_defined) {
        (Some(short), Some(line)) if line > 0 => format!("{short}:{line}"),
        _ => "<function>".to_string(),
    }
}
