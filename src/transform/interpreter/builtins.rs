use super::super::ast::{format_number, Value};

/// Signature shared by every system function.
pub type TransformFunction = fn(&[Value]) -> Result<Value, String>;

/// A function available to scripts and to mapping `FunctionCall` nodes
/// without being registered by a user.
#[derive(Debug, Clone, Copy)]
pub struct SystemFunction {
    pub code: &'static str,
    pub description: &'static str,
    pub call: TransformFunction,
}

/// Upper bound for `padLeft` widths.
const MAX_PAD_WIDTH: usize = 4096;

/// Upper bound, in bytes, for any text a script builds.
pub const MAX_TEXT_LENGTH: usize = 1 << 20;

/// Fails when a result of `len` bytes would exceed [`MAX_TEXT_LENGTH`].
pub fn check_text_length(name: &str, len: usize) -> Result<(), String> {
    if len > MAX_TEXT_LENGTH {
        return Err(format!(
            "{} would produce {} bytes of text, the limit is {}",
            name, len, MAX_TEXT_LENGTH
        ));
    }
    Ok(())
}

pub static SYSTEM_FUNCTIONS: &[SystemFunction] = &[
    SystemFunction { code: "min", description: "Smallest of two or more numbers", call: min },
    SystemFunction { code: "max", description: "Largest of two or more numbers", call: max },
    SystemFunction { code: "clamp", description: "clamp(value, low, high)", call: clamp },
    SystemFunction { code: "round", description: "round(value, digits = 0), half away from zero", call: round },
    SystemFunction { code: "abs", description: "Absolute value", call: abs },
    SystemFunction { code: "concat", description: "Concatenates all arguments as text", call: concat },
    SystemFunction { code: "upperCase", description: "Converts text to upper case", call: upper_case },
    SystemFunction { code: "lowerCase", description: "Converts text to lower case", call: lower_case },
    SystemFunction { code: "trim", description: "Strips leading and trailing whitespace", call: trim },
    SystemFunction { code: "length", description: "Length of a string, array or object", call: length },
    SystemFunction { code: "substring", description: "substring(text, start, end?) by character index", call: substring },
    SystemFunction { code: "replace", description: "replace(text, from, to) for every occurrence", call: replace },
    SystemFunction { code: "padLeft", description: "padLeft(text, width, pad = \" \")", call: pad_left },
    SystemFunction { code: "toInt", description: "Converts to an integer, truncating", call: to_int },
    SystemFunction { code: "toDouble", description: "Converts to a floating point number", call: to_double },
    SystemFunction { code: "toString", description: "Converts any value to text", call: to_string },
    SystemFunction { code: "toBoolean", description: "Converts any value to a boolean", call: to_boolean },
    SystemFunction { code: "coalesce", description: "First argument that is not null", call: coalesce },
    SystemFunction { code: "lookup", description: "lookup(table, key, default = null) in an object of text values", call: table_lookup },
];

/// Finds a system function by its code.
pub fn lookup(code: &str) -> Option<&'static SystemFunction> {
    SYSTEM_FUNCTIONS.iter().find(|f| f.code == code)
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), String> {
    if args.len() < min || args.len() > max {
        return Err(if min == max {
            format!("{}() requires exactly {} argument(s)", name, min)
        } else if max == usize::MAX {
            format!("{}() requires at least {} argument(s)", name, min)
        } else {
            format!("{}() requires {} to {} arguments", name, min, max)
        });
    }
    Ok(())
}

fn number(name: &str, value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(format!("{}() requires numeric arguments, got {}", name, other.type_name())),
    }
}

fn text(value: &Value) -> String {
    value.to_string()
}

fn min(args: &[Value]) -> Result<Value, String> {
    arity("min", args, 2, usize::MAX)?;
    let mut result = f64::INFINITY;
    for arg in args {
        result = result.min(number("min", arg)?);
    }
    Ok(Value::Number(result))
}

fn max(args: &[Value]) -> Result<Value, String> {
    arity("max", args, 2, usize::MAX)?;
    let mut result = f64::NEG_INFINITY;
    for arg in args {
        result = result.max(number("max", arg)?);
    }
    Ok(Value::Number(result))
}

fn clamp(args: &[Value]) -> Result<Value, String> {
    arity("clamp", args, 3, 3)?;
    let value = number("clamp", &args[0])?;
    let low = number("clamp", &args[1])?;
    let high = number("clamp", &args[2])?;
    if low > high {
        return Err("clamp() requires low <= high".to_string());
    }
    Ok(Value::Number(value.max(low).min(high)))
}

fn round(args: &[Value]) -> Result<Value, String> {
    arity("round", args, 1, 2)?;
    let value = number("round", &args[0])?;
    let digits = match args.get(1) {
        Some(d) => number("round", d)?,
        None => 0.0,
    };
    if digits.fract() != 0.0 || !(0.0..=15.0).contains(&digits) {
        return Err("round() digits must be an integer between 0 and 15".to_string());
    }
    let factor = 10f64.powi(digits as i32);
    Ok(Value::Number((value * factor).round() / factor))
}

fn abs(args: &[Value]) -> Result<Value, String> {
    arity("abs", args, 1, 1)?;
    Ok(Value::Number(number("abs", &args[0])?.abs()))
}

fn concat(args: &[Value]) -> Result<Value, String> {
    let mut result = String::new();
    for arg in args {
        if !matches!(arg, Value::Null) {
            let part = text(arg);
            check_text_length("concat()", result.len() + part.len())?;
            result.push_str(&part);
        }
    }
    Ok(Value::String(result))
}

fn map_text(name: &str, args: &[Value], f: fn(&str) -> String) -> Result<Value, String> {
    arity(name, args, 1, 1)?;
    Ok(match &args[0] {
        Value::Null => Value::Null,
        other => Value::String(f(&text(other))),
    })
}

fn upper_case(args: &[Value]) -> Result<Value, String> {
    map_text("upperCase", args, str::to_uppercase)
}

fn lower_case(args: &[Value]) -> Result<Value, String> {
    map_text("lowerCase", args, str::to_lowercase)
}

fn trim(args: &[Value]) -> Result<Value, String> {
    map_text("trim", args, |s| s.trim().to_string())
}

fn length(args: &[Value]) -> Result<Value, String> {
    arity("length", args, 1, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(o) => o.len(),
        Value::Null => 0,
        other => text(other).chars().count(),
    };
    Ok(Value::Number(len as f64))
}

fn index_arg(name: &str, value: &Value) -> Result<usize, String> {
    let n = number(name, value)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(format!("{}() indexes must be non-negative integers", name));
    }
    Ok(n as usize)
}

fn substring(args: &[Value]) -> Result<Value, String> {
    arity("substring", args, 2, 3)?;
    if matches!(args[0], Value::Null) {
        return Ok(Value::Null);
    }
    let chars: Vec<char> = text(&args[0]).chars().collect();
    let start = index_arg("substring", &args[1])?.min(chars.len());
    let end = match args.get(2) {
        Some(e) => index_arg("substring", e)?.min(chars.len()),
        None => chars.len(),
    };
    if start > end {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn replace(args: &[Value]) -> Result<Value, String> {
    arity("replace", args, 3, 3)?;
    if matches!(args[0], Value::Null) {
        return Ok(Value::Null);
    }
    let from = text(&args[1]);
    if from.is_empty() {
        return Err("replace() pattern must not be empty".to_string());
    }
    let source = text(&args[0]);
    let to = text(&args[2]);
    if to.len() > from.len() {
        let grown = source.matches(from.as_str()).count() * (to.len() - from.len());
        check_text_length("replace()", source.len() + grown)?;
    }
    Ok(Value::String(source.replace(&from, &to)))
}

fn pad_left(args: &[Value]) -> Result<Value, String> {
    arity("padLeft", args, 2, 3)?;
    let source = match &args[0] {
        Value::Null => String::new(),
        other => text(other),
    };
    let width = index_arg("padLeft", &args[1])?;
    if width > MAX_PAD_WIDTH {
        return Err(format!("padLeft() width may not exceed {}", MAX_PAD_WIDTH));
    }
    let pad = match args.get(2) {
        Some(p) => text(p).chars().next().unwrap_or(' '),
        None => ' ',
    };
    let len = source.chars().count();
    if len >= width {
        return Ok(Value::String(source));
    }
    let mut result: String = std::iter::repeat(pad).take(width - len).collect();
    result.push_str(&source);
    Ok(Value::String(result))
}

fn parse_number(name: &str, value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Number(n) => Ok(Some(*n)),
        Value::Boolean(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("{}() cannot convert '{}' to a number", name, s)),
        Value::Null => Ok(None),
        other => Err(format!("{}() cannot convert {}", name, other.type_name())),
    }
}

fn to_int(args: &[Value]) -> Result<Value, String> {
    arity("toInt", args, 1, 1)?;
    Ok(parse_number("toInt", &args[0])?
        .map(|n| Value::Number(n.trunc()))
        .unwrap_or(Value::Null))
}

fn to_double(args: &[Value]) -> Result<Value, String> {
    arity("toDouble", args, 1, 1)?;
    Ok(parse_number("toDouble", &args[0])?
        .map(Value::Number)
        .unwrap_or(Value::Null))
}

fn to_string(args: &[Value]) -> Result<Value, String> {
    arity("toString", args, 1, 1)?;
    Ok(Value::String(match &args[0] {
        Value::Number(n) => format_number(*n),
        other => text(other),
    }))
}

fn to_boolean(args: &[Value]) -> Result<Value, String> {
    arity("toBoolean", args, 1, 1)?;
    Ok(Value::Boolean(match &args[0] {
        Value::String(s) if s.eq_ignore_ascii_case("false") => false,
        Value::String(s) if s.eq_ignore_ascii_case("true") => true,
        other => other.is_truthy(),
    }))
}

fn coalesce(args: &[Value]) -> Result<Value, String> {
    Ok(args
        .iter()
        .find(|v| !matches!(v, Value::Null))
        .cloned()
        .unwrap_or(Value::Null))
}

/// Key text used by `lookup`; numbers print without a trailing `.0`.
fn table_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(n) => Some(format_number(*n)),
        other => Some(text(other)),
    }
}

fn table_lookup(args: &[Value]) -> Result<Value, String> {
    arity("lookup", args, 2, 3)?;
    let table = match &args[0] {
        Value::Object(table) => table,
        other => return Err(format!("lookup() requires an object table, got {}", other.type_name())),
    };
    let fallback = args.get(2).cloned().unwrap_or(Value::Null);
    Ok(table_key(&args[1])
        .and_then(|key| table.get(&key).cloned())
        .map(Value::from)
        .unwrap_or(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(code: &str, args: Vec<Value>) -> Result<Value, String> {
        (lookup(code).unwrap().call)(&args)
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(
            call("round", vec![Value::Number(12.345), Value::Number(2.0)]),
            Ok(Value::Number(12.35))
        );
        assert_eq!(call("round", vec![Value::Number(2.5)]), Ok(Value::Number(3.0)));
        assert!(call("round", vec![Value::Number(1.0), Value::Number(1.5)]).is_err());
    }

    #[test]
    fn min_max_require_numbers() {
        assert_eq!(
            call("min", vec![Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)]),
            Ok(Value::Number(1.0))
        );
        assert!(call("max", vec![s("a"), Value::Number(1.0)]).is_err());
        assert!(call("max", vec![Value::Number(1.0)]).is_err());
    }

    #[test]
    fn text_helpers_pass_null_through() {
        assert_eq!(call("upperCase", vec![s("abc")]), Ok(s("ABC")));
        assert_eq!(call("trim", vec![Value::Null]), Ok(Value::Null));
        assert_eq!(call("concat", vec![s("a"), Value::Number(1.0), Value::Null]), Ok(s("a1")));
    }

    #[test]
    fn substring_and_pad() {
        assert_eq!(
            call("substring", vec![s("héllo"), Value::Number(1.0), Value::Number(3.0)]),
            Ok(s("él"))
        );
        assert_eq!(
            call("padLeft", vec![s("42"), Value::Number(5.0), s("0")]),
            Ok(s("00042"))
        );
        assert!(call("padLeft", vec![s("x"), Value::Number(100000.0)]).is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call("toInt", vec![s(" 12.9 ")]), Ok(Value::Number(12.0)));
        assert!(call("toDouble", vec![s("abc")]).is_err());
        assert_eq!(call("toString", vec![Value::Number(5.0)]), Ok(s("5")));
        assert_eq!(call("toBoolean", vec![s("FALSE")]), Ok(Value::Boolean(false)));
        assert_eq!(call("coalesce", vec![Value::Null, s("x")]), Ok(s("x")));
    }

    #[test]
    fn growing_text_is_capped() {
        let source = s(&"a".repeat(8000));
        let err = call("replace", vec![source.clone(), s("a"), source.clone()]).unwrap_err();
        assert!(err.contains("limit"));
        assert_eq!(
            call("replace", vec![s("abc"), s("b"), s("xyz")]),
            Ok(s("axyzc"))
        );

        let half = s(&"b".repeat(MAX_TEXT_LENGTH / 2 + 1));
        assert!(call("concat", vec![half.clone(), half]).is_err());
    }

    #[test]
    fn lookup_reads_object_tables() {
        let table = Value::from(serde_json::json!({"01": "OK", "1": "ONE"}));
        assert_eq!(call("lookup", vec![table.clone(), s("01")]), Ok(s("OK")));
        assert_eq!(call("lookup", vec![table.clone(), Value::Number(1.0)]), Ok(s("ONE")));
        assert_eq!(call("lookup", vec![table.clone(), s("99")]), Ok(Value::Null));
        assert_eq!(call("lookup", vec![table, s("99"), s("99")]), Ok(s("99")));
        assert!(call("lookup", vec![s("x"), s("y")]).is_err());
    }
}
