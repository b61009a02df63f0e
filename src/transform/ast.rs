//! Syntax tree for the function script language.
//!
//! A user function is parsed once at save time into a [`FunctionScript`];
//! the interpreter then walks this tree for every invocation.

use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;

/// Runtime value inside a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A numeric value (floating point)
    Number(f64),
    Boolean(bool),
    String(String),
    Null,
    /// A JSON object value, insertion ordered
    Object(Map<String, JsonValue>),
    /// A JSON array value
    Array(Vec<JsonValue>),
}

impl Value {
    /// Name used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Null => "null",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
        }
    }

    /// Truthiness used by `if`, `!`, `&&` and `||`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Boolean(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Null => false,
            Value::Object(_) | Value::Array(_) => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Object(o) => write!(f, "{}", JsonValue::Object(o.clone())),
            Value::Array(a) => write!(f, "{}", JsonValue::Array(a.clone())),
        }
    }
}

/// Renders integral floats without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    JsonValue::Number(Number::from(n as i64))
                } else {
                    Number::from_f64(n)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            }
            Value::Boolean(b) => JsonValue::Bool(b),
            Value::String(s) => JsonValue::String(s),
            Value::Null => JsonValue::Null,
            Value::Object(o) => JsonValue::Object(o),
            Value::Array(a) => JsonValue::Array(a),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Null => Value::Null,
            JsonValue::Object(o) => Value::Object(o),
            JsonValue::Array(a) => Value::Array(a),
        }
    }
}

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Or => "||",
            Operator::And => "&&",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Power => "^",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    /// Negation (-)
    Negate,
    /// Logical NOT (!)
    Not,
}

/// An expression in a function script.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Variable(String),
    /// `object.field`
    FieldAccess {
        object: Box<Expression>,
        field: String,
    },
    /// `object[index]`, index may be a number or a string key
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        operator: Operator,
        right: Box<Expression>,
    },
    UnaryOp {
        operator: UnaryOperator,
        expr: Box<Expression>,
    },
    /// Call to a system function
    FunctionCall { name: String, args: Vec<Expression> },
}

/// A statement in a function script.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let { name: String, value: Expression },
    Return(Expression),
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },
    Expr(Expression),
}

/// A parsed function body with its declared parameter names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionScript {
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}
