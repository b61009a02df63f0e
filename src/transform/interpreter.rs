//! Interpreter for function scripts.
//!
//! Walks a parsed [`FunctionScript`] with the invocation arguments bound as
//! variables. Every expression step is charged against an
//! [`ExecutionBudget`], so a script can never run past its deadline.

pub mod builtins;

use super::ast::{Expression, FunctionScript, Operator, Statement, UnaryOperator, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

pub use builtins::{
    check_text_length, lookup as lookup_system_function, SystemFunction, MAX_TEXT_LENGTH,
    SYSTEM_FUNCTIONS,
};

/// Failure raised while running a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("execution budget exhausted")]
    Timeout,
    #[error("{0}")]
    Failed(String),
}

/// Deadline and step allowance for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionBudget {
    deadline: Option<Instant>,
    steps_remaining: u64,
}

impl ExecutionBudget {
    pub const DEFAULT_MAX_STEPS: u64 = 100_000;

    pub fn new(timeout: Option<Duration>, max_steps: u64) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
            steps_remaining: max_steps,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Some(timeout), Self::DEFAULT_MAX_STEPS)
    }

    pub fn unbounded() -> Self {
        Self::new(None, u64::MAX)
    }

    fn tick(&mut self) -> Result<(), ScriptError> {
        if self.steps_remaining == 0 {
            return Err(ScriptError::Timeout);
        }
        self.steps_remaining -= 1;
        self.check_deadline()
    }

    fn check_deadline(&self) -> Result<(), ScriptError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ScriptError::Timeout),
            _ => Ok(()),
        }
    }
}

enum Flow {
    Continue(Option<Value>),
    Return(Value),
}

fn fail<T>(message: impl Into<String>) -> Result<T, ScriptError> {
    Err(ScriptError::Failed(message.into()))
}

pub struct Interpreter {
    /// Variables visible to the script
    variables: HashMap<String, Value>,
    budget: ExecutionBudget,
}

impl Interpreter {
    pub fn new(budget: ExecutionBudget) -> Self {
        Self {
            variables: HashMap::new(),
            budget,
        }
    }

    pub fn with_variables(variables: HashMap<String, Value>, budget: ExecutionBudget) -> Self {
        Self { variables, budget }
    }

    /// Runs a script. Without an explicit `return`, the last expression
    /// statement's value is the result.
    pub fn run(&mut self, script: &FunctionScript) -> Result<Value, ScriptError> {
        match self.exec_block(&script.body)? {
            Flow::Return(value) => Ok(value),
            Flow::Continue(last) => Ok(last.unwrap_or(Value::Null)),
        }
    }

    fn exec_block(&mut self, statements: &[Statement]) -> Result<Flow, ScriptError> {
        let mut last = None;
        for statement in statements {
            self.budget.tick()?;
            match statement {
                Statement::Let { name, value } => {
                    let value = self.evaluate(value)?;
                    self.variables.insert(name.clone(), value);
                    last = None;
                }
                Statement::Return(expr) => return Ok(Flow::Return(self.evaluate(expr)?)),
                Statement::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let flow = if self.evaluate(condition)?.is_truthy() {
                        self.exec_block(then_branch)?
                    } else if let Some(branch) = else_branch {
                        self.exec_block(branch)?
                    } else {
                        Flow::Continue(None)
                    };
                    match flow {
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Continue(value) => last = value,
                    }
                }
                Statement::Expr(expr) => last = Some(self.evaluate(expr)?),
            }
        }
        Ok(Flow::Continue(last))
    }

    /// Evaluates an expression.
    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value, ScriptError> {
        self.budget.tick()?;
        match expr {
            Expression::Literal(value) => Ok(value.clone()),

            Expression::Variable(name) => match self.variables.get(name) {
                Some(value) => Ok(value.clone()),
                None => fail(format!("Variable not found: {}", name)),
            },

            Expression::FieldAccess { object, field } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Object(map) => Ok(map.get(field).cloned().map(Value::from).unwrap_or(Value::Null)),
                    Value::Null => Ok(Value::Null),
                    other => fail(format!("Cannot access field '{}' on {}", field, other.type_name())),
                }
            }

            Expression::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                index_value(object, index)
            }

            Expression::BinaryOp {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, *operator, right),

            Expression::UnaryOp { operator, expr } => {
                let value = self.evaluate(expr)?;
                match operator {
                    UnaryOperator::Negate => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => fail(format!("Cannot negate {}", other.type_name())),
                    },
                    UnaryOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
                }
            }

            Expression::FunctionCall { name, args } => {
                let function = match lookup_system_function(name) {
                    Some(function) => function,
                    None => return fail(format!("Unknown function: {}", name)),
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                let result = (function.call)(&values).map_err(ScriptError::Failed)?;
                self.budget.check_deadline()?;
                Ok(result)
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expression,
        operator: Operator,
        right: &Expression,
    ) -> Result<Value, ScriptError> {
        // Logical operators short-circuit.
        match operator {
            Operator::And => {
                let left = self.evaluate(left)?;
                if !left.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
                return Ok(Value::Boolean(self.evaluate(right)?.is_truthy()));
            }
            Operator::Or => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
                return Ok(Value::Boolean(self.evaluate(right)?.is_truthy()));
            }
            _ => {}
        }

        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator {
            Operator::Equal => Ok(Value::Boolean(left == right)),
            Operator::NotEqual => Ok(Value::Boolean(left != right)),
            Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual => compare(&left, operator, &right),
            Operator::Add => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => finite(a + b),
                (Value::String(_), _) | (_, Value::String(_)) => {
                    let joined = format!("{}{}", left, right);
                    check_text_length("String concatenation", joined.len())
                        .map_err(ScriptError::Failed)?;
                    Ok(Value::String(joined))
                }
                _ => fail(format!(
                    "Cannot add {} and {}",
                    left.type_name(),
                    right.type_name()
                )),
            },
            _ => {
                let (a, b) = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => (*a, *b),
                    _ => {
                        return fail(format!(
                            "Operator {} requires numbers, got {} and {}",
                            operator,
                            left.type_name(),
                            right.type_name()
                        ))
                    }
                };
                match operator {
                    Operator::Subtract => finite(a - b),
                    Operator::Multiply => finite(a * b),
                    Operator::Divide if b == 0.0 => fail("Division by zero"),
                    Operator::Divide => finite(a / b),
                    Operator::Modulo if b == 0.0 => fail("Division by zero"),
                    Operator::Modulo => finite(a % b),
                    _ => finite(a.powf(b)),
                }
            }
        }
    }
}

fn finite(n: f64) -> Result<Value, ScriptError> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        fail("Arithmetic produced a non-finite number")
    }
}

fn compare(left: &Value, operator: Operator, right: &Value) -> Result<Value, ScriptError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    let ordering = match ordering {
        Some(ordering) => ordering,
        None => {
            return fail(format!(
                "Cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))
        }
    };
    let result = match operator {
        Operator::LessThan => ordering.is_lt(),
        Operator::LessThanOrEqual => ordering.is_le(),
        Operator::GreaterThan => ordering.is_gt(),
        _ => ordering.is_ge(),
    };
    Ok(Value::Boolean(result))
}

fn index_value(object: Value, index: Value) -> Result<Value, ScriptError> {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => {
            if n < 0.0 || n.fract() != 0.0 {
                return fail("Array index must be a non-negative integer");
            }
            Ok(items.get(n as usize).cloned().map(Value::from).unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(&key).cloned().map(Value::from).unwrap_or(Value::Null))
        }
        (Value::String(s), Value::Number(n)) if n >= 0.0 && n.fract() == 0.0 => Ok(s
            .chars()
            .nth(n as usize)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        (Value::Null, _) => Ok(Value::Null),
        (object, index) => fail(format!(
            "Cannot index {} with {}",
            object.type_name(),
            index.type_name()
        )),
    }
}
