//! Save-time compilation of function scripts.
//!
//! A script is accepted only if it stays inside the capability contract:
//! it sees its positional arguments and nothing else, and it may only call
//! system functions.

use super::ast::{Expression, FunctionScript, Statement, Value};
use super::interpreter::{lookup_system_function, ExecutionBudget, Interpreter, ScriptError};
use super::parser::ScriptParser;
use crate::error::{MapError, MapResult};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Implicit binding for the first argument.
pub const INPUT_VARIABLE: &str = "input";
/// Implicit binding for all arguments as an array.
pub const ARGS_VARIABLE: &str = "args";

/// A validated script ready for invocation.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    code: String,
    script: FunctionScript,
}

impl CompiledFunction {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn params(&self) -> &[String] {
        &self.script.params
    }

    /// Runs the function against already-evaluated arguments.
    pub fn invoke(&self, args: &[JsonValue], budget: ExecutionBudget) -> Result<JsonValue, ScriptError> {
        let mut variables = HashMap::new();
        variables.insert(
            INPUT_VARIABLE.to_string(),
            args.first().cloned().map(Value::from).unwrap_or(Value::Null),
        );
        variables.insert(ARGS_VARIABLE.to_string(), Value::Array(args.to_vec()));
        for (i, param) in self.script.params.iter().enumerate() {
            let value = args.get(i).cloned().map(Value::from).unwrap_or(Value::Null);
            variables.insert(param.clone(), value);
        }

        Interpreter::with_variables(variables, budget)
            .run(&self.script)
            .map(JsonValue::from)
    }
}

/// Parses and checks `source` for the function identified by `code`.
pub fn compile(code: &str, source: &str) -> MapResult<CompiledFunction> {
    let script = ScriptParser::new().parse_script(source)?;

    let mut scope: HashSet<String> = [INPUT_VARIABLE, ARGS_VARIABLE]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for param in &script.params {
        if param == INPUT_VARIABLE || param == ARGS_VARIABLE {
            return Err(MapError::Validation(format!(
                "Parameter name '{}' is reserved",
                param
            )));
        }
        if !scope.insert(param.clone()) {
            return Err(MapError::Validation(format!(
                "Duplicate parameter '{}'",
                param
            )));
        }
    }

    check_block(&script.body, &scope)?;

    Ok(CompiledFunction {
        code: code.to_string(),
        script,
    })
}

fn check_block(statements: &[Statement], outer: &HashSet<String>) -> MapResult<()> {
    let mut scope = outer.clone();
    for statement in statements {
        match statement {
            Statement::Let { name, value } => {
                check_expr(value, &scope)?;
                scope.insert(name.clone());
            }
            Statement::Return(expr) | Statement::Expr(expr) => check_expr(expr, &scope)?,
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                check_expr(condition, &scope)?;
                check_block(then_branch, &scope)?;
                if let Some(branch) = else_branch {
                    check_block(branch, &scope)?;
                }
            }
        }
    }
    Ok(())
}

fn check_expr(expr: &Expression, scope: &HashSet<String>) -> MapResult<()> {
    match expr {
        Expression::Literal(_) => Ok(()),
        Expression::Variable(name) => {
            if scope.contains(name) {
                Ok(())
            } else {
                Err(MapError::Validation(format!(
                    "Undeclared variable '{}'",
                    name
                )))
            }
        }
        Expression::FieldAccess { object, .. } => check_expr(object, scope),
        Expression::Index { object, index } => {
            check_expr(object, scope)?;
            check_expr(index, scope)
        }
        Expression::BinaryOp { left, right, .. } => {
            check_expr(left, scope)?;
            check_expr(right, scope)
        }
        Expression::UnaryOp { expr, .. } => check_expr(expr, scope),
        Expression::FunctionCall { name, args } => {
            if lookup_system_function(name).is_none() {
                return Err(MapError::Validation(format!(
                    "Function '{}' is not available to scripts",
                    name
                )));
            }
            args.iter().try_for_each(|arg| check_expr(arg, scope))
        }
    }
}
