//! Function script language.
//!
//! User-authored functions are parsed with PEST, checked against the
//! capability contract at save time and run by a budgeted interpreter.

pub mod ast;
pub mod compiler;
pub mod interpreter;
pub mod parser;

pub use ast::{Expression, FunctionScript, Statement, Value};
pub use compiler::{compile, CompiledFunction};
pub use interpreter::{ExecutionBudget, Interpreter, ScriptError, SystemFunction, SYSTEM_FUNCTIONS};
pub use parser::ScriptParser;
