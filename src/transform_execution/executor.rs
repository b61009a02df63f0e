//! Tree-walking evaluator for mapping trees.
//!
//! Evaluation is a pure function of the tree, the source document and the
//! snapshots it is handed. Nothing here touches storage.

use super::config::{EvaluationOptions, FailurePolicy, MissingFieldPolicy};
use super::error::{TransformError, TransformErrorKind, TransformResult};
use super::snapshot::{DictionarySnapshot, FunctionSnapshot, ResolvedFunction};
use crate::mapping::{MappingNode, SourcePath};
use crate::transform::ast::format_number;
use crate::transform::{ScriptError, Value};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt::Write;

/// Output of one evaluation plus the errors that lenient mode localized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub output: JsonValue,
    pub errors: Vec<TransformError>,
}

/// Evaluates `root` against `source`.
///
/// Under [`FailurePolicy::Strict`] the first failure is returned as `Err`.
/// Under [`FailurePolicy::Lenient`] failures inside object fields, array
/// items and iteration items become `null` and are listed in
/// [`Evaluation::errors`]. Cancellation always aborts.
pub fn evaluate(
    root: &MappingNode,
    source: &JsonValue,
    functions: &FunctionSnapshot,
    dictionaries: &DictionarySnapshot,
    options: &EvaluationOptions,
) -> TransformResult<Evaluation> {
    let mut evaluator = Evaluator {
        source,
        item: None,
        functions,
        dictionaries,
        options,
        path: String::from("$"),
        errors: Vec::new(),
    };

    let result = evaluator.eval(root);
    let output = evaluator.contain(result)?.unwrap_or(JsonValue::Null);
    if !evaluator.errors.is_empty() {
        debug!("Evaluation finished with {} localized errors", evaluator.errors.len());
    }
    Ok(Evaluation {
        output,
        errors: evaluator.errors,
    })
}

struct Evaluator<'a> {
    source: &'a JsonValue,
    /// Innermost `forEach` element, bound to `@` paths
    item: Option<&'a JsonValue>,
    functions: &'a FunctionSnapshot,
    dictionaries: &'a DictionarySnapshot,
    options: &'a EvaluationOptions,
    /// AST path of the node being evaluated
    path: String,
    errors: Vec<TransformError>,
}

impl<'a> Evaluator<'a> {
    /// `Ok(None)` means the node produced no value and should be omitted.
    fn eval(&mut self, node: &MappingNode) -> TransformResult<Option<JsonValue>> {
        if self.options.is_cancelled() {
            return Err(TransformError::cancelled(self.path.clone()));
        }

        match node {
            MappingNode::Literal { value } => Ok(Some(value.clone())),
            MappingNode::SourceRef { path } => self.source_ref(path),
            MappingNode::FunctionCall { code, args } => self.function_call(code, args),
            MappingNode::DictionaryLookup {
                code,
                key,
                default,
                reverse,
            } => self.dictionary_lookup(code, key, default.as_ref(), *reverse),
            MappingNode::Object { fields } => {
                let mut object = Map::new();
                for (key, child) in fields {
                    let mark = self.push_field(key);
                    let result = self.eval(child);
                    let result = self.contain(result);
                    self.path.truncate(mark);
                    if let Some(value) = result? {
                        object.insert(key.clone(), value);
                    }
                }
                Ok(Some(JsonValue::Object(object)))
            }
            MappingNode::Array { items } => {
                let mut values = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    let mark = self.push_index(i);
                    let result = self.eval(child);
                    let result = self.contain(result);
                    self.path.truncate(mark);
                    values.push(result?.unwrap_or(JsonValue::Null));
                }
                Ok(Some(JsonValue::Array(values)))
            }
            MappingNode::ForEach { source, template } => self.for_each(source, template),
        }
    }

    /// Localizes a failure under the lenient policy.
    fn contain(
        &mut self,
        result: TransformResult<Option<JsonValue>>,
    ) -> TransformResult<Option<JsonValue>> {
        match result {
            Err(error)
                if self.options.policy == FailurePolicy::Lenient
                    && error.kind != TransformErrorKind::Cancelled =>
            {
                self.errors.push(error);
                Ok(Some(JsonValue::Null))
            }
            other => other,
        }
    }

    fn source_ref(&self, path: &SourcePath) -> TransformResult<Option<JsonValue>> {
        match path.resolve(self.source, self.item) {
            Some(value) => Ok(Some(value.clone())),
            None => match self.options.missing_field {
                MissingFieldPolicy::Null => Ok(Some(JsonValue::Null)),
                MissingFieldPolicy::Absent => Ok(None),
                MissingFieldPolicy::Error => {
                    Err(TransformError::missing_field(self.path.clone(), path.as_str()))
                }
            },
        }
    }

    fn function_call(&mut self, code: &str, args: &[MappingNode]) -> TransformResult<Option<JsonValue>> {
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let mark = self.path.len();
            let _ = write!(self.path, ".args[{}]", i);
            let result = self.eval(arg);
            self.path.truncate(mark);
            values.push(result?.unwrap_or(JsonValue::Null));
        }

        match self.functions.resolve(code) {
            None => Err(TransformError::unknown_function(self.path.clone(), code)),
            Some(ResolvedFunction::Custom(function)) => {
                match function.invoke(&values, self.functions.budget()) {
                    Ok(value) => Ok(Some(value)),
                    Err(ScriptError::Timeout) => {
                        Err(TransformError::function_timeout(self.path.clone(), code))
                    }
                    Err(ScriptError::Failed(cause)) => {
                        Err(TransformError::function_failed(self.path.clone(), code, &cause))
                    }
                }
            }
            Some(ResolvedFunction::System(function)) => {
                let args: Vec<Value> = values.into_iter().map(Value::from).collect();
                (function.call)(&args)
                    .map(|value| Some(JsonValue::from(value)))
                    .map_err(|cause| TransformError::function_failed(self.path.clone(), code, &cause))
            }
        }
    }

    fn dictionary_lookup(
        &mut self,
        code: &str,
        key: &MappingNode,
        default: Option<&JsonValue>,
        reverse: bool,
    ) -> TransformResult<Option<JsonValue>> {
        let mark = self.path.len();
        self.path.push_str(".key");
        let result = self.eval(key);
        self.path.truncate(mark);

        let key_text = result?.and_then(|value| key_string(&value));
        let resolved = key_text
            .as_deref()
            .and_then(|k| self.dictionaries.resolve(code, k, reverse));

        match (resolved, default) {
            (Some(value), _) => Ok(Some(JsonValue::String(value.to_string()))),
            (None, Some(default)) => Ok(Some(default.clone())),
            (None, None) => Err(TransformError::unresolved_key(
                self.path.clone(),
                code,
                key_text.as_deref().unwrap_or("null"),
            )),
        }
    }

    fn for_each(&mut self, source: &SourcePath, template: &MappingNode) -> TransformResult<Option<JsonValue>> {
        let elements = match source.resolve(self.source, self.item) {
            Some(JsonValue::Array(elements)) => elements,
            None | Some(JsonValue::Null) => {
                if self.options.missing_field == MissingFieldPolicy::Error {
                    return Err(TransformError::missing_field(self.path.clone(), source.as_str()));
                }
                return Ok(Some(JsonValue::Array(Vec::new())));
            }
            Some(other) => {
                return Err(TransformError::type_mismatch(
                    self.path.clone(),
                    format!(
                        "forEach source '{}' is {}, expected an array",
                        source,
                        json_type_name(other)
                    ),
                ))
            }
        };

        let outer = self.item;
        let mut outputs = Vec::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            let mark = self.push_index(i);
            self.item = Some(element);
            let result = self.eval(template);
            let result = self.contain(result);
            self.path.truncate(mark);
            match result {
                Ok(value) => outputs.push(value.unwrap_or(JsonValue::Null)),
                Err(error) => {
                    self.item = outer;
                    return Err(error);
                }
            }
        }
        self.item = outer;
        Ok(Some(JsonValue::Array(outputs)))
    }

    fn push_field(&mut self, key: &str) -> usize {
        let mark = self.path.len();
        if is_plain_key(key) {
            let _ = write!(self.path, ".{}", key);
        } else {
            let _ = write!(self.path, "['{}']", key.replace('\'', "\\'"));
        }
        mark
    }

    fn push_index(&mut self, index: usize) -> usize {
        let mark = self.path.len();
        let _ = write!(self.path, "[{}]", index);
        mark
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Dictionary keys are strings; `null` never matches.
fn key_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) if n.is_f64() => n.as_f64().map(format_number),
        other => Some(other.to_string()),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
