//! Structured failures produced while evaluating a mapping tree.
//!
//! Every error carries the AST path of the node that produced it so callers
//! can render field-level diagnostics instead of an opaque message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for evaluation.
pub type TransformResult<T> = Result<T, TransformError>;

/// Category of an evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformErrorKind {
    MissingField,
    UnknownFunction,
    FunctionFailed,
    FunctionTimeout,
    UnresolvedKey,
    TypeMismatch,
    Cancelled,
}

impl fmt::Display for TransformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingField => "MissingField",
            Self::UnknownFunction => "UnknownFunction",
            Self::FunctionFailed => "FunctionFailed",
            Self::FunctionTimeout => "FunctionTimeout",
            Self::UnresolvedKey => "UnresolvedKey",
            Self::TypeMismatch => "TypeMismatch",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// A failure at one node of the mapping tree.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind} at {path}: {message}")]
pub struct TransformError {
    pub kind: TransformErrorKind,
    /// AST path of the failing node, e.g. `$.items[2].name`
    pub path: String,
    /// Function or dictionary code involved, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Dictionary key that failed to resolve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub message: String,
}

impl TransformError {
    fn new(kind: TransformErrorKind, path: impl Into<String>, message: String) -> Self {
        Self {
            kind,
            path: path.into(),
            code: None,
            key: None,
            message,
        }
    }

    fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn missing_field(path: impl Into<String>, source_path: &str) -> Self {
        Self::new(
            TransformErrorKind::MissingField,
            path,
            format!("source path '{}' did not resolve", source_path),
        )
    }

    pub fn unknown_function(path: impl Into<String>, code: &str) -> Self {
        Self::new(
            TransformErrorKind::UnknownFunction,
            path,
            format!("function '{}' is unknown or disabled", code),
        )
        .with_code(code)
    }

    pub fn function_failed(path: impl Into<String>, code: &str, cause: &str) -> Self {
        Self::new(
            TransformErrorKind::FunctionFailed,
            path,
            format!("function '{}' failed: {}", code, cause),
        )
        .with_code(code)
    }

    pub fn function_timeout(path: impl Into<String>, code: &str) -> Self {
        Self::new(
            TransformErrorKind::FunctionTimeout,
            path,
            format!("function '{}' exceeded its execution budget", code),
        )
        .with_code(code)
    }

    pub fn unresolved_key(path: impl Into<String>, code: &str, key: &str) -> Self {
        let mut error = Self::new(
            TransformErrorKind::UnresolvedKey,
            path,
            format!("dictionary '{}' has no entry for '{}'", code, key),
        )
        .with_code(code);
        error.key = Some(key.to_string());
        error
    }

    pub fn type_mismatch(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(TransformErrorKind::TypeMismatch, path, message.into())
    }

    pub fn cancelled(path: impl Into<String>) -> Self {
        Self::new(
            TransformErrorKind::Cancelled,
            path,
            "evaluation cancelled by caller".to_string(),
        )
    }
}
