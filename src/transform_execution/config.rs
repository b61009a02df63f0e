//! Evaluation policies and the settings that default them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Whether a failed branch aborts the transform or is localized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// First failure aborts the whole transform
    #[default]
    Strict,
    /// Failed field becomes `null` and the error is reported alongside
    Lenient,
}

/// What a `sourceRef` yields when its path does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    #[default]
    Null,
    /// Field is omitted from the enclosing object
    Absent,
    /// `MissingField` error
    Error,
}

/// Caller-held flag checked at every node boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call evaluation settings.
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    pub policy: FailurePolicy,
    pub missing_field: MissingFieldPolicy,
    pub cancellation: Option<CancellationToken>,
}

impl EvaluationOptions {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn lenient() -> Self {
        Self {
            policy: FailurePolicy::Lenient,
            ..Self::default()
        }
    }

    pub fn with_missing_field(mut self, missing_field: MissingFieldPolicy) -> Self {
        self.missing_field = missing_field;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Engine-wide execution settings, part of the node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock budget for a single function call
    #[serde(default = "default_function_timeout_ms")]
    pub function_timeout_ms: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub missing_field: MissingFieldPolicy,
    /// Disabled functions stop resolving in already-saved configs
    #[serde(default)]
    pub strict_disabled_references: bool,
}

fn default_function_timeout_ms() -> u64 {
    1000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            function_timeout_ms: default_function_timeout_ms(),
            failure_policy: FailurePolicy::default(),
            missing_field: MissingFieldPolicy::default(),
            strict_disabled_references: false,
        }
    }
}

impl ExecutionConfig {
    pub fn function_timeout(&self) -> Duration {
        Duration::from_millis(self.function_timeout_ms)
    }

    /// Options for a call that did not override anything.
    pub fn default_options(&self) -> EvaluationOptions {
        EvaluationOptions {
            policy: self.failure_policy,
            missing_field: self.missing_field,
            cancellation: None,
        }
    }
}
