//! Evaluation of mapping trees: policies, snapshots, the evaluator and its
//! structured errors.

pub mod config;
pub mod error;
pub mod executor;
pub mod snapshot;

pub use config::{
    CancellationToken, EvaluationOptions, ExecutionConfig, FailurePolicy, MissingFieldPolicy,
};
pub use error::{TransformError, TransformErrorKind, TransformResult};
pub use executor::{evaluate, Evaluation};
pub use snapshot::{
    DictionarySnapshot, DictionaryTable, FunctionSnapshot, ResolvedFunction, TransformSnapshot,
};
