//! # BankMap
//!
//! Mapping engine that turns bank messages into a target shape using
//! operator-maintained configurations.
//!
//! ## Core Components
//!
//! * `transform` - Function script language: parser, compiler and budgeted interpreter
//! * `mapping` - Mapping tree AST, source paths and save-time resolution
//! * `transform_execution` - Snapshot based evaluation of mapping trees
//! * `registry` - User functions and code dictionaries
//! * `version_store` - Versioned mapping configs per (bank, transaction, type) scope
//! * `service` - Transform façade over the stores and the evaluator
//! * `catalog` - Banks, transaction types, standard protocols, plugin export and document import
//! * `rules` - Unversioned legacy transform rules
//! * `db_operations` - sled storage helpers
//! * `bankmap_node` - Node wiring, configuration and the HTTP API
//!
//! ## Architecture
//!
//! Every transform reads an immutable snapshot of the config, functions and
//! dictionaries it references, so concurrent edits never change a running
//! evaluation. Config versions are allocated under a per-scope lock inside a
//! sled transaction and are never reused.

pub mod bankmap_node;
pub mod catalog;
pub mod db_operations;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod rules;
pub mod service;
pub mod transform;
pub mod transform_execution;
pub mod validation;
pub mod version_store;
pub mod web_logger;

// Re-export main types for convenience
pub use bankmap_node::config::load_node_config;
pub use bankmap_node::config::NodeConfig;
pub use bankmap_node::{BankMapHttpServer, BankMapNode};
pub use db_operations::DbOperations;
pub use error::{MapError, MapResult};
pub use mapping::{resolve_mapping_tree, DictionaryResolver, MappingNode, SourcePath};
pub use registry::{DictionaryStore, FunctionRegistry};
pub use service::{TransformOptions, TransformOutcome, TransformService};
pub use transform_execution::{FailurePolicy, MissingFieldPolicy, TransformError, TransformErrorKind};
pub use version_store::{ConfigScope, ConfigType, MappingConfig, VersionStore};
