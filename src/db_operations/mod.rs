// Storage layer: one sled handle, one tree per entity
mod catalog_operations;
mod config_operations;
pub mod core;
mod dictionary_operations;
mod function_operations;

pub use config_operations::{version_index_key, VersionClaim};
pub use core::DbOperations;
