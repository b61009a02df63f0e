//! Functions and dictionaries referenced from mapping trees by code.

pub mod dictionaries;
pub mod functions;

pub use dictionaries::{Dictionary, DictionaryDraft, DictionaryItem, DictionaryItemDraft, DictionaryStore};
pub use functions::{FunctionDefinition, FunctionDraft, FunctionRegistry};
