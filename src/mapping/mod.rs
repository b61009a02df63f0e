//! Mapping trees: the typed description of how output is derived from
//! source data, functions and dictionaries.

pub mod ast;
pub mod path;
pub mod resolve;

pub use ast::MappingNode;
pub use path::{PathRoot, PathSegment, SourcePath};
pub use resolve::{
    resolve_mapping_tree, resolve_mapping_tree_with, DictionaryResolver, NoDictionaries,
};
