//! Immutable inputs for one evaluation.
//!
//! A snapshot is assembled once at the start of a transform. Later edits to
//! functions, dictionaries or configs never reach an evaluation that is
//! already running because every table here is owned or shared via `Arc`.

use crate::mapping::MappingNode;
use crate::transform::interpreter::{lookup_system_function, ExecutionBudget, SystemFunction};
use crate::transform::CompiledFunction;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How a function code resolved inside a snapshot.
pub enum ResolvedFunction<'a> {
    Custom(&'a CompiledFunction),
    System(&'static SystemFunction),
}

struct FunctionSlot {
    compiled: Arc<CompiledFunction>,
    enabled: bool,
}

/// Custom functions captured for one evaluation. System functions are
/// always resolvable and need no capture.
pub struct FunctionSnapshot {
    functions: HashMap<String, FunctionSlot>,
    honor_disabled: bool,
    timeout: Duration,
}

impl FunctionSnapshot {
    /// `honor_disabled` makes disabled functions unresolvable.
    pub fn new(timeout: Duration, honor_disabled: bool) -> Self {
        Self {
            functions: HashMap::new(),
            honor_disabled,
            timeout,
        }
    }

    pub fn insert(&mut self, code: impl Into<String>, compiled: Arc<CompiledFunction>, enabled: bool) {
        self.functions
            .insert(code.into(), FunctionSlot { compiled, enabled });
    }

    pub fn resolve(&self, code: &str) -> Option<ResolvedFunction<'_>> {
        if let Some(slot) = self.functions.get(code) {
            if slot.enabled || !self.honor_disabled {
                return Some(ResolvedFunction::Custom(&slot.compiled));
            }
            return None;
        }
        lookup_system_function(code).map(ResolvedFunction::System)
    }

    /// Fresh budget for a single call.
    pub fn budget(&self) -> ExecutionBudget {
        ExecutionBudget::with_timeout(self.timeout)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Forward and reverse tables for one dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictionaryTable {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl DictionaryTable {
    /// Builds the table from `(key, value)` pairs in display order. For
    /// reverse lookups the first key holding a value wins.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = Self::default();
        for (key, value) in pairs {
            table.forward.insert(key.to_string(), value.to_string());
            table
                .reverse
                .entry(value.to_string())
                .or_insert_with(|| key.to_string());
        }
        table
    }

    pub fn lookup(&self, key: &str, reverse: bool) -> Option<&str> {
        let map = if reverse { &self.reverse } else { &self.forward };
        map.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DictionarySnapshot {
    tables: HashMap<String, Arc<DictionaryTable>>,
}

impl DictionarySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, table: DictionaryTable) {
        self.tables.insert(code.into(), Arc::new(table));
    }

    /// `None` means Missing: unknown dictionary or unknown key.
    pub fn resolve(&self, code: &str, key: &str, reverse: bool) -> Option<&str> {
        self.tables.get(code)?.lookup(key, reverse)
    }
}

/// Everything one evaluation reads.
pub struct TransformSnapshot {
    pub root: Arc<MappingNode>,
    pub functions: FunctionSnapshot,
    pub dictionaries: DictionarySnapshot,
}
