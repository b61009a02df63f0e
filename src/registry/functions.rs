//! User-authored transformation functions.
//!
//! Scripts are compiled when saved and the compiled form is cached by code,
//! so evaluation never re-parses source text.

use crate::db_operations::DbOperations;
use crate::error::{MapError, MapResult};
use crate::transform::interpreter::lookup_system_function;
use crate::transform::{compile, CompiledFunction, ExecutionBudget, ScriptError, Value};
use crate::transform_execution::{FunctionSnapshot, TransformError};
use crate::validation::{require, validate_code};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub script: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Save request. With an `id` the existing row is updated in place.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub script: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl FunctionDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: name.into(),
            description: None,
            script: script.into(),
            enabled: true,
        }
    }
}

struct FunctionEntry {
    definition: FunctionDefinition,
    compiled: Arc<CompiledFunction>,
}

pub struct FunctionRegistry {
    db_ops: Arc<DbOperations>,
    /// Compiled functions keyed by code
    entries: RwLock<HashMap<String, Arc<FunctionEntry>>>,
    timeout: Duration,
}

impl FunctionRegistry {
    /// Loads and compiles every stored function. Rows that no longer compile
    /// are logged and left out of the cache.
    pub fn new(db_ops: Arc<DbOperations>, timeout: Duration) -> MapResult<Self> {
        let mut entries = HashMap::new();
        for definition in db_ops.list_functions()? {
            match compile(&definition.code, &definition.script) {
                Ok(compiled) => {
                    entries.insert(
                        definition.code.clone(),
                        Arc::new(FunctionEntry {
                            definition,
                            compiled: Arc::new(compiled),
                        }),
                    );
                }
                Err(e) => warn!("Skipping function '{}': {}", definition.code, e),
            }
        }
        info!("Loaded {} functions", entries.len());

        Ok(Self {
            db_ops,
            entries: RwLock::new(entries),
            timeout,
        })
    }

    fn read(&self) -> MapResult<RwLockReadGuard<'_, HashMap<String, Arc<FunctionEntry>>>> {
        self.entries
            .read()
            .map_err(|_| MapError::Database("Function cache lock poisoned".to_string()))
    }

    fn write(&self) -> MapResult<RwLockWriteGuard<'_, HashMap<String, Arc<FunctionEntry>>>> {
        self.entries
            .write()
            .map_err(|_| MapError::Database("Function cache lock poisoned".to_string()))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn save(&self, draft: FunctionDraft) -> MapResult<FunctionDefinition> {
        let code = draft.code.trim().to_string();
        validate_code("function", &code)?;
        require("name", &draft.name)?;
        require("script", &draft.script)?;
        if lookup_system_function(&code).is_some() {
            return Err(MapError::Validation(format!(
                "Function code '{}' is reserved by a system function",
                code
            )));
        }
        let compiled = compile(&code, &draft.script)?;

        let mut entries = self.write()?;
        let existing = match draft.id.as_deref() {
            Some(id) => Some(
                self.db_ops
                    .get_function(id)?
                    .ok_or_else(|| MapError::NotFound(format!("Function {} not found", id)))?,
            ),
            None => None,
        };
        if self.code_taken(&code, draft.id.as_deref())? {
            return Err(MapError::Validation(format!(
                "Function code '{}' already exists",
                code
            )));
        }

        let now = Utc::now();
        let definition = FunctionDefinition {
            id: existing
                .as_ref()
                .map(|f| f.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            code: code.clone(),
            name: draft.name.trim().to_string(),
            description: draft.description,
            script: draft.script,
            enabled: draft.enabled,
            created_at: existing.as_ref().map(|f| f.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.db_ops.store_function(&definition)?;

        if let Some(previous) = &existing {
            entries.remove(&previous.code);
        }
        entries.insert(
            code,
            Arc::new(FunctionEntry {
                definition: definition.clone(),
                compiled: Arc::new(compiled),
            }),
        );

        info!(
            "{} function '{}' ({})",
            if existing.is_some() { "Updated" } else { "Created" },
            definition.code,
            definition.id
        );
        Ok(definition)
    }

    fn code_taken(&self, code: &str, exclude_id: Option<&str>) -> MapResult<bool> {
        Ok(self
            .db_ops
            .list_functions()?
            .iter()
            .any(|f| f.code == code && Some(f.id.as_str()) != exclude_id))
    }

    pub fn get(&self, id: &str) -> MapResult<FunctionDefinition> {
        self.db_ops
            .get_function(id)?
            .ok_or_else(|| MapError::NotFound(format!("Function {} not found", id)))
    }

    pub fn find_by_code(&self, code: &str) -> MapResult<Option<FunctionDefinition>> {
        Ok(self.read()?.get(code).map(|entry| entry.definition.clone()))
    }

    /// All custom functions ordered by code.
    pub fn list(&self) -> MapResult<Vec<FunctionDefinition>> {
        let mut functions = self.db_ops.list_functions()?;
        functions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(functions)
    }

    pub fn delete(&self, id: &str) -> MapResult<()> {
        let mut entries = self.write()?;
        let definition = self.get(id)?;
        self.db_ops.delete_function(id)?;
        entries.remove(&definition.code);
        info!("Deleted function '{}' ({})", definition.code, id);
        Ok(())
    }

    pub fn toggle_enabled(&self, id: &str) -> MapResult<FunctionDefinition> {
        let mut entries = self.write()?;
        let mut definition = self.get(id)?;
        definition.enabled = !definition.enabled;
        definition.updated_at = Utc::now();
        self.db_ops.store_function(&definition)?;

        if let Some(entry) = entries.get(&definition.code).cloned() {
            entries.insert(
                definition.code.clone(),
                Arc::new(FunctionEntry {
                    definition: definition.clone(),
                    compiled: entry.compiled.clone(),
                }),
            );
        }
        info!(
            "Function '{}' is now {}",
            definition.code,
            if definition.enabled { "enabled" } else { "disabled" }
        );
        Ok(definition)
    }

    pub fn check_code_exists(&self, code: &str, exclude_id: Option<&str>) -> MapResult<bool> {
        self.code_taken(code.trim(), exclude_id)
    }

    /// Whether a newly saved mapping tree may reference `code`.
    pub fn is_usable(&self, code: &str) -> MapResult<bool> {
        if lookup_system_function(code).is_some() {
            return Ok(true);
        }
        Ok(self
            .read()?
            .get(code)
            .is_some_and(|entry| entry.definition.enabled))
    }

    /// Runs one function outside a mapping tree. Disabled functions do not
    /// resolve here.
    pub fn invoke(&self, code: &str, args: &[JsonValue]) -> MapResult<JsonValue> {
        let entry = self.read()?.get(code).cloned();
        match entry {
            Some(entry) if entry.definition.enabled => {
                let budget = ExecutionBudget::with_timeout(self.timeout);
                entry.compiled.invoke(args, budget).map_err(|e| match e {
                    ScriptError::Timeout => TransformError::function_timeout("$", code).into(),
                    ScriptError::Failed(cause) => {
                        TransformError::function_failed("$", code, &cause).into()
                    }
                })
            }
            Some(_) => Err(TransformError::unknown_function("$", code).into()),
            None => match lookup_system_function(code) {
                Some(function) => {
                    let values: Vec<Value> = args.iter().cloned().map(Value::from).collect();
                    (function.call)(&values)
                        .map(JsonValue::from)
                        .map_err(|cause| TransformError::function_failed("$", code, &cause).into())
                }
                None => Err(TransformError::unknown_function("$", code).into()),
            },
        }
    }

    /// Captures the compiled form of `codes`. Unknown codes are left out and
    /// fail at evaluation as unknown functions.
    pub fn snapshot<'a>(
        &self,
        codes: impl IntoIterator<Item = &'a str>,
        honor_disabled: bool,
    ) -> MapResult<FunctionSnapshot> {
        let entries = self.read()?;
        let mut snapshot = FunctionSnapshot::new(self.timeout, honor_disabled);
        for code in codes {
            if let Some(entry) = entries.get(code) {
                snapshot.insert(code, entry.compiled.clone(), entry.definition.enabled);
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform_execution::TransformErrorKind;
    use serde_json::json;

    fn registry() -> FunctionRegistry {
        let db_ops = Arc::new(DbOperations::temporary().unwrap());
        FunctionRegistry::new(db_ops, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn save_compiles_and_invokes() {
        let registry = registry();
        let saved = registry
            .save(FunctionDraft::new("ROUND2", "Round to cents", "params(x); return round(x, 2);"))
            .unwrap();
        assert!(saved.enabled);
        assert_eq!(registry.invoke("ROUND2", &[json!(12.345)]).unwrap(), json!(12.35));
        assert_eq!(registry.get(&saved.id).unwrap().code, "ROUND2");
    }

    #[test]
    fn duplicate_code_is_rejected_and_existing_row_kept() {
        let registry = registry();
        let first = registry.save(FunctionDraft::new("F", "first", "return 1;")).unwrap();
        let error = registry.save(FunctionDraft::new("F", "second", "return 2;")).unwrap_err();
        assert!(matches!(error, MapError::Validation(_)));
        assert_eq!(registry.get(&first.id).unwrap().name, "first");
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn invalid_scripts_and_reserved_codes_are_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.save(FunctionDraft::new("F", "bad", "return (;")),
            Err(MapError::Validation(_))
        ));
        assert!(matches!(
            registry.save(FunctionDraft::new("round", "shadow", "return 1;")),
            Err(MapError::Validation(_))
        ));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn update_in_place_can_rename_code() {
        let registry = registry();
        let saved = registry.save(FunctionDraft::new("OLD", "f", "return 1;")).unwrap();
        let mut draft = FunctionDraft::new("NEW", "f", "return 2;");
        draft.id = Some(saved.id.clone());
        let updated = registry.save(draft).unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert!(registry.find_by_code("OLD").unwrap().is_none());
        assert_eq!(registry.invoke("NEW", &[]).unwrap(), json!(2));
    }

    #[test]
    fn check_code_exists_honors_exclusion() {
        let registry = registry();
        let saved = registry.save(FunctionDraft::new("F", "f", "return 1;")).unwrap();
        assert!(registry.check_code_exists("F", None).unwrap());
        assert!(!registry.check_code_exists("F", Some(&saved.id)).unwrap());
        assert!(!registry.check_code_exists("G", None).unwrap());
    }

    #[test]
    fn disabled_functions_are_not_usable_but_stay_in_snapshots() {
        let registry = registry();
        let saved = registry.save(FunctionDraft::new("F", "f", "return 1;")).unwrap();
        registry.toggle_enabled(&saved.id).unwrap();

        assert!(!registry.is_usable("F").unwrap());
        assert!(registry.is_usable("upperCase").unwrap());
        assert_eq!(registry.snapshot(["F"], false).unwrap().len(), 1);
        assert!(registry.snapshot(["F"], true).unwrap().resolve("F").is_none());

        let error = registry.invoke("F", &[]).unwrap_err();
        match error {
            MapError::Transform(e) => assert_eq!(e.kind, TransformErrorKind::UnknownFunction),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn delete_removes_row_and_cache_entry() {
        let registry = registry();
        let saved = registry.save(FunctionDraft::new("F", "f", "return 1;")).unwrap();
        registry.delete(&saved.id).unwrap();
        assert!(matches!(registry.get(&saved.id), Err(MapError::NotFound(_))));
        assert!(registry.find_by_code("F").unwrap().is_none());
        assert!(matches!(registry.delete(&saved.id), Err(MapError::NotFound(_))));
    }

    #[test]
    fn functions_are_reloaded_from_storage() {
        let db_ops = Arc::new(DbOperations::temporary().unwrap());
        FunctionRegistry::new(db_ops.clone(), Duration::from_secs(1))
            .unwrap()
            .save(FunctionDraft::new("F", "f", "params(a); return a * 2;"))
            .unwrap();

        let reloaded = FunctionRegistry::new(db_ops, Duration::from_secs(1)).unwrap();
        assert_eq!(reloaded.invoke("F", &[json!(4)]).unwrap(), json!(8));
    }

    #[test]
    fn system_functions_can_be_invoked_directly() {
        let registry = registry();
        assert_eq!(registry.invoke("upperCase", &[json!("ab")]).unwrap(), json!("AB"));
        assert!(registry.invoke("missing", &[]).is_err());
    }
}
