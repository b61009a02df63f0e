//! Code to label translation tables.

use crate::db_operations::DbOperations;
use crate::error::{MapError, MapResult};
use crate::mapping::DictionaryResolver;
use crate::transform_execution::{DictionarySnapshot, DictionaryTable};
use crate::validation::{require, validate_code};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryItem {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dictionary {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered by `sort_order`
    pub items: Vec<DictionaryItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dictionary {
    pub fn table(&self) -> DictionaryTable {
        DictionaryTable::from_pairs(
            self.items
                .iter()
                .map(|item| (item.key.as_str(), item.value.as_str())),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryItemDraft {
    pub key: String,
    pub value: String,
    /// Defaults to the item's position
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<DictionaryItemDraft>,
}

impl DictionaryDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>, pairs: &[(&str, &str)]) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: name.into(),
            description: None,
            items: pairs
                .iter()
                .map(|(key, value)| DictionaryItemDraft {
                    key: key.to_string(),
                    value: value.to_string(),
                    sort_order: None,
                })
                .collect(),
        }
    }
}

pub struct DictionaryStore {
    db_ops: Arc<DbOperations>,
    /// Serializes saves so code uniqueness checks cannot interleave
    write_lock: Mutex<()>,
}

impl DictionaryStore {
    pub fn new(db_ops: Arc<DbOperations>) -> Self {
        Self {
            db_ops,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MapResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| MapError::Database("Dictionary lock poisoned".to_string()))
    }

    pub fn save(&self, draft: DictionaryDraft) -> MapResult<Dictionary> {
        let code = draft.code.trim().to_string();
        validate_code("dictionary", &code)?;
        require("name", &draft.name)?;
        let items = normalize_items(draft.items)?;

        let _guard = self.lock()?;
        let existing = match draft.id.as_deref() {
            Some(id) => Some(self.get(id)?),
            None => None,
        };
        if self.check_code_exists(&code, draft.id.as_deref())? {
            return Err(MapError::Validation(format!(
                "Dictionary code '{}' already exists",
                code
            )));
        }

        let now = Utc::now();
        let dictionary = Dictionary {
            id: existing
                .as_ref()
                .map(|d| d.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            code,
            name: draft.name.trim().to_string(),
            description: draft.description,
            items,
            created_at: existing.as_ref().map(|d| d.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.db_ops.store_dictionary(&dictionary)?;
        info!(
            "Saved dictionary '{}' with {} items",
            dictionary.code,
            dictionary.items.len()
        );
        Ok(dictionary)
    }

    pub fn get(&self, id: &str) -> MapResult<Dictionary> {
        self.db_ops
            .get_dictionary(id)?
            .ok_or_else(|| MapError::NotFound(format!("Dictionary {} not found", id)))
    }

    pub fn find_by_code(&self, code: &str) -> MapResult<Option<Dictionary>> {
        self.db_ops.find_dictionary_by_code(code)
    }

    pub fn list(&self) -> MapResult<Vec<Dictionary>> {
        let mut dictionaries = self.db_ops.list_dictionaries()?;
        dictionaries.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(dictionaries)
    }

    pub fn delete(&self, id: &str) -> MapResult<()> {
        let _guard = self.lock()?;
        let dictionary = self.get(id)?;
        self.db_ops.delete_dictionary(id)?;
        info!("Deleted dictionary '{}' ({})", dictionary.code, id);
        Ok(())
    }

    pub fn check_code_exists(&self, code: &str, exclude_id: Option<&str>) -> MapResult<bool> {
        let code = code.trim();
        Ok(self
            .db_ops
            .list_dictionaries()?
            .iter()
            .any(|d| d.code == code && Some(d.id.as_str()) != exclude_id))
    }

    /// `Ok(None)` is Missing: unknown dictionary or unknown key.
    pub fn resolve(&self, code: &str, key: &str) -> MapResult<Option<String>> {
        Ok(self
            .find_by_code(code)?
            .and_then(|d| d.table().lookup(key, false).map(str::to_string)))
    }

    /// Key for `value`; the first item in display order wins.
    pub fn resolve_reverse(&self, code: &str, value: &str) -> MapResult<Option<String>> {
        Ok(self
            .find_by_code(code)?
            .and_then(|d| d.table().lookup(value, true).map(str::to_string)))
    }

    /// Copies the tables for `codes`. Unknown codes are skipped.
    pub fn snapshot<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> MapResult<DictionarySnapshot> {
        let wanted: HashSet<&str> = codes.into_iter().collect();
        let mut snapshot = DictionarySnapshot::new();
        if wanted.is_empty() {
            return Ok(snapshot);
        }
        for dictionary in self.db_ops.list_dictionaries()? {
            if wanted.contains(dictionary.code.as_str()) {
                snapshot.insert(dictionary.code.clone(), dictionary.table());
            }
        }
        Ok(snapshot)
    }
}

impl DictionaryResolver for DictionaryStore {
    fn dictionary_code(&self, id: &str) -> MapResult<Option<String>> {
        Ok(self.db_ops.get_dictionary(id)?.map(|dictionary| dictionary.code))
    }
}

fn normalize_items(drafts: Vec<DictionaryItemDraft>) -> MapResult<Vec<DictionaryItem>> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(drafts.len());
    for (position, draft) in drafts.into_iter().enumerate() {
        let key = draft.key.trim().to_string();
        if key.is_empty() {
            return Err(MapError::Validation(format!(
                "Dictionary item {} has an empty key",
                position
            )));
        }
        if !seen.insert(key.clone()) {
            return Err(MapError::Validation(format!(
                "Dictionary key '{}' appears more than once",
                key
            )));
        }
        items.push(DictionaryItem {
            key,
            value: draft.value,
            sort_order: draft.sort_order.unwrap_or(position as i32),
        });
    }
    items.sort_by_key(|item| item.sort_order);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DictionaryStore {
        DictionaryStore::new(Arc::new(DbOperations::temporary().unwrap()))
    }

    #[test]
    fn resolve_reports_missing_as_none() {
        let store = store();
        store
            .save(DictionaryDraft::new("STATUS", "Status", &[("01", "SUCCESS"), ("02", "FAILED")]))
            .unwrap();
        assert_eq!(store.resolve("STATUS", "01").unwrap().as_deref(), Some("SUCCESS"));
        assert_eq!(store.resolve("STATUS", "X").unwrap(), None);
        assert_eq!(store.resolve("NOPE", "01").unwrap(), None);
        assert_eq!(store.resolve_reverse("STATUS", "FAILED").unwrap().as_deref(), Some("02"));
    }

    #[test]
    fn rejects_duplicate_keys_and_codes() {
        let store = store();
        assert!(matches!(
            store.save(DictionaryDraft::new("D", "d", &[("a", "1"), ("a", "2")])),
            Err(MapError::Validation(_))
        ));
        let first = store.save(DictionaryDraft::new("D", "d", &[("a", "1")])).unwrap();
        assert!(matches!(
            store.save(DictionaryDraft::new("D", "other", &[])),
            Err(MapError::Validation(_))
        ));
        assert_eq!(store.get(&first.id).unwrap().name, "d");
    }

    #[test]
    fn items_are_ordered_by_sort_order() {
        let store = store();
        let mut draft = DictionaryDraft::new("D", "d", &[("b", "2"), ("a", "1")]);
        draft.items[0].sort_order = Some(10);
        draft.items[1].sort_order = Some(1);
        let saved = store.save(draft).unwrap();
        let keys: Vec<_> = saved.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn snapshot_is_isolated_from_later_edits() {
        let store = store();
        let saved = store.save(DictionaryDraft::new("D", "d", &[("k", "old")])).unwrap();
        let snapshot = store.snapshot(["D"]).unwrap();

        let mut update = DictionaryDraft::new("D", "d", &[("k", "new")]);
        update.id = Some(saved.id);
        store.save(update).unwrap();

        assert_eq!(snapshot.resolve("D", "k", false), Some("old"));
        assert_eq!(store.resolve("D", "k").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let store = store();
        assert!(matches!(store.delete("missing"), Err(MapError::NotFound(_))));
    }
}
