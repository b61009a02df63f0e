//! Versioned mapping configurations.
//!
//! Rows are grouped by scope key `(bank category, transaction type, config
//! type)`. Each scope keeps a head record holding the current version and
//! the next version number to allocate. Every mutation of a scope runs under
//! that scope's mutex; new versions additionally commit row, index and head
//! in one storage transaction.

pub mod types;

pub use types::{
    ConfigDraft, ConfigScope, ConfigType, DeletePolicy, MappingConfig, ScopeHead, VersionInfo,
};

use crate::db_operations::{DbOperations, VersionClaim};
use crate::error::{MapError, MapResult};
use crate::validation::require;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Version store settings, part of the engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionStoreConfig {
    #[serde(default)]
    pub delete_policy: DeletePolicy,
    /// Attempts at claiming a version number before giving up
    #[serde(default = "default_retry_limit")]
    pub version_retry_limit: u32,
}

fn default_retry_limit() -> u32 {
    8
}

impl Default for VersionStoreConfig {
    fn default() -> Self {
        Self {
            delete_policy: DeletePolicy::default(),
            version_retry_limit: default_retry_limit(),
        }
    }
}

pub struct VersionStore {
    db_ops: Arc<DbOperations>,
    scope_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    config: VersionStoreConfig,
}

fn poisoned<T>(_: T) -> MapError {
    MapError::Database("Scope lock poisoned".to_string())
}

impl VersionStore {
    pub fn new(db_ops: Arc<DbOperations>, config: VersionStoreConfig) -> Self {
        Self {
            db_ops,
            scope_locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn scope_lock(&self, scope_key: &str) -> MapResult<Arc<Mutex<()>>> {
        let mut locks = self.scope_locks.lock().map_err(poisoned)?;
        Ok(locks
            .entry(scope_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn head(&self, scope_key: &str) -> MapResult<ScopeHead> {
        Ok(self.db_ops.get_scope_head(scope_key)?.unwrap_or_default())
    }

    fn config_at(&self, scope_key: &str, version: u32) -> MapResult<Option<MappingConfig>> {
        match self.db_ops.get_version_id(scope_key, version)? {
            Some(id) => self.db_ops.get_config(&id),
            None => Ok(None),
        }
    }

    pub fn get(&self, id: &str) -> MapResult<MappingConfig> {
        self.db_ops
            .get_config(id)?
            .ok_or_else(|| MapError::NotFound(format!("Mapping config {} not found", id)))
    }

    pub fn get_current(&self, scope: &ConfigScope, config_type: ConfigType) -> MapResult<MappingConfig> {
        let key = scope.key(config_type);
        let not_found =
            || MapError::NotFound(format!("No current {} config for {}", config_type, scope));
        let version = self.head(&key)?.current_version.ok_or_else(not_found)?;
        self.config_at(&key, version)?.ok_or_else(not_found)
    }

    pub fn get_by_version(
        &self,
        scope: &ConfigScope,
        config_type: ConfigType,
        version: u32,
    ) -> MapResult<MappingConfig> {
        self.config_at(&scope.key(config_type), version)?
            .ok_or_else(|| {
                MapError::NotFound(format!(
                    "Version {} of {} config for {} not found",
                    version, config_type, scope
                ))
            })
    }

    /// Version metadata ascending by version.
    pub fn list_versions(&self, scope: &ConfigScope, config_type: ConfigType) -> MapResult<Vec<VersionInfo>> {
        let key = scope.key(config_type);
        let current = self.head(&key)?.current_version;
        let mut versions = Vec::new();
        for (version, id) in self.db_ops.list_scope_versions(&key)? {
            match self.db_ops.get_config(&id)? {
                Some(config) => versions.push(VersionInfo {
                    id: config.id,
                    version,
                    name: config.name,
                    created_at: config.created_at,
                    enabled: config.enabled,
                    is_current: current == Some(version),
                }),
                None => warn!("Version index for {} points at missing row {}", key, id),
            }
        }
        Ok(versions)
    }

    pub fn is_current(&self, config: &MappingConfig) -> MapResult<bool> {
        Ok(self.head(&config.scope_key())?.current_version == Some(config.version))
    }

    /// Every stored row ordered by scope, config type and version.
    pub fn list_all(&self) -> MapResult<Vec<MappingConfig>> {
        let mut configs = self.db_ops.list_configs()?;
        configs.sort_by(|a, b| {
            (&a.bank_category, &a.transaction_type, a.config_type, a.version).cmp(&(
                &b.bank_category,
                &b.transaction_type,
                b.config_type,
                b.version,
            ))
        });
        Ok(configs)
    }

    /// The current row of every scope.
    pub fn list_current(&self) -> MapResult<Vec<MappingConfig>> {
        let mut current = Vec::new();
        for config in self.list_all()? {
            if self.is_current(&config)? {
                current.push(config);
            }
        }
        Ok(current)
    }

    /// Current config carrying `name`. A name current in more than one
    /// scope is ambiguous.
    pub fn find_current_by_name(&self, name: &str) -> MapResult<MappingConfig> {
        let mut matches: Vec<MappingConfig> = self
            .list_current()?
            .into_iter()
            .filter(|config| config.name == name)
            .collect();
        match matches.len() {
            0 => Err(MapError::NotFound(format!("No current mapping config named '{}'", name))),
            1 => Ok(matches.remove(0)),
            n => Err(MapError::Validation(format!(
                "Mapping config name '{}' is current in {} scopes",
                name, n
            ))),
        }
    }

    pub fn save(&self, draft: ConfigDraft) -> MapResult<MappingConfig> {
        require("name", &draft.name)?;
        let existing = match draft.id.as_deref() {
            Some(id) => Some(self.get(id)?),
            None => None,
        };

        match existing {
            Some(row) if !draft.create_new_version => self.update_in_place(row, draft),
            row => {
                let scope = draft
                    .scope
                    .clone()
                    .or_else(|| row.as_ref().map(MappingConfig::scope))
                    .ok_or_else(|| {
                        MapError::Validation("bankCategory and transactionType are required".to_string())
                    })?;
                require("bankCategory", &scope.bank_category)?;
                require("transactionType", &scope.transaction_type)?;
                let config_type = draft
                    .config_type
                    .or_else(|| row.as_ref().map(|r| r.config_type))
                    .unwrap_or_default();
                self.insert_new_version(scope, config_type, draft)
            }
        }
    }

    /// Only name, description and tree come from `draft`; everything else
    /// is taken from the row as stored once the scope lock is held.
    fn update_in_place(&self, seen: MappingConfig, draft: ConfigDraft) -> MapResult<MappingConfig> {
        if draft.scope.as_ref().is_some_and(|scope| *scope != seen.scope())
            || draft.config_type.is_some_and(|t| t != seen.config_type)
        {
            return Err(MapError::Validation(
                "An in-place update cannot move a config to another scope".to_string(),
            ));
        }

        let key = seen.scope_key();
        let lock = self.scope_lock(&key)?;
        let _guard = lock.lock().map_err(poisoned)?;
        let mut row = self
            .db_ops
            .get_config(&seen.id)?
            .ok_or_else(|| MapError::NotFound(format!("Mapping config {} not found", seen.id)))?;

        row.name = draft.name.trim().to_string();
        row.description = draft.description;
        row.mapping_tree = draft.mapping_tree;
        row.updated_at = Utc::now();
        self.db_ops.store_config(&row)?;
        info!("Updated {} config v{} for {} in place", row.config_type, row.version, row.scope());
        Ok(row)
    }

    fn insert_new_version(
        &self,
        scope: ConfigScope,
        config_type: ConfigType,
        draft: ConfigDraft,
    ) -> MapResult<MappingConfig> {
        let key = scope.key(config_type);
        let lock = self.scope_lock(&key)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let now = Utc::now();
        let mut config = MappingConfig {
            id: Uuid::new_v4().to_string(),
            bank_category: scope.bank_category.clone(),
            transaction_type: scope.transaction_type.clone(),
            config_type,
            version: 0,
            name: draft.name.trim().to_string(),
            description: draft.description,
            enabled: true,
            mapping_tree: draft.mapping_tree,
            created_at: now,
            updated_at: now,
        };

        let attempts = self.config.version_retry_limit.max(1);
        for attempt in 1..=attempts {
            let head = self.head(&key)?;
            let highest = self
                .db_ops
                .list_scope_versions(&key)?
                .last()
                .map(|(version, _)| *version)
                .unwrap_or(0);
            config.version = head.next_version.max(highest + 1);

            match self.db_ops.commit_new_version(&key, &config)? {
                VersionClaim::Committed => {
                    info!(
                        "Created {} config v{} for {} ({})",
                        config_type, config.version, scope, config.id
                    );
                    return Ok(config);
                }
                VersionClaim::Taken => debug!(
                    "Version {} for {} already taken (attempt {}/{})",
                    config.version, scope, attempt, attempts
                ),
            }
        }

        Err(MapError::VersionConflict(format!(
            "Could not allocate a version for {} after {} attempts",
            scope, attempts
        )))
    }

    /// Makes `version` current. Rolling back to the current version is a
    /// no-op; no row is changed either way.
    pub fn rollback(
        &self,
        scope: &ConfigScope,
        config_type: ConfigType,
        version: u32,
    ) -> MapResult<MappingConfig> {
        let key = scope.key(config_type);
        let lock = self.scope_lock(&key)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let target = self.get_by_version(scope, config_type, version)?;
        let mut head = self.head(&key)?;
        if head.current_version != Some(version) {
            let previous = head.current_version;
            head.current_version = Some(version);
            self.db_ops.store_scope_head(&key, &head)?;
            info!(
                "Rolled back {} config for {} from {:?} to v{}",
                config_type, scope, previous, version
            );
        }
        Ok(target)
    }

    pub fn toggle_enabled(&self, id: &str) -> MapResult<MappingConfig> {
        let row = self.get(id)?;
        let lock = self.scope_lock(&row.scope_key())?;
        let _guard = lock.lock().map_err(poisoned)?;

        let mut row = self.get(id)?;
        row.enabled = !row.enabled;
        row.updated_at = Utc::now();
        self.db_ops.store_config(&row)?;
        info!(
            "{} config v{} for {} is now {}",
            row.config_type,
            row.version,
            row.scope(),
            if row.enabled { "enabled" } else { "disabled" }
        );
        Ok(row)
    }

    /// Deletes one version row. Deleting the current version follows the
    /// configured [`DeletePolicy`].
    pub fn delete(&self, id: &str) -> MapResult<()> {
        let row = self.get(id)?;
        let key = row.scope_key();
        let lock = self.scope_lock(&key)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let row = self.get(id)?;
        let mut head = self.head(&key)?;
        if head.current_version == Some(row.version) {
            let highest_remaining = self
                .db_ops
                .list_scope_versions(&key)?
                .into_iter()
                .map(|(version, _)| version)
                .filter(|version| *version != row.version)
                .max();
            head.current_version = match (self.config.delete_policy, highest_remaining) {
                (DeletePolicy::Reject, Some(_)) => {
                    return Err(MapError::Conflict(format!(
                        "v{} is the current {} config for {}; roll back before deleting it",
                        row.version,
                        row.config_type,
                        row.scope()
                    )))
                }
                (_, remaining) => remaining,
            };
        }

        self.db_ops.remove_config_version(&key, &row, &head)?;
        info!(
            "Deleted {} config v{} for {}; current is now {:?}",
            row.config_type,
            row.version,
            row.scope(),
            head.current_version
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingNode;
    use serde_json::json;
    use std::collections::HashSet;
    use std::thread;

    fn store_with(policy: DeletePolicy) -> VersionStore {
        VersionStore::new(
            Arc::new(DbOperations::temporary().unwrap()),
            VersionStoreConfig {
                delete_policy: policy,
                ..VersionStoreConfig::default()
            },
        )
    }

    fn store() -> VersionStore {
        store_with(DeletePolicy::ReassignHighest)
    }

    fn scope() -> ConfigScope {
        ConfigScope::new("BankA", "Deposit")
    }

    fn draft(name: &str, marker: i64) -> ConfigDraft {
        ConfigDraft {
            id: None,
            scope: Some(scope()),
            config_type: Some(ConfigType::Request),
            name: name.to_string(),
            description: None,
            mapping_tree: MappingNode::literal(json!(marker)),
            create_new_version: true,
        }
    }

    #[test]
    fn in_place_update_keeps_changes_made_after_the_row_was_read() {
        let store = store();
        let saved = store.save(draft("first", 1)).unwrap();
        let stale = store.get(&saved.id).unwrap();
        store.toggle_enabled(&saved.id).unwrap();

        let mut edit = draft("renamed", 2);
        edit.id = Some(saved.id.clone());
        edit.create_new_version = false;
        let updated = store.update_in_place(stale, edit).unwrap();

        assert!(!updated.enabled);
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.mapping_tree, MappingNode::literal(json!(2)));
        assert_eq!(store.get(&saved.id).unwrap(), updated);
    }

    #[test]
    fn new_version_after_two_becomes_version_three_and_current() {
        let store = store();
        store.save(draft("v", 1)).unwrap();
        store.save(draft("v", 2)).unwrap();
        let third = store.save(draft("v", 3)).unwrap();
        assert_eq!(third.version, 3);

        let versions = store.list_versions(&scope(), ConfigType::Request).unwrap();
        let numbers: Vec<u32> = versions.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let current: Vec<u32> = versions.iter().filter(|v| v.is_current).map(|v| v.version).collect();
        assert_eq!(current, vec![3]);
    }

    #[test]
    fn rollback_keeps_every_version_retrievable() {
        let store = store();
        for marker in 1..=3 {
            store.save(draft("v", marker)).unwrap();
        }
        store.rollback(&scope(), ConfigType::Request, 1).unwrap();

        assert_eq!(store.get_current(&scope(), ConfigType::Request).unwrap().version, 1);
        for version in [2, 3] {
            let row = store.get_by_version(&scope(), ConfigType::Request, version).unwrap();
            assert_eq!(row.mapping_tree, MappingNode::literal(json!(version)));
        }
    }

    #[test]
    fn rollback_is_idempotent() {
        let store = store();
        store.save(draft("v", 1)).unwrap();
        store.save(draft("v", 2)).unwrap();
        let before = store.list_all().unwrap();

        store.rollback(&scope(), ConfigType::Request, 2).unwrap();
        store.rollback(&scope(), ConfigType::Request, 1).unwrap();
        store.rollback(&scope(), ConfigType::Request, 1).unwrap();

        assert_eq!(store.list_all().unwrap(), before);
        assert_eq!(store.get_current(&scope(), ConfigType::Request).unwrap().version, 1);
        assert!(matches!(
            store.rollback(&scope(), ConfigType::Request, 9),
            Err(MapError::NotFound(_))
        ));
    }

    #[test]
    fn in_place_update_keeps_version_and_current() {
        let store = store();
        let first = store.save(draft("v", 1)).unwrap();
        store.save(draft("v", 2)).unwrap();

        let update = ConfigDraft {
            id: Some(first.id.clone()),
            scope: None,
            config_type: None,
            name: "renamed".to_string(),
            description: Some("edited".to_string()),
            mapping_tree: MappingNode::literal(json!("new")),
            create_new_version: false,
        };
        let updated = store.save(update).unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.name, "renamed");
        assert_eq!(store.get_current(&scope(), ConfigType::Request).unwrap().version, 2);
    }

    #[test]
    fn new_version_from_id_inherits_scope() {
        let store = store();
        let mut response = draft("resp", 1);
        response.config_type = Some(ConfigType::Response);
        let first = store.save(response).unwrap();

        let next = ConfigDraft {
            id: Some(first.id),
            scope: None,
            config_type: None,
            name: "resp".to_string(),
            description: None,
            mapping_tree: MappingNode::literal(json!(2)),
            create_new_version: true,
        };
        let saved = store.save(next).unwrap();
        assert_eq!(saved.version, 2);
        assert_eq!(saved.config_type, ConfigType::Response);
        assert!(store.get_current(&scope(), ConfigType::Request).is_err());
    }

    #[test]
    fn concurrent_saves_never_share_a_version() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.save(draft("v", i)).unwrap().version)
            })
            .collect();
        let versions: HashSet<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(versions, (1..=8).collect::<HashSet<u32>>());
    }

    #[test]
    fn deleting_current_reassigns_to_highest_remaining() {
        let store = store();
        store.save(draft("v", 1)).unwrap();
        store.save(draft("v", 2)).unwrap();
        let third = store.save(draft("v", 3)).unwrap();
        store.rollback(&scope(), ConfigType::Request, 1).unwrap();

        let first = store.get_current(&scope(), ConfigType::Request).unwrap();
        store.delete(&first.id).unwrap();
        assert_eq!(store.get_current(&scope(), ConfigType::Request).unwrap().version, 3);

        store.delete(&third.id).unwrap();
        let second = store.get_current(&scope(), ConfigType::Request).unwrap();
        assert_eq!(second.version, 2);
        store.delete(&second.id).unwrap();
        assert!(matches!(
            store.get_current(&scope(), ConfigType::Request),
            Err(MapError::NotFound(_))
        ));
    }

    #[test]
    fn versions_are_not_reused_after_delete() {
        let store = store();
        store.save(draft("v", 1)).unwrap();
        let second = store.save(draft("v", 2)).unwrap();
        store.delete(&second.id).unwrap();
        assert_eq!(store.save(draft("v", 3)).unwrap().version, 3);
    }

    #[test]
    fn reject_policy_refuses_to_delete_current() {
        let store = store_with(DeletePolicy::Reject);
        let first = store.save(draft("v", 1)).unwrap();
        let second = store.save(draft("v", 2)).unwrap();

        assert!(matches!(store.delete(&second.id), Err(MapError::Conflict(_))));
        store.delete(&first.id).unwrap();
        store.delete(&second.id).unwrap();
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn toggle_enabled_leaves_versions_alone() {
        let store = store();
        let row = store.save(draft("v", 1)).unwrap();
        let toggled = store.toggle_enabled(&row.id).unwrap();
        assert!(!toggled.enabled);
        assert_eq!(toggled.version, 1);
        assert!(store.is_current(&toggled).unwrap());
    }

    #[test]
    fn find_current_by_name_detects_ambiguity() {
        let store = store();
        store.save(draft("shared", 1)).unwrap();
        assert_eq!(store.find_current_by_name("shared").unwrap().version, 1);

        let mut other = draft("shared", 2);
        other.scope = Some(ConfigScope::new("BankB", "Deposit"));
        store.save(other).unwrap();
        assert!(matches!(store.find_current_by_name("shared"), Err(MapError::Validation(_))));
        assert!(matches!(store.find_current_by_name("none"), Err(MapError::NotFound(_))));
    }

    #[test]
    fn new_versions_require_a_scope() {
        let store = store();
        let mut unscoped = draft("v", 1);
        unscoped.scope = None;
        assert!(matches!(store.save(unscoped), Err(MapError::Validation(_))));
    }
}
