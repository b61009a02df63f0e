use super::core::DbOperations;
use crate::error::{MapError, MapResult};
use crate::version_store::{MappingConfig, ScopeHead};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree, Transactional,
};

/// Result of trying to claim a version number in a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionClaim {
    Committed,
    /// Number already handed out; caller should retry with a fresh head
    Taken,
}

/// Versions index key. Zero padding keeps prefix scans in version order.
pub fn version_index_key(scope_key: &str, version: u32) -> String {
    format!("{}#{:010}", scope_key, version)
}

fn read_head(
    scopes: &TransactionalTree,
    scope_key: &str,
) -> ConflictableTransactionResult<ScopeHead, MapError> {
    match scopes.get(scope_key.as_bytes())? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            ConflictableTransactionError::Abort(MapError::Serialization(format!(
                "Corrupt scope head for {}: {}",
                scope_key, e
            )))
        }),
        None => Ok(ScopeHead::default()),
    }
}

fn encode_head(head: &ScopeHead) -> ConflictableTransactionResult<Vec<u8>, MapError> {
    serde_json::to_vec(head).map_err(|e| {
        ConflictableTransactionError::Abort(MapError::Serialization(format!(
            "Serialization failed: {}",
            e
        )))
    })
}

fn transaction_error(error: TransactionError<MapError>) -> MapError {
    match error {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => MapError::Database(format!("Transaction failed: {}", e)),
    }
}

impl DbOperations {
    pub fn store_config(&self, config: &MappingConfig) -> MapResult<()> {
        self.store_in_tree(&self.configs_tree, &config.id, config)
    }

    pub fn get_config(&self, id: &str) -> MapResult<Option<MappingConfig>> {
        self.get_from_tree(&self.configs_tree, id)
    }

    pub fn list_configs(&self) -> MapResult<Vec<MappingConfig>> {
        self.list_items_in_tree(&self.configs_tree)
    }

    pub fn get_scope_head(&self, scope_key: &str) -> MapResult<Option<ScopeHead>> {
        self.get_from_tree(&self.scopes_tree, scope_key)
    }

    pub fn store_scope_head(&self, scope_key: &str, head: &ScopeHead) -> MapResult<()> {
        self.store_in_tree(&self.scopes_tree, scope_key, head)
    }

    pub fn get_version_id(&self, scope_key: &str, version: u32) -> MapResult<Option<String>> {
        let key = version_index_key(scope_key, version);
        let id = self
            .versions_tree
            .get(key.as_bytes())
            .map_err(|e| MapError::Database(format!("Retrieval failed: {}", e)))?;
        Ok(id.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// `(version, config id)` pairs of a scope, ascending by version.
    pub fn list_scope_versions(&self, scope_key: &str) -> MapResult<Vec<(u32, String)>> {
        let prefix = format!("{}#", scope_key);
        let mut versions = Vec::new();
        for result in self.versions_tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result
                .map_err(|e| MapError::Database(format!("Version scan failed: {}", e)))?;
            let key = String::from_utf8_lossy(&key);
            let version = key[prefix.len()..].parse::<u32>().map_err(|e| {
                MapError::Serialization(format!("Corrupt version index key '{}': {}", key, e))
            })?;
            versions.push((version, String::from_utf8_lossy(&value).into_owned()));
        }
        Ok(versions)
    }

    /// Inserts `config` as a new version and makes it current, in one
    /// transaction over rows, index and head.
    pub fn commit_new_version(
        &self,
        scope_key: &str,
        config: &MappingConfig,
    ) -> MapResult<VersionClaim> {
        let row = serde_json::to_vec(config)
            .map_err(|e| MapError::Serialization(format!("Serialization failed: {}", e)))?;
        let index_key = version_index_key(scope_key, config.version);

        let claim = (&self.configs_tree, &self.versions_tree, &self.scopes_tree)
            .transaction(
                |(configs, versions, scopes)| -> ConflictableTransactionResult<VersionClaim, MapError> {
                    let head = read_head(scopes, scope_key)?;
                    if config.version < head.next_version
                        || versions.get(index_key.as_bytes())?.is_some()
                    {
                        return Ok(VersionClaim::Taken);
                    }

                    let next = ScopeHead {
                        current_version: Some(config.version),
                        next_version: config.version + 1,
                    };
                    configs.insert(config.id.as_bytes(), row.as_slice())?;
                    versions.insert(index_key.as_bytes(), config.id.as_bytes())?;
                    scopes.insert(scope_key.as_bytes(), encode_head(&next)?)?;
                    Ok(VersionClaim::Committed)
                },
            )
            .map_err(transaction_error)?;

        if claim == VersionClaim::Committed {
            self.db()
                .flush()
                .map_err(|e| MapError::Database(format!("Flush failed: {}", e)))?;
        }
        Ok(claim)
    }

    /// Removes a version row and its index entry and stores `head`, atomically.
    pub fn remove_config_version(
        &self,
        scope_key: &str,
        config: &MappingConfig,
        head: &ScopeHead,
    ) -> MapResult<()> {
        let index_key = version_index_key(scope_key, config.version);
        (&self.configs_tree, &self.versions_tree, &self.scopes_tree)
            .transaction(
                |(configs, versions, scopes)| -> ConflictableTransactionResult<(), MapError> {
                    configs.remove(config.id.as_bytes())?;
                    versions.remove(index_key.as_bytes())?;
                    scopes.insert(scope_key.as_bytes(), encode_head(head)?)?;
                    Ok(())
                },
            )
            .map_err(transaction_error)?;

        self.db()
            .flush()
            .map_err(|e| MapError::Database(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}
