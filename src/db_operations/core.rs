use crate::error::{MapError, MapResult};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Database handle with one cached tree per stored entity.
#[derive(Clone)]
pub struct DbOperations {
    /// The underlying sled database instance
    db: sled::Db,
    pub(crate) functions_tree: sled::Tree,
    pub(crate) dictionaries_tree: sled::Tree,
    /// Mapping config rows keyed by id
    pub(crate) configs_tree: sled::Tree,
    /// Per-scope head records (current pointer and next version)
    pub(crate) scopes_tree: sled::Tree,
    /// `scope key + zero padded version -> config id`
    pub(crate) versions_tree: sled::Tree,
    pub(crate) banks_tree: sled::Tree,
    pub(crate) transaction_types_tree: sled::Tree,
    pub(crate) protocols_tree: sled::Tree,
    pub(crate) rules_tree: sled::Tree,
}

impl DbOperations {
    /// Opens every tree the engine uses.
    pub fn new(db: sled::Db) -> Result<Self, sled::Error> {
        let functions_tree = db.open_tree("functions")?;
        let dictionaries_tree = db.open_tree("dictionaries")?;
        let configs_tree = db.open_tree("mapping_configs")?;
        let scopes_tree = db.open_tree("config_scopes")?;
        let versions_tree = db.open_tree("config_versions")?;
        let banks_tree = db.open_tree("banks")?;
        let transaction_types_tree = db.open_tree("transaction_types")?;
        let protocols_tree = db.open_tree("standard_protocols")?;
        let rules_tree = db.open_tree("transform_rules")?;

        Ok(Self {
            db,
            functions_tree,
            dictionaries_tree,
            configs_tree,
            scopes_tree,
            versions_tree,
            banks_tree,
            transaction_types_tree,
            protocols_tree,
            rules_tree,
        })
    }

    /// Opens (or creates) a database at `path`.
    pub fn open(path: &Path) -> MapResult<Self> {
        let db = sled::open(path)
            .map_err(|e| MapError::Database(format!("Failed to open database at {}: {}", path.display(), e)))?;
        Ok(Self::new(db)?)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> MapResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::new(db)?)
    }

    /// Gets a reference to the underlying database
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Row counts per tree.
    pub fn get_stats(&self) -> HashMap<String, u64> {
        let mut stats = HashMap::new();
        stats.insert("functions".to_string(), self.functions_tree.len() as u64);
        stats.insert("dictionaries".to_string(), self.dictionaries_tree.len() as u64);
        stats.insert("mapping_configs".to_string(), self.configs_tree.len() as u64);
        stats.insert("config_scopes".to_string(), self.scopes_tree.len() as u64);
        stats.insert("banks".to_string(), self.banks_tree.len() as u64);
        stats.insert(
            "transaction_types".to_string(),
            self.transaction_types_tree.len() as u64,
        );
        stats.insert("standard_protocols".to_string(), self.protocols_tree.len() as u64);
        stats.insert("transform_rules".to_string(), self.rules_tree.len() as u64);
        stats
    }

    // ========== GENERIC TREE OPERATIONS ==========

    /// Stores any serializable item in a specific tree
    pub fn store_in_tree<T: Serialize>(
        &self,
        tree: &sled::Tree,
        key: &str,
        item: &T,
    ) -> MapResult<()> {
        let bytes = serde_json::to_vec(item)
            .map_err(|e| MapError::Serialization(format!("Serialization failed: {}", e)))?;

        tree.insert(key.as_bytes(), bytes)
            .map_err(|e| MapError::Database(format!("Store failed: {}", e)))?;

        tree.flush()
            .map_err(|e| MapError::Database(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    /// Retrieves any deserializable item from a specific tree
    pub fn get_from_tree<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        key: &str,
    ) -> MapResult<Option<T>> {
        match tree.get(key.as_bytes()) {
            Ok(Some(bytes)) => {
                let item = serde_json::from_slice(&bytes).map_err(|e| {
                    MapError::Serialization(format!("Deserialization failed for '{}': {}", key, e))
                })?;
                Ok(Some(item))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(MapError::Database(format!("Retrieval failed: {}", e))),
        }
    }

    /// Lists all values in a tree, in key order
    pub fn list_items_in_tree<T: DeserializeOwned>(&self, tree: &sled::Tree) -> MapResult<Vec<T>> {
        let mut items = Vec::new();
        for result in tree.iter() {
            let (key, value) = result
                .map_err(|e| MapError::Database(format!("Tree iteration failed: {}", e)))?;
            let item = serde_json::from_slice(&value).map_err(|e| {
                MapError::Serialization(format!(
                    "Deserialization failed for key '{}': {}",
                    String::from_utf8_lossy(&key),
                    e
                ))
            })?;
            items.push(item);
        }
        Ok(items)
    }

    /// Deletes an item from a specific tree, reporting whether it existed
    pub fn delete_from_tree(&self, tree: &sled::Tree, key: &str) -> MapResult<bool> {
        let existed = tree
            .remove(key.as_bytes())
            .map_err(|e| MapError::Database(format!("Delete failed: {}", e)))?
            .is_some();

        tree.flush()
            .map_err(|e| MapError::Database(format!("Flush failed: {}", e)))?;

        Ok(existed)
    }

    pub fn exists_in_tree(&self, tree: &sled::Tree, key: &str) -> MapResult<bool> {
        tree.contains_key(key.as_bytes())
            .map_err(|e| MapError::Database(format!("Existence check failed: {}", e)))
    }
}
