//! Bank plugin export: everything needed to reproduce one bank's mappings
//! elsewhere, as a single checksummed JSON document.

use super::{Bank, Catalog, TransactionType};
use crate::error::MapResult;
use crate::registry::{Dictionary, DictionaryStore, FunctionDefinition, FunctionRegistry};
use crate::version_store::{MappingConfig, VersionStore};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

pub const PLUGIN_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankPluginPackage {
    pub format_version: u32,
    pub bank: Bank,
    pub transaction_types: Vec<TransactionType>,
    /// Current version of every scope under the bank
    pub configs: Vec<MappingConfig>,
    /// Custom functions the configs reference
    pub functions: Vec<FunctionDefinition>,
    pub dictionaries: Vec<Dictionary>,
    pub exported_at: DateTime<Utc>,
}

/// Serialized package ready for download.
#[derive(Debug, Clone)]
pub struct PluginExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`
    pub checksum: String,
}

pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl Catalog {
    pub fn build_plugin_package(
        &self,
        bank_id: &str,
        configs: &VersionStore,
        functions: &FunctionRegistry,
        dictionaries: &DictionaryStore,
    ) -> MapResult<BankPluginPackage> {
        let bank = self.get_bank(bank_id)?;
        let transaction_types = self.list_transaction_types(bank_id)?;
        let bank_configs: Vec<MappingConfig> = configs
            .list_current()?
            .into_iter()
            .filter(|config| config.bank_category == bank.code)
            .collect();

        let mut function_codes = BTreeSet::new();
        let mut dictionary_codes = BTreeSet::new();
        for config in &bank_configs {
            function_codes.extend(config.mapping_tree.referenced_functions());
            dictionary_codes.extend(config.mapping_tree.referenced_dictionaries());
        }

        let mut referenced_functions = Vec::new();
        for code in &function_codes {
            // system functions have no row
            if let Some(function) = functions.find_by_code(code)? {
                referenced_functions.push(function);
            }
        }
        let mut referenced_dictionaries = Vec::new();
        for code in &dictionary_codes {
            if let Some(dictionary) = dictionaries.find_by_code(code)? {
                referenced_dictionaries.push(dictionary);
            }
        }

        Ok(BankPluginPackage {
            format_version: PLUGIN_FORMAT_VERSION,
            bank,
            transaction_types,
            configs: bank_configs,
            functions: referenced_functions,
            dictionaries: referenced_dictionaries,
            exported_at: Utc::now(),
        })
    }

    pub fn export_bank_plugin(
        &self,
        bank_id: &str,
        configs: &VersionStore,
        functions: &FunctionRegistry,
        dictionaries: &DictionaryStore,
    ) -> MapResult<PluginExport> {
        let package = self.build_plugin_package(bank_id, configs, functions, dictionaries)?;
        let bytes = serde_json::to_vec_pretty(&package)?;
        let checksum = checksum(&bytes);
        let file_name = format!(
            "{}_plugin_{}.json",
            package.bank.code,
            package.exported_at.format("%Y%m%d%H%M%S")
        );
        info!(
            "Exported plugin for bank '{}': {} configs, {} functions, {} dictionaries",
            package.bank.code,
            package.configs.len(),
            package.functions.len(),
            package.dictionaries.len()
        );
        Ok(PluginExport {
            file_name,
            bytes,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BankDraft, TransactionTypeDraft};
    use crate::db_operations::DbOperations;
    use crate::mapping::MappingNode;
    use crate::registry::{DictionaryDraft, FunctionDraft};
    use crate::version_store::{ConfigDraft, ConfigScope, ConfigType, VersionStoreConfig};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn package_holds_current_configs_and_their_references() {
        let db_ops = Arc::new(DbOperations::temporary().unwrap());
        let catalog = Catalog::new(db_ops.clone());
        let functions = FunctionRegistry::new(db_ops.clone(), Duration::from_secs(1)).unwrap();
        let dictionaries = DictionaryStore::new(db_ops.clone());
        let configs = VersionStore::new(db_ops, VersionStoreConfig::default());

        let bank = catalog.save_bank(BankDraft::new("ICBC", "Industrial")).unwrap();
        catalog
            .save_transaction_type(TransactionTypeDraft::new(&bank.id, "SINGLE_PAYMENT"))
            .unwrap();
        functions
            .save(FunctionDraft::new("ROUND2", "Round", "params(x); return round(x, 2);"))
            .unwrap();
        functions.save(FunctionDraft::new("UNUSED", "Unused", "return 1;")).unwrap();
        dictionaries
            .save(DictionaryDraft::new("STATUS", "Status", &[("01", "OK")]))
            .unwrap();

        let tree: MappingNode = serde_json::from_value(json!({"type": "object", "fields": {
            "amount": {"type": "functionCall", "code": "ROUND2",
                       "args": [{"type": "sourceRef", "path": "amt"}]},
            "name": {"type": "functionCall", "code": "upperCase",
                     "args": [{"type": "sourceRef", "path": "name"}]},
            "status": {"type": "dictionaryLookup", "code": "STATUS",
                       "key": {"type": "sourceRef", "path": "code"}}
        }}))
        .unwrap();
        for _ in 0..2 {
            configs
                .save(ConfigDraft {
                    id: None,
                    scope: Some(ConfigScope::new("ICBC", "SINGLE_PAYMENT")),
                    config_type: Some(ConfigType::Request),
                    name: "pay".to_string(),
                    description: None,
                    mapping_tree: tree.clone(),
                    create_new_version: true,
                })
                .unwrap();
        }

        let export = catalog
            .export_bank_plugin(&bank.id, &configs, &functions, &dictionaries)
            .unwrap();
        assert_eq!(export.checksum, checksum(&export.bytes));
        assert_eq!(export.checksum.len(), 64);
        assert!(export.file_name.starts_with("ICBC_plugin_"));

        let package: BankPluginPackage = serde_json::from_slice(&export.bytes).unwrap();
        assert_eq!(package.transaction_types.len(), 1);
        assert_eq!(package.configs.len(), 1);
        assert_eq!(package.configs[0].version, 2);
        let codes: Vec<_> = package.functions.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["ROUND2"]);
        assert_eq!(package.dictionaries.len(), 1);
    }
}
