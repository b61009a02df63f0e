use crate::bankmap_node::config::NodeConfig;
use crate::catalog::{Catalog, HeuristicExtractor, ImportRequest, PluginExport, ProtocolExtractor, StandardProtocol};
use crate::db_operations::DbOperations;
use crate::error::{MapError, MapResult};
use crate::registry::{DictionaryStore, FunctionRegistry};
use crate::rules::{RuleDraft, RuleStore, TransformRule};
use crate::service::{TransformOptions, TransformOutcome, TransformService};
use crate::version_store::{
    ConfigDraft, ConfigScope, ConfigType, MappingConfig, VersionInfo, VersionStore,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Body of a config save. The scope comes either from a catalog
/// transaction type or from an explicit bank category and transaction name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSaveRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub transaction_type_id: Option<String>,
    #[serde(default)]
    pub bank_category: Option<String>,
    #[serde(default, alias = "transactionName")]
    pub transaction_type: Option<String>,
    #[serde(default, alias = "requestType")]
    pub config_type: Option<ConfigType>,
    #[serde(default)]
    pub create_new_version: bool,
    /// Tagged tree, the tree as a JSON string, or a legacy rule list
    #[serde(alias = "mappingTree")]
    pub mapping_config: JsonValue,
}

impl ConfigSaveRequest {
    pub fn selector(&self) -> ScopeSelector {
        ScopeSelector {
            transaction_type_id: self.transaction_type_id.clone(),
            bank_category: self.bank_category.clone(),
            transaction_type: self.transaction_type.clone(),
        }
    }
}

/// The ways a caller can name a scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeSelector {
    pub transaction_type_id: Option<String>,
    pub bank_category: Option<String>,
    pub transaction_type: Option<String>,
}

impl ScopeSelector {
    pub fn explicit(bank_category: &str, transaction_type: &str) -> Self {
        Self {
            bank_category: Some(bank_category.to_string()),
            transaction_type: Some(transaction_type.to_string()),
            ..Self::default()
        }
    }
}

/// A config row with its current flag, as listed to operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigListing {
    #[serde(flatten)]
    pub config: MappingConfig,
    pub is_current: bool,
}

/// A mapping engine node: storage, registries, the version store, the
/// catalog and the transform service wired over one sled database.
///
/// # Examples
///
/// ```rust,no_run
/// use bankmap::bankmap_node::{BankMapNode, NodeConfig};
/// use bankmap::error::MapResult;
/// use bankmap::service::TransformOptions;
/// use serde_json::json;
/// use std::path::PathBuf;
///
/// fn main() -> MapResult<()> {
///     let node = BankMapNode::new(NodeConfig::new(PathBuf::from("data")))?;
///     let tree = json!({"type": "object", "fields": {
///         "name": {"type": "sourceRef", "path": "$.user.name"}
///     }});
///     let outcome = node.transform_inline(
///         &tree,
///         &json!({"user": {"name": "Ada"}}),
///         &TransformOptions::default(),
///     )?;
///     assert_eq!(outcome.output, json!({"name": "Ada"}));
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct BankMapNode {
    config: NodeConfig,
    db_ops: Arc<DbOperations>,
    functions: Arc<FunctionRegistry>,
    dictionaries: Arc<DictionaryStore>,
    configs: Arc<VersionStore>,
    catalog: Arc<Catalog>,
    rules: Arc<RuleStore>,
    service: Arc<TransformService>,
    extractor: Arc<dyn ProtocolExtractor>,
}

impl BankMapNode {
    /// Opens the database under `config.storage_path` and wires every
    /// component.
    pub fn new(config: NodeConfig) -> MapResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.storage_path)?;
        let db_ops = DbOperations::open(&config.storage_path)?;
        info!("Opened storage at {}", config.storage_path.display());
        Self::with_db_ops(config, db_ops)
    }

    /// Wires a node over an already open database.
    pub fn with_db_ops(config: NodeConfig, db_ops: DbOperations) -> MapResult<Self> {
        let db_ops = Arc::new(db_ops);
        let functions = Arc::new(FunctionRegistry::new(
            db_ops.clone(),
            config.engine.execution.function_timeout(),
        )?);
        let dictionaries = Arc::new(DictionaryStore::new(db_ops.clone()));
        let configs = Arc::new(VersionStore::new(
            db_ops.clone(),
            config.engine.versions.clone(),
        ));
        let service = Arc::new(TransformService::new(
            functions.clone(),
            dictionaries.clone(),
            configs.clone(),
            config.engine.execution.clone(),
        ));

        Ok(Self {
            catalog: Arc::new(Catalog::new(db_ops.clone())),
            rules: Arc::new(RuleStore::new(db_ops.clone())),
            extractor: Arc::new(HeuristicExtractor),
            config,
            db_ops,
            functions,
            dictionaries,
            configs,
            service,
        })
    }

    /// Replaces the document analysis collaborator.
    pub fn with_extractor(mut self, extractor: Arc<dyn ProtocolExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn db_ops(&self) -> &DbOperations {
        &self.db_ops
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn dictionaries(&self) -> &DictionaryStore {
        &self.dictionaries
    }

    pub fn configs(&self) -> &VersionStore {
        &self.configs
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn service(&self) -> &TransformService {
        &self.service
    }

    /// `Ok(None)` when the selector names no scope at all.
    pub fn resolve_scope(&self, selector: &ScopeSelector) -> MapResult<Option<ConfigScope>> {
        if let Some(id) = selector.transaction_type_id.as_deref().filter(|id| !id.is_empty()) {
            return self.catalog.resolve_scope(id).map(Some);
        }
        match (
            selector.bank_category.as_deref(),
            selector.transaction_type.as_deref(),
        ) {
            (None, None) => Ok(None),
            (Some(bank), Some(transaction)) => Ok(Some(ConfigScope::new(bank, transaction))),
            _ => Err(MapError::Validation(
                "bankCategory and transactionType must be given together".to_string(),
            )),
        }
    }

    fn require_scope(&self, selector: &ScopeSelector) -> MapResult<ConfigScope> {
        self.resolve_scope(selector)?.ok_or_else(|| {
            MapError::Validation(
                "transactionTypeId or bankCategory and transactionType are required".to_string(),
            )
        })
    }

    // ========== MAPPING CONFIGS ==========

    /// Resolves the submitted tree, rejects references to missing or
    /// disabled functions and dictionaries, then stores the config.
    pub fn save_config(&self, request: ConfigSaveRequest) -> MapResult<MappingConfig> {
        let scope = self.resolve_scope(&request.selector())?;
        let mapping_tree = self.service.resolve_tree(&request.mapping_config)?;
        self.service.validate_references(&mapping_tree)?;
        self.configs.save(ConfigDraft {
            id: request.id,
            scope,
            config_type: request.config_type,
            name: request.name,
            description: request.description,
            mapping_tree,
            create_new_version: request.create_new_version,
        })
    }

    pub fn list_configs(&self) -> MapResult<Vec<ConfigListing>> {
        self.configs
            .list_all()?
            .into_iter()
            .map(|config| {
                let is_current = self.configs.is_current(&config)?;
                Ok(ConfigListing { config, is_current })
            })
            .collect()
    }

    pub fn current_config(
        &self,
        selector: &ScopeSelector,
        config_type: ConfigType,
    ) -> MapResult<MappingConfig> {
        let scope = self.require_scope(selector)?;
        self.configs.get_current(&scope, config_type)
    }

    pub fn config_by_version(
        &self,
        selector: &ScopeSelector,
        config_type: ConfigType,
        version: u32,
    ) -> MapResult<MappingConfig> {
        let scope = self.require_scope(selector)?;
        self.configs.get_by_version(&scope, config_type, version)
    }

    pub fn config_versions(
        &self,
        selector: &ScopeSelector,
        config_type: ConfigType,
    ) -> MapResult<Vec<VersionInfo>> {
        let scope = self.require_scope(selector)?;
        self.configs.list_versions(&scope, config_type)
    }

    pub fn rollback_config(
        &self,
        selector: &ScopeSelector,
        config_type: ConfigType,
        version: u32,
    ) -> MapResult<MappingConfig> {
        let scope = self.require_scope(selector)?;
        self.configs.rollback(&scope, config_type, version)
    }

    // ========== TRANSFORMS ==========

    pub fn transform_inline(
        &self,
        mapping_config: &JsonValue,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        let tree = self.service.resolve_tree(mapping_config)?;
        self.service.transform_inline(tree, source, options)
    }

    pub fn transform_by_scope(
        &self,
        selector: &ScopeSelector,
        config_type: ConfigType,
        version: Option<u32>,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        let scope = self.require_scope(selector)?;
        self.service
            .transform_by_scope(&scope, config_type, version, source, options)
    }

    // ========== RULES ==========

    pub fn save_rule(&self, draft: RuleDraft) -> MapResult<TransformRule> {
        self.rules.save(draft, &self.service)
    }

    pub fn transform_rule(
        &self,
        rule_id: &str,
        source: &JsonValue,
        options: &TransformOptions,
    ) -> MapResult<TransformOutcome> {
        self.rules.transform(rule_id, source, options, &self.service)
    }

    // ========== CATALOG ==========

    pub fn export_bank_plugin(&self, bank_id: &str) -> MapResult<PluginExport> {
        self.catalog
            .export_bank_plugin(bank_id, &self.configs, &self.functions, &self.dictionaries)
    }

    /// Analyzes a document with the configured extractor, bounded by the
    /// import timeout.
    pub async fn import_protocol(&self, request: ImportRequest) -> MapResult<StandardProtocol> {
        self.catalog
            .import_protocol(self.extractor.clone(), request, self.config.import.timeout())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BankDraft, TransactionTypeDraft};
    use crate::registry::FunctionDraft;
    use serde_json::json;
    use tempfile::tempdir;

    fn node() -> BankMapNode {
        BankMapNode::with_db_ops(NodeConfig::default(), DbOperations::temporary().unwrap()).unwrap()
    }

    fn save_request(bank: &str, transaction: &str, tree: JsonValue) -> ConfigSaveRequest {
        serde_json::from_value(json!({
            "name": "payment",
            "bankCategory": bank,
            "transactionName": transaction,
            "mappingConfig": tree,
        }))
        .unwrap()
    }

    #[test]
    fn opens_storage_directory() {
        let dir = tempdir().unwrap();
        let node = BankMapNode::new(NodeConfig::new(dir.path().join("db"))).unwrap();
        assert!(node.functions().list().unwrap().is_empty());
        assert!(dir.path().join("db").exists());
    }

    #[test]
    fn save_config_rejects_unknown_function() {
        let node = node();
        let tree = json!({"type": "functionCall", "code": "MISSING", "args": []});
        let err = node.save_config(save_request("B1", "PAY", tree)).unwrap_err();
        assert!(matches!(err, MapError::Validation(_)));
    }

    #[test]
    fn save_config_accepts_json_string_tree() {
        let node = node();
        node.functions()
            .save(FunctionDraft::new("ROUND2", "Round", "params(x); return round(x, 2);"))
            .unwrap();
        let tree = json!(
            r#"{"type":"object","fields":{"amt":{"type":"functionCall","code":"ROUND2","args":[{"type":"sourceRef","path":"$.a"}]}}}"#
        );
        let saved = node.save_config(save_request("B1", "PAY", tree)).unwrap();
        assert_eq!(saved.version, 1);

        let outcome = node
            .transform_by_scope(
                &ScopeSelector::explicit("B1", "PAY"),
                ConfigType::Request,
                None,
                &json!({"a": 12.345}),
                &TransformOptions::default(),
            )
            .unwrap();
        assert_eq!(outcome.output, json!({"amt": 12.35}));
    }

    #[test]
    fn transaction_type_id_resolves_scope() {
        let node = node();
        let bank = node.catalog().save_bank(BankDraft::new("ICBC", "Industrial")).unwrap();
        let tt = node
            .catalog()
            .save_transaction_type(TransactionTypeDraft::new(&bank.id, "TRANSFER"))
            .unwrap();

        let request: ConfigSaveRequest = serde_json::from_value(json!({
            "name": "transfer",
            "transactionTypeId": tt.id,
            "requestType": "RESPONSE",
            "mappingTree": {"type": "literal", "value": 1},
        }))
        .unwrap();
        let saved = node.save_config(request).unwrap();
        assert_eq!(saved.scope(), ConfigScope::new("ICBC", "TRANSFER"));
        assert_eq!(saved.config_type, ConfigType::Response);

        let listing = node.list_configs().unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing[0].is_current);
    }

    #[test]
    fn half_a_scope_is_rejected() {
        let node = node();
        let selector = ScopeSelector {
            bank_category: Some("B1".to_string()),
            ..ScopeSelector::default()
        };
        assert!(matches!(
            node.current_config(&selector, ConfigType::Request),
            Err(MapError::Validation(_))
        ));
        assert!(node.resolve_scope(&ScopeSelector::default()).unwrap().is_none());
    }
}
