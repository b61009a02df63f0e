//! Unversioned transform rules, the older single-table way of storing a
//! mapping. Rules run through the same evaluator as mapping configs.

use crate::db_operations::DbOperations;
use crate::error::{MapError, MapResult};
use crate::mapping::MappingNode;
use crate::service::{TransformOptions, TransformOutcome, TransformService};
use crate::validation::require;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `JSON` or `XML`; informational
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub target_type: Option<String>,
    pub enabled: bool,
    pub mapping_tree: MappingNode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Save request. `mappingTree` accepts every shape
/// [`TransformService::resolve_tree`] does, including a legacy rule list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(alias = "fieldMappings")]
    pub mapping_tree: JsonValue,
}

fn enabled_by_default() -> bool {
    true
}

pub struct RuleStore {
    db_ops: Arc<DbOperations>,
}

impl RuleStore {
    pub fn new(db_ops: Arc<DbOperations>) -> Self {
        Self { db_ops }
    }

    pub fn list(&self) -> MapResult<Vec<TransformRule>> {
        let mut rules = self.db_ops.list_rules()?;
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rules)
    }

    pub fn get(&self, id: &str) -> MapResult<TransformRule> {
        self.db_ops
            .get_rule(id)?
            .ok_or_else(|| MapError::NotFound(format!("Rule {} not found", id)))
    }

    /// Resolves the tree, checks its references and stores the rule.
    pub fn save(&self, draft: RuleDraft, service: &TransformService) -> MapResult<TransformRule> {
        require("name", &draft.name)?;
        let mapping_tree = service.resolve_tree(&draft.mapping_tree)?;
        service.validate_references(&mapping_tree)?;

        let existing = match draft.id.as_deref() {
            Some(id) => self.db_ops.get_rule(id)?,
            None => None,
        };
        let now = Utc::now();
        let rule = TransformRule {
            id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: draft.name.trim().to_string(),
            description: draft.description,
            source_type: draft.source_type,
            target_type: draft.target_type,
            enabled: draft.enabled,
            mapping_tree,
            created_at: existing.as_ref().map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.db_ops.store_rule(&rule)?;
        info!("Saved rule '{}' ({})", rule.name, rule.id);
        Ok(rule)
    }

    pub fn delete(&self, id: &str) -> MapResult<()> {
        if !self.db_ops.delete_rule(id)? {
            return Err(MapError::NotFound(format!("Rule {} not found", id)));
        }
        info!("Deleted rule {}", id);
        Ok(())
    }

    pub fn transform(
        &self,
        id: &str,
        source: &JsonValue,
        options: &TransformOptions,
        service: &TransformService,
    ) -> MapResult<TransformOutcome> {
        let rule = self.get(id)?;
        if !rule.enabled {
            return Err(MapError::Validation(format!("Rule '{}' is disabled", rule.name)));
        }
        service.transform_inline(rule.mapping_tree, source, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DictionaryStore, FunctionRegistry};
    use crate::transform_execution::ExecutionConfig;
    use crate::version_store::{VersionStore, VersionStoreConfig};
    use serde_json::json;
    use std::time::Duration;

    fn setup() -> (RuleStore, TransformService) {
        let db_ops = Arc::new(DbOperations::temporary().unwrap());
        let service = TransformService::new(
            Arc::new(FunctionRegistry::new(db_ops.clone(), Duration::from_secs(1)).unwrap()),
            Arc::new(DictionaryStore::new(db_ops.clone())),
            Arc::new(VersionStore::new(db_ops.clone(), VersionStoreConfig::default())),
            ExecutionConfig::default(),
        );
        (RuleStore::new(db_ops), service)
    }

    fn draft(tree: JsonValue) -> RuleDraft {
        serde_json::from_value(json!({"name": "legacy", "mappingTree": tree})).unwrap()
    }

    #[test]
    fn legacy_rule_lists_transform_like_trees() {
        let (rules, service) = setup();
        let rule = rules
            .save(
                draft(json!({"rules": [
                    {"sourcePath": "$.user.name", "targetPath": "customer.name",
                     "transformType": "FUNCTION", "transformConfig": {"function": "upperCase"}},
                    {"targetPath": "channel", "transformType": "FIXED",
                     "transformConfig": {"fixedValue": "WEB"}}
                ]})),
                &service,
            )
            .unwrap();

        let outcome = rules
            .transform(
                &rule.id,
                &json!(r#"{"user": {"name": "ann"}}"#),
                &TransformOptions::default(),
                &service,
            )
            .unwrap();
        assert_eq!(outcome.output, json!({"customer": {"name": "ANN"}, "channel": "WEB"}));
    }

    #[test]
    fn disabled_rules_do_not_run() {
        let (rules, service) = setup();
        let mut rule_draft = draft(json!({"type": "literal", "value": 1}));
        rule_draft.enabled = false;
        let rule = rules.save(rule_draft, &service).unwrap();
        assert!(matches!(
            rules.transform(&rule.id, &json!({}), &TransformOptions::default(), &service),
            Err(MapError::Validation(_))
        ));
    }

    #[test]
    fn unknown_references_and_ids_are_rejected() {
        let (rules, service) = setup();
        let bad = draft(json!({"type": "functionCall", "code": "NOPE"}));
        assert!(matches!(rules.save(bad, &service), Err(MapError::Validation(_))));
        assert!(matches!(rules.delete("missing"), Err(MapError::NotFound(_))));
    }
}
