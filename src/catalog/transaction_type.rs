use super::Catalog;
use crate::error::{MapError, MapResult};
use crate::validation::require;
use crate::version_store::ConfigScope;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transaction names offered when creating a transaction type.
pub const TRANSACTION_TYPE_PRESETS: &[&str] = &[
    "TODAY_BALANCE_QUERY",
    "HISTORY_BALANCE_QUERY",
    "TODAY_DETAIL_QUERY",
    "HISTORY_DETAIL_QUERY",
    "SINGLE_PAYMENT",
    "SINGLE_VERIFICATION",
    "RECEIPT_DOWNLOAD",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionType {
    pub id: String,
    pub bank_id: String,
    pub transaction_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTypeDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub bank_id: String,
    pub transaction_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl TransactionTypeDraft {
    pub fn new(bank_id: impl Into<String>, transaction_name: impl Into<String>) -> Self {
        Self {
            id: None,
            bank_id: bank_id.into(),
            transaction_name: transaction_name.into(),
            description: None,
            enabled: true,
        }
    }
}

impl Catalog {
    /// Transaction types of one bank, ordered by name.
    pub fn list_transaction_types(&self, bank_id: &str) -> MapResult<Vec<TransactionType>> {
        self.get_bank(bank_id)?;
        let mut types: Vec<_> = self
            .db_ops
            .list_transaction_types()?
            .into_iter()
            .filter(|t| t.bank_id == bank_id)
            .collect();
        types.sort_by(|a, b| a.transaction_name.cmp(&b.transaction_name));
        Ok(types)
    }

    pub fn get_transaction_type(&self, id: &str) -> MapResult<TransactionType> {
        self.db_ops
            .get_transaction_type(id)?
            .ok_or_else(|| MapError::NotFound(format!("Transaction type {} not found", id)))
    }

    pub fn save_transaction_type(&self, draft: TransactionTypeDraft) -> MapResult<TransactionType> {
        let transaction_name = draft.transaction_name.trim().to_string();
        require("transactionName", &transaction_name)?;
        require("bankId", &draft.bank_id)?;

        let _guard = self.lock()?;
        let bank = self.get_bank(&draft.bank_id)?;
        let existing = match draft.id.as_deref() {
            Some(id) => Some(self.get_transaction_type(id)?),
            None => None,
        };
        let duplicate = self.db_ops.list_transaction_types()?.into_iter().any(|t| {
            t.bank_id == bank.id
                && t.transaction_name == transaction_name
                && Some(t.id.as_str()) != draft.id.as_deref()
        });
        if duplicate {
            return Err(MapError::Validation(format!(
                "Transaction type '{}' already exists for bank '{}'",
                transaction_name, bank.code
            )));
        }

        let now = Utc::now();
        let transaction_type = TransactionType {
            id: existing
                .as_ref()
                .map(|t| t.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            bank_id: bank.id,
            transaction_name,
            description: draft.description,
            enabled: draft.enabled,
            created_at: existing.as_ref().map(|t| t.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.db_ops.store_transaction_type(&transaction_type)?;
        info!(
            "Saved transaction type '{}' for bank '{}'",
            transaction_type.transaction_name, bank.code
        );
        Ok(transaction_type)
    }

    pub fn delete_transaction_type(&self, id: &str) -> MapResult<()> {
        let _guard = self.lock()?;
        let transaction_type = self.get_transaction_type(id)?;
        self.db_ops.delete_transaction_type(id)?;
        info!("Deleted transaction type '{}'", transaction_type.transaction_name);
        Ok(())
    }

    /// Config scope named by a transaction type: `(bank code, transaction name)`.
    pub fn resolve_scope(&self, transaction_type_id: &str) -> MapResult<ConfigScope> {
        let transaction_type = self.get_transaction_type(transaction_type_id)?;
        let bank = self.get_bank(&transaction_type.bank_id)?;
        Ok(ConfigScope::new(bank.code, transaction_type.transaction_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BankDraft;
    use crate::db_operations::DbOperations;
    use std::sync::Arc;

    #[test]
    fn names_are_unique_per_bank_and_resolve_to_scopes() {
        let catalog = Catalog::new(Arc::new(DbOperations::temporary().unwrap()));
        let bank = catalog.save_bank(BankDraft::new("ICBC", "Industrial")).unwrap();
        let saved = catalog
            .save_transaction_type(TransactionTypeDraft::new(&bank.id, "SINGLE_PAYMENT"))
            .unwrap();
        assert!(matches!(
            catalog.save_transaction_type(TransactionTypeDraft::new(&bank.id, "SINGLE_PAYMENT")),
            Err(MapError::Validation(_))
        ));
        assert_eq!(
            catalog.resolve_scope(&saved.id).unwrap(),
            ConfigScope::new("ICBC", "SINGLE_PAYMENT")
        );
    }

    #[test]
    fn unknown_bank_is_not_found() {
        let catalog = Catalog::new(Arc::new(DbOperations::temporary().unwrap()));
        assert!(matches!(
            catalog.save_transaction_type(TransactionTypeDraft::new("missing", "X")),
            Err(MapError::NotFound(_))
        ));
        assert!(TRANSACTION_TYPE_PRESETS.contains(&"RECEIPT_DOWNLOAD"));
    }
}
