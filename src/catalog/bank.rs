use super::Catalog;
use crate::error::{MapError, MapResult};
use crate::validation::{require, validate_code};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bank {
    pub id: String,
    pub name: String,
    /// Bank category used in config scopes
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl BankDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            code: code.into(),
            description: None,
            enabled: true,
        }
    }
}

impl Catalog {
    pub fn list_banks(&self) -> MapResult<Vec<Bank>> {
        let mut banks = self.db_ops.list_banks()?;
        banks.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(banks)
    }

    pub fn list_enabled_banks(&self) -> MapResult<Vec<Bank>> {
        Ok(self.list_banks()?.into_iter().filter(|b| b.enabled).collect())
    }

    pub fn get_bank(&self, id: &str) -> MapResult<Bank> {
        self.db_ops
            .get_bank(id)?
            .ok_or_else(|| MapError::NotFound(format!("Bank {} not found", id)))
    }

    pub fn find_bank_by_code(&self, code: &str) -> MapResult<Option<Bank>> {
        Ok(self.db_ops.list_banks()?.into_iter().find(|b| b.code == code))
    }

    pub fn check_bank_code_exists(&self, code: &str, exclude_id: Option<&str>) -> MapResult<bool> {
        let code = code.trim();
        Ok(self
            .db_ops
            .list_banks()?
            .iter()
            .any(|b| b.code == code && Some(b.id.as_str()) != exclude_id))
    }

    pub fn save_bank(&self, draft: BankDraft) -> MapResult<Bank> {
        let code = draft.code.trim().to_string();
        let name = draft.name.trim().to_string();
        validate_code("bank", &code)?;
        require("name", &name)?;

        let _guard = self.lock()?;
        let existing = match draft.id.as_deref() {
            Some(id) => Some(self.get_bank(id)?),
            None => None,
        };
        for bank in self.db_ops.list_banks()? {
            if Some(bank.id.as_str()) == draft.id.as_deref() {
                continue;
            }
            if bank.code == code {
                return Err(MapError::Validation(format!("Bank code '{}' already exists", code)));
            }
            if bank.name == name {
                return Err(MapError::Validation(format!("Bank name '{}' already exists", name)));
            }
        }

        let now = Utc::now();
        let bank = Bank {
            id: existing
                .as_ref()
                .map(|b| b.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name,
            code,
            description: draft.description,
            enabled: draft.enabled,
            created_at: existing.as_ref().map(|b| b.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.db_ops.store_bank(&bank)?;
        info!("Saved bank '{}' ({})", bank.code, bank.id);
        Ok(bank)
    }

    /// Removes the bank and every transaction type under it. Mapping
    /// configs keep their history.
    pub fn delete_bank(&self, id: &str) -> MapResult<()> {
        let _guard = self.lock()?;
        let bank = self.get_bank(id)?;
        let mut removed = 0;
        for transaction_type in self.db_ops.list_transaction_types()? {
            if transaction_type.bank_id == bank.id {
                self.db_ops.delete_transaction_type(&transaction_type.id)?;
                removed += 1;
            }
        }
        self.db_ops.delete_bank(id)?;
        info!(
            "Deleted bank '{}' and {} transaction types",
            bank.code, removed
        );
        Ok(())
    }
}
