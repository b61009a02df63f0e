use super::Catalog;
use crate::error::{MapError, MapResult};
use crate::validation::{require, validate_code};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical message format a bank message is mapped to or from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardProtocol {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `JSON` or `XML`
    pub protocol_type: String,
    /// Sample document in `protocol_type` format
    pub data_format: String,
    #[serde(default)]
    pub category: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub protocol_type: String,
    #[serde(default)]
    pub data_format: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Catalog {
    pub fn list_protocols(&self) -> MapResult<Vec<StandardProtocol>> {
        let mut protocols = self.db_ops.list_protocols()?;
        protocols.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(protocols)
    }

    /// Enabled protocols of one type (case-insensitive).
    pub fn list_protocols_by_type(&self, protocol_type: &str) -> MapResult<Vec<StandardProtocol>> {
        Ok(self
            .list_protocols()?
            .into_iter()
            .filter(|p| p.enabled && p.protocol_type.eq_ignore_ascii_case(protocol_type))
            .collect())
    }

    pub fn get_protocol(&self, id: &str) -> MapResult<StandardProtocol> {
        self.db_ops
            .get_protocol(id)?
            .ok_or_else(|| MapError::NotFound(format!("Standard protocol {} not found", id)))
    }

    pub fn save_protocol(&self, draft: ProtocolDraft) -> MapResult<StandardProtocol> {
        let code = draft.code.trim().to_string();
        validate_code("protocol", &code)?;
        require("name", &draft.name)?;
        let protocol_type = draft.protocol_type.trim().to_ascii_uppercase();
        if protocol_type != "JSON" && protocol_type != "XML" {
            return Err(MapError::Validation(format!(
                "Protocol type must be JSON or XML, got '{}'",
                draft.protocol_type
            )));
        }

        let _guard = self.lock()?;
        let existing = match draft.id.as_deref() {
            Some(id) => Some(self.get_protocol(id)?),
            None => None,
        };
        let duplicate = self
            .db_ops
            .list_protocols()?
            .iter()
            .any(|p| p.code == code && Some(p.id.as_str()) != draft.id.as_deref());
        if duplicate {
            return Err(MapError::Validation(format!(
                "Protocol code '{}' already exists",
                code
            )));
        }

        let now = Utc::now();
        let protocol = StandardProtocol {
            id: existing
                .as_ref()
                .map(|p| p.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: draft.name.trim().to_string(),
            code,
            description: draft.description,
            protocol_type,
            data_format: draft.data_format,
            category: draft.category,
            enabled: draft.enabled,
            created_at: existing.as_ref().map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.db_ops.store_protocol(&protocol)?;
        info!("Saved standard protocol '{}'", protocol.code);
        Ok(protocol)
    }

    pub fn toggle_protocol(&self, id: &str) -> MapResult<StandardProtocol> {
        let _guard = self.lock()?;
        let mut protocol = self.get_protocol(id)?;
        protocol.enabled = !protocol.enabled;
        protocol.updated_at = Utc::now();
        self.db_ops.store_protocol(&protocol)?;
        Ok(protocol)
    }

    pub fn delete_protocol(&self, id: &str) -> MapResult<()> {
        let _guard = self.lock()?;
        let protocol = self.get_protocol(id)?;
        self.db_ops.delete_protocol(id)?;
        info!("Deleted standard protocol '{}'", protocol.code);
        Ok(())
    }
}
