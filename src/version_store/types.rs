use crate::mapping::MappingNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the message a config maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfigType {
    #[default]
    Request,
    Response,
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigType::Request => f.write_str("REQUEST"),
            ConfigType::Response => f.write_str("RESPONSE"),
        }
    }
}

/// `(bank category, transaction type)` half of a scope key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigScope {
    pub bank_category: String,
    pub transaction_type: String,
}

impl ConfigScope {
    pub fn new(bank_category: impl Into<String>, transaction_type: impl Into<String>) -> Self {
        Self {
            bank_category: bank_category.into(),
            transaction_type: transaction_type.into(),
        }
    }

    /// Storage key for this scope and config type. Components are JSON
    /// encoded so no separator inside a name can collide.
    pub fn key(&self, config_type: ConfigType) -> String {
        serde_json::to_string(&(&self.bank_category, &self.transaction_type, config_type))
            .unwrap_or_else(|_| format!("{}|{}|{}", self.bank_category, self.transaction_type, config_type))
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bank_category, self.transaction_type)
    }
}

/// One stored version of a mapping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    pub id: String,
    pub bank_category: String,
    pub transaction_type: String,
    pub config_type: ConfigType,
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
    pub mapping_tree: MappingNode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MappingConfig {
    pub fn scope(&self) -> ConfigScope {
        ConfigScope::new(&self.bank_category, &self.transaction_type)
    }

    pub fn scope_key(&self) -> String {
        self.scope().key(self.config_type)
    }
}

/// Pointer record kept per scope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeHead {
    /// Version designated current, if any
    pub current_version: Option<u32>,
    /// Next version number to hand out; never decreases
    pub next_version: u32,
}

impl Default for ScopeHead {
    fn default() -> Self {
        Self {
            current_version: None,
            next_version: 1,
        }
    }
}

/// Listing entry for [`super::VersionStore::list_versions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub id: String,
    pub version: u32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub enabled: bool,
    pub is_current: bool,
}

/// Input for [`super::VersionStore::save`].
#[derive(Debug, Clone)]
pub struct ConfigDraft {
    /// Row to update in place; ignored when `create_new_version` is set
    pub id: Option<String>,
    /// Defaults to the scope of the row named by `id`
    pub scope: Option<ConfigScope>,
    /// Defaults to the row named by `id`, else `REQUEST`
    pub config_type: Option<ConfigType>,
    pub name: String,
    pub description: Option<String>,
    pub mapping_tree: MappingNode,
    pub create_new_version: bool,
}

/// What happens when the current version is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Current moves to the highest remaining version (or is cleared)
    #[default]
    ReassignHighest,
    /// Deleting the current version fails while other versions remain
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_keys_do_not_collide_on_separators() {
        let a = ConfigScope::new("A|B", "C").key(ConfigType::Request);
        let b = ConfigScope::new("A", "B|C").key(ConfigType::Request);
        assert_ne!(a, b);
        assert_ne!(
            ConfigScope::new("A", "B").key(ConfigType::Request),
            ConfigScope::new("A", "B").key(ConfigType::Response)
        );
    }

    #[test]
    fn config_type_uses_uppercase_names() {
        assert_eq!(serde_json::to_string(&ConfigType::Response).unwrap(), "\"RESPONSE\"");
        let parsed: DeletePolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(parsed, DeletePolicy::Reject);
    }
}
