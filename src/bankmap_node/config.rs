use crate::error::{MapError, MapResult};
use crate::transform_execution::ExecutionConfig;
use crate::version_store::VersionStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const IMPORT_TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 60..=600;

/// Evaluation and version store settings. Serialized flat, e.g.
/// `{"function_timeout_ms": 500, "delete_policy": "reject"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub execution: ExecutionConfig,
    #[serde(flatten)]
    pub versions: VersionStoreConfig,
}

/// Document import settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Budget for one document analysis, independent of function timeouts
    #[serde(default = "default_import_timeout")]
    pub timeout_seconds: u64,
}

fn default_import_timeout() -> u64 {
    120
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_import_timeout(),
        }
    }
}

impl ImportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Configuration for a BankMapNode instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory of the sled database
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_bind_address() -> String {
    "127.0.0.1:9001".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            bind_address: default_bind_address(),
            engine: EngineConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Create a new node configuration with the specified storage path
    pub fn new(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            ..Default::default()
        }
    }

    pub fn with_bind_address(mut self, address: &str) -> Self {
        self.bind_address = address.to_string();
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the port of `bind_address`, keeping its host.
    pub fn with_port(mut self, port: u16) -> Self {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("127.0.0.1");
        self.bind_address = format!("{}:{}", host, port);
        self
    }

    pub fn validate(&self) -> MapResult<()> {
        if self.engine.execution.function_timeout_ms == 0 {
            return Err(MapError::Config(
                "engine.function_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.engine.versions.version_retry_limit == 0 {
            return Err(MapError::Config(
                "engine.version_retry_limit must be at least 1".to_string(),
            ));
        }
        if !IMPORT_TIMEOUT_RANGE.contains(&self.import.timeout_seconds) {
            return Err(MapError::Config(format!(
                "import.timeout_seconds must be between {} and {}, got {}",
                IMPORT_TIMEOUT_RANGE.start(),
                IMPORT_TIMEOUT_RANGE.end(),
                self.import.timeout_seconds
            )));
        }
        Ok(())
    }
}

fn parse_config(path: &Path, text: &str) -> MapResult<NodeConfig> {
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        toml::from_str(text).map_err(|e| MapError::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    } else {
        serde_json::from_str(text)
            .map_err(|e| MapError::Config(format!("Invalid JSON in {}: {}", path.display(), e)))
    }
}

/// Load a node configuration from the given path or from the `NODE_CONFIG`
/// environment variable.
///
/// A missing file yields the defaults. `IMPORT_TIMEOUT_SECONDS` overrides
/// the import timeout and `port` the bind port. The result is validated.
pub fn load_node_config(path: Option<&str>, port: Option<u16>) -> MapResult<NodeConfig> {
    let config_path = path
        .map(|p| p.to_string())
        .or_else(|| std::env::var("NODE_CONFIG").ok())
        .unwrap_or_else(|| "config/node_config.json".to_string());
    let config_path = PathBuf::from(config_path);

    let mut config = match std::fs::read_to_string(&config_path) {
        Ok(text) => parse_config(&config_path, &text)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!(
                "No configuration at {}, using defaults",
                config_path.display()
            );
            NodeConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    if let Ok(value) = std::env::var("IMPORT_TIMEOUT_SECONDS") {
        config.import.timeout_seconds = value.trim().parse().map_err(|e| {
            MapError::Config(format!("IMPORT_TIMEOUT_SECONDS '{}' is not a number: {}", value, e))
        })?;
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform_execution::FailurePolicy;
    use crate::version_store::DeletePolicy;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn engine_settings_are_flat() {
        let config: NodeConfig = serde_json::from_str(
            r#"{"engine": {"function_timeout_ms": 250, "failure_policy": "lenient",
                           "delete_policy": "reject", "version_retry_limit": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.engine.execution.function_timeout_ms, 250);
        assert_eq!(config.engine.execution.failure_policy, FailurePolicy::Lenient);
        assert_eq!(config.engine.versions.delete_policy, DeletePolicy::Reject);
        assert_eq!(config.engine.versions.version_retry_limit, 3);
        assert_eq!(config.bind_address, "127.0.0.1:9001");
    }

    #[test]
    fn loads_toml_and_applies_port() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(
            &path,
            "storage_path = \"/tmp/bankmap\"\nbind_address = \"0.0.0.0:8000\"\n[import]\ntimeout_seconds = 90\n",
        )
        .unwrap();

        let config = load_node_config(path.to_str(), Some(9100)).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/tmp/bankmap"));
        assert_eq!(config.bind_address, "0.0.0.0:9100");
        assert_eq!(config.import.timeout(), Duration::from_secs(90));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = load_node_config(path.to_str(), None).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("data"));
    }

    #[test]
    fn validate_rejects_out_of_range_import_timeout() {
        let mut config = NodeConfig::default();
        config.import.timeout_seconds = 30;
        assert!(matches!(config.validate(), Err(MapError::Config(_))));
        config.import.timeout_seconds = 600;
        assert!(config.validate().is_ok());
        config.engine.execution.function_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
