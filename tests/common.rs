//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use bankmap::bankmap_node::{BankMapNode, ConfigSaveRequest, EngineConfig, NodeConfig};
use bankmap::registry::{DictionaryDraft, FunctionDraft};
use bankmap::MappingConfig;
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;

/// A node over a sled database in a temporary directory.
pub struct TestNode {
    pub node: BankMapNode,
    pub _temp_dir: TempDir,
}

pub fn test_node() -> TestNode {
    test_node_with(EngineConfig::default())
}

pub fn test_node_with(engine: EngineConfig) -> TestNode {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let config = NodeConfig::new(temp_dir.path().join("db")).with_engine(engine);
    let node = BankMapNode::new(config).expect("node");
    TestNode {
        node,
        _temp_dir: temp_dir,
    }
}

/// Registers `ROUND2` and the `STATUS` dictionary used by most scenarios.
pub fn seed_payment_refs(node: &BankMapNode) {
    node.functions()
        .save(FunctionDraft::new(
            "ROUND2",
            "Round to cents",
            "params(x); return round(x, 2);",
        ))
        .expect("save ROUND2");
    node.dictionaries()
        .save(DictionaryDraft::new(
            "STATUS",
            "Status codes",
            &[("01", "SUCCESS"), ("02", "FAILED")],
        ))
        .expect("save STATUS");
}

pub fn payment_tree() -> JsonValue {
    json!({"type": "object", "fields": {
        "amount": {"type": "functionCall", "code": "ROUND2",
                   "args": [{"type": "sourceRef", "path": "raw.amt"}]},
        "status": {"type": "dictionaryLookup", "code": "STATUS",
                   "key": {"type": "sourceRef", "path": "raw.code"}, "default": "UNKNOWN"}
    }})
}

pub fn save_request(bank: &str, transaction: &str, name: &str, tree: JsonValue) -> ConfigSaveRequest {
    serde_json::from_value(json!({
        "name": name,
        "bankCategory": bank,
        "transactionType": transaction,
        "mappingConfig": tree,
    }))
    .expect("valid save request")
}

pub fn save_config(node: &BankMapNode, bank: &str, transaction: &str, tree: JsonValue) -> MappingConfig {
    node.save_config(save_request(bank, transaction, "payment", tree))
        .expect("save config")
}
