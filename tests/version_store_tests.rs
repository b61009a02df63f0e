mod common;

use bankmap::bankmap_node::{EngineConfig, ScopeSelector};
use bankmap::version_store::{DeletePolicy, VersionStoreConfig};
use bankmap::{ConfigType, MapError};
use common::{save_config, test_node, test_node_with};
use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn literal(value: &str) -> serde_json::Value {
    json!({"type": "literal", "value": value})
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_get_distinct_versions() {
    let fixture = test_node();
    let node = Arc::new(fixture.node.clone());

    let saves = (0..16).map(|i| {
        let node = node.clone();
        tokio::task::spawn_blocking(move || {
            save_config(&node, "B1", "PAY", literal(&format!("v{}", i))).version
        })
    });
    let versions: HashSet<u32> = join_all(saves)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();
    assert_eq!(versions, (1..=16).collect::<HashSet<u32>>());

    let scope = ScopeSelector::explicit("B1", "PAY");
    let listed = node.config_versions(&scope, ConfigType::Request).unwrap();
    assert_eq!(listed.len(), 16);
    assert_eq!(listed.iter().filter(|v| v.is_current).count(), 1);
    let current = node.current_config(&scope, ConfigType::Request).unwrap();
    assert_eq!(current.version, 16);
}

#[test]
fn scopes_and_config_types_are_independent() {
    let fixture = test_node();
    let node = &fixture.node;
    save_config(node, "B1", "PAY", literal("a"));
    save_config(node, "B1", "PAY", literal("b"));
    save_config(node, "B2", "PAY", literal("c"));

    let response: bankmap::bankmap_node::ConfigSaveRequest = serde_json::from_value(json!({
        "name": "payment-response",
        "bankCategory": "B1",
        "transactionType": "PAY",
        "configType": "RESPONSE",
        "mappingConfig": literal("r"),
    }))
    .unwrap();
    let saved = node.save_config(response).unwrap();
    assert_eq!(saved.version, 1);

    let b2 = node
        .current_config(&ScopeSelector::explicit("B2", "PAY"), ConfigType::Request)
        .unwrap();
    assert_eq!(b2.version, 1);
    assert_eq!(node.list_configs().unwrap().len(), 4);
}

#[test]
fn deleting_the_current_version_reassigns_and_never_reuses_numbers() {
    let fixture = test_node();
    let node = &fixture.node;
    save_config(node, "B1", "PAY", literal("v1"));
    save_config(node, "B1", "PAY", literal("v2"));
    let v3 = save_config(node, "B1", "PAY", literal("v3"));

    node.configs().delete(&v3.id).unwrap();
    let scope = ScopeSelector::explicit("B1", "PAY");
    assert_eq!(node.current_config(&scope, ConfigType::Request).unwrap().version, 2);

    let v4 = save_config(node, "B1", "PAY", literal("v4"));
    assert_eq!(v4.version, 4);
    assert!(matches!(
        node.config_by_version(&scope, ConfigType::Request, 3),
        Err(MapError::NotFound(_))
    ));
}

#[test]
fn reject_policy_protects_the_current_version() {
    let engine = EngineConfig {
        versions: VersionStoreConfig {
            delete_policy: DeletePolicy::Reject,
            ..VersionStoreConfig::default()
        },
        ..EngineConfig::default()
    };
    let fixture = test_node_with(engine);
    let node = &fixture.node;
    let v1 = save_config(node, "B1", "PAY", literal("v1"));
    let v2 = save_config(node, "B1", "PAY", literal("v2"));

    assert!(matches!(node.configs().delete(&v2.id), Err(MapError::Conflict(_))));
    node.configs().delete(&v1.id).unwrap();
    node.configs().delete(&v2.id).unwrap();
    assert!(node.list_configs().unwrap().is_empty());
}
