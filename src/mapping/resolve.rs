//! Turns stored or submitted mapping documents into a [`MappingNode`].
//!
//! Accepted shapes: a tagged tree, the same encoded as a JSON string, or a
//! legacy rule list (`{"rules": [...]}`) that is converted once here.
//!
//! Legacy dictionary rules name their dictionary by code, by stored id
//! (resolved through a [`DictionaryResolver`]) or carry an inline table.
//! Without an explicit `default` a miss yields the source value unchanged.

use super::ast::MappingNode;
use super::path::SourcePath;
use crate::error::{MapError, MapResult};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

/// Maps the dictionary ids used by legacy rule lists to dictionary codes.
pub trait DictionaryResolver {
    fn dictionary_code(&self, id: &str) -> MapResult<Option<String>>;
}

/// Resolver for callers without a dictionary store; every id is unknown.
pub struct NoDictionaries;

impl DictionaryResolver for NoDictionaries {
    fn dictionary_code(&self, _id: &str) -> MapResult<Option<String>> {
        Ok(None)
    }
}

pub fn resolve_mapping_tree(raw: &JsonValue) -> MapResult<MappingNode> {
    resolve_mapping_tree_with(raw, &NoDictionaries)
}

pub fn resolve_mapping_tree_with(
    raw: &JsonValue,
    dictionaries: &dyn DictionaryResolver,
) -> MapResult<MappingNode> {
    match raw {
        JsonValue::String(text) => {
            let parsed: JsonValue = serde_json::from_str(text).map_err(|e| {
                MapError::Validation(format!("Mapping config is not valid JSON: {}", e))
            })?;
            if parsed.is_string() {
                return Err(MapError::Validation(
                    "Mapping config must be a JSON object".to_string(),
                ));
            }
            resolve_mapping_tree_with(&parsed, dictionaries)
        }
        JsonValue::Object(map) if !map.contains_key("type") && map.contains_key("rules") => {
            let document: LegacyDocument = serde_json::from_value(raw.clone())
                .map_err(|e| MapError::Validation(format!("Invalid rule list: {}", e)))?;
            convert_legacy(document, dictionaries)
        }
        JsonValue::Object(_) => serde_json::from_value(raw.clone())
            .map_err(|e| MapError::Validation(format!("Invalid mapping tree: {}", e))),
        _ => Err(MapError::Validation(
            "Mapping config must be a JSON object".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct LegacyDocument {
    rules: Vec<LegacyRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRule {
    #[serde(default)]
    source_path: Option<String>,
    #[serde(default)]
    additional_sources: Vec<String>,
    target_path: String,
    #[serde(default)]
    transform_type: LegacyTransformType,
    #[serde(default)]
    transform_config: Map<String, JsonValue>,
    /// Inline table outside `transformConfig`
    #[serde(default)]
    dictionary: Option<JsonValue>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum LegacyTransformType {
    #[default]
    Direct,
    Function,
    Dictionary,
    Fixed,
    Ignore,
}

/// Intermediate tree used while folding dotted target paths.
enum Slot {
    Leaf(MappingNode),
    Branch(Vec<(String, Slot)>),
}

fn convert_legacy(
    document: LegacyDocument,
    dictionaries: &dyn DictionaryResolver,
) -> MapResult<MappingNode> {
    let mut root: Vec<(String, Slot)> = Vec::new();
    for rule in document.rules {
        if rule.transform_type == LegacyTransformType::Ignore {
            continue;
        }
        let target = rule.target_path.trim().trim_start_matches("$.").to_string();
        let node = legacy_node(&rule, dictionaries)?;
        insert_slot(&mut root, &target, node)?;
    }
    Ok(slots_to_node(root))
}

fn source_ref(rule: &LegacyRule) -> MapResult<MappingNode> {
    let path = rule.source_path.as_deref().ok_or_else(|| {
        MapError::Validation(format!("Rule for '{}' needs a sourcePath", rule.target_path))
    })?;
    Ok(MappingNode::SourceRef {
        path: SourcePath::parse(path)?,
    })
}

fn config_str<'a>(rule: &'a LegacyRule, key: &str) -> MapResult<&'a str> {
    rule.transform_config
        .get(key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| {
            MapError::Validation(format!(
                "Rule for '{}' needs transformConfig.{}",
                rule.target_path, key
            ))
        })
}

fn legacy_node(rule: &LegacyRule, dictionaries: &dyn DictionaryResolver) -> MapResult<MappingNode> {
    match rule.transform_type {
        LegacyTransformType::Direct => source_ref(rule),
        LegacyTransformType::Fixed => Ok(MappingNode::literal(
            rule.transform_config
                .get("fixedValue")
                .cloned()
                .unwrap_or(JsonValue::Null),
        )),
        LegacyTransformType::Function => {
            let code = config_str(rule, "function")?.to_string();
            let mut args = vec![source_ref(rule)?];
            for extra in &rule.additional_sources {
                args.push(MappingNode::SourceRef {
                    path: SourcePath::parse(extra)?,
                });
            }
            Ok(MappingNode::FunctionCall { code, args })
        }
        LegacyTransformType::Dictionary => legacy_dictionary(rule, dictionaries),
        LegacyTransformType::Ignore => Err(MapError::Validation(
            "Ignored rules produce no node".to_string(),
        )),
    }
}

fn legacy_dictionary(
    rule: &LegacyRule,
    dictionaries: &dyn DictionaryResolver,
) -> MapResult<MappingNode> {
    let config = &rule.transform_config;
    let key = source_ref(rule)?;
    let default = config.get("default").cloned();

    if let Some(table) = config.get("dictionary").or(rule.dictionary.as_ref()) {
        let JsonValue::Object(entries) = table else {
            return Err(MapError::Validation(format!(
                "Rule for '{}' needs an object as its dictionary",
                rule.target_path
            )));
        };
        let fallback = default.map(MappingNode::literal).unwrap_or_else(|| key.clone());
        return Ok(MappingNode::FunctionCall {
            code: "lookup".to_string(),
            args: vec![MappingNode::literal(JsonValue::Object(entries.clone())), key, fallback],
        });
    }

    let code = match (config.get("dictionaryCode"), config.get("dictionaryId")) {
        (Some(_), _) => config_str(rule, "dictionaryCode")?.to_string(),
        (None, Some(id)) => {
            let id = match id {
                JsonValue::String(id) => id.clone(),
                JsonValue::Number(id) => id.to_string(),
                _ => {
                    return Err(MapError::Validation(format!(
                        "Rule for '{}' has an invalid dictionaryId",
                        rule.target_path
                    )))
                }
            };
            dictionaries.dictionary_code(&id)?.ok_or_else(|| {
                MapError::Validation(format!(
                    "Rule for '{}' references unknown dictionary id {}",
                    rule.target_path, id
                ))
            })?
        }
        (None, None) => {
            return Err(MapError::Validation(format!(
                "Rule for '{}' needs transformConfig.dictionaryId, dictionaryCode or dictionary",
                rule.target_path
            )))
        }
    };
    let reverse = config
        .get("dictionaryDirection")
        .or_else(|| config.get("reverse"))
        .and_then(JsonValue::as_bool)
        .unwrap_or(false);

    let lookup = |default| MappingNode::DictionaryLookup {
        code: code.clone(),
        key: Box::new(key.clone()),
        default,
        reverse,
    };
    Ok(match default {
        Some(default) => lookup(Some(default)),
        None => MappingNode::FunctionCall {
            code: "coalesce".to_string(),
            args: vec![lookup(Some(JsonValue::Null)), key.clone()],
        },
    })
}

fn insert_slot(slots: &mut Vec<(String, Slot)>, target: &str, node: MappingNode) -> MapResult<()> {
    let (head, rest) = match target.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (target, None),
    };
    if head.is_empty() {
        return Err(MapError::Validation(format!(
            "Invalid target path '{}'",
            target
        )));
    }

    let position = slots.iter().position(|(key, _)| key == head);
    match (rest, position) {
        (None, None) => {
            slots.push((head.to_string(), Slot::Leaf(node)));
            Ok(())
        }
        (Some(rest), None) => {
            let mut children = Vec::new();
            insert_slot(&mut children, rest, node)?;
            slots.push((head.to_string(), Slot::Branch(children)));
            Ok(())
        }
        (Some(rest), Some(i)) => match &mut slots[i].1 {
            Slot::Branch(children) => insert_slot(children, rest, node),
            Slot::Leaf(_) => Err(MapError::Validation(format!(
                "Target '{}' is both a value and an object",
                head
            ))),
        },
        (None, Some(_)) => Err(MapError::Validation(format!(
            "Target '{}' is mapped more than once",
            head
        ))),
    }
}

fn slots_to_node(slots: Vec<(String, Slot)>) -> MappingNode {
    MappingNode::Object {
        fields: slots
            .into_iter()
            .map(|(key, slot)| {
                let node = match slot {
                    Slot::Leaf(node) => node,
                    Slot::Branch(children) => slots_to_node(children),
                };
                (key, node)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_tagged_tree_as_string() {
        let raw = json!(r#"{"type":"literal","value":5}"#);
        assert_eq!(resolve_mapping_tree(&raw).unwrap(), MappingNode::literal(json!(5)));
    }

    #[test]
    fn converts_legacy_rules_into_nested_objects() {
        let raw = json!({
            "rules": [
                {"sourcePath": "$.user.name", "targetPath": "customer.name"},
                {"sourcePath": "$.amt", "targetPath": "customer.amount",
                 "transformType": "FUNCTION", "transformConfig": {"function": "ROUND2"}},
                {"targetPath": "channel", "transformType": "FIXED",
                 "transformConfig": {"fixedValue": "WEB"}},
                {"sourcePath": "$.code", "targetPath": "status", "transformType": "DICTIONARY",
                 "transformConfig": {"dictionaryCode": "STATUS", "default": "UNKNOWN"}},
                {"sourcePath": "$.skip", "targetPath": "skipped", "transformType": "IGNORE"}
            ]
        });

        let tree = resolve_mapping_tree(&raw).unwrap();
        let rendered = serde_json::to_value(&tree).unwrap();
        let top: Vec<_> = rendered["fields"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(top, vec!["customer", "channel", "status"]);
        assert_eq!(rendered["fields"]["customer"]["fields"]["amount"]["code"], "ROUND2");
        assert_eq!(rendered["fields"]["status"]["default"], "UNKNOWN");
        assert_eq!(tree.referenced_functions().len(), 1);
    }

    struct Ids;

    impl DictionaryResolver for Ids {
        fn dictionary_code(&self, id: &str) -> MapResult<Option<String>> {
            Ok((id == "7").then(|| "STATUS".to_string()))
        }
    }

    #[test]
    fn legacy_dictionary_ids_resolve_to_codes() {
        let raw = json!({"rules": [
            {"sourcePath": "$.code", "targetPath": "status", "transformType": "DICTIONARY",
             "transformConfig": {"dictionaryId": 7, "dictionaryDirection": true}}
        ]});
        let tree = resolve_mapping_tree_with(&raw, &Ids).unwrap();
        let MappingNode::Object { fields } = &tree else { panic!("expected object") };
        let MappingNode::FunctionCall { code, args } = &fields[0].1 else {
            panic!("expected coalesce fallback")
        };
        assert_eq!(code, "coalesce");
        assert!(matches!(
            &args[0],
            MappingNode::DictionaryLookup { code, reverse: true, .. } if code == "STATUS"
        ));
        assert_eq!(tree.referenced_dictionaries().into_iter().collect::<Vec<_>>(), vec!["STATUS"]);

        let unknown = json!({"rules": [
            {"sourcePath": "$.code", "targetPath": "status", "transformType": "DICTIONARY",
             "transformConfig": {"dictionaryId": 8, "dictionaryDirection": false}}
        ]});
        assert!(matches!(
            resolve_mapping_tree_with(&unknown, &Ids),
            Err(MapError::Validation(_))
        ));
        assert!(resolve_mapping_tree(&raw).is_err());
    }

    #[test]
    fn inline_legacy_dictionaries_become_table_lookups() {
        for rule in [
            json!({"sourcePath": "$.code", "targetPath": "status", "transformType": "DICTIONARY",
                   "transformConfig": {"dictionary": {"01": "OK"}}}),
            json!({"sourcePath": "$.code", "targetPath": "status", "transformType": "DICTIONARY",
                   "dictionary": {"01": "OK"}}),
        ] {
            let tree = resolve_mapping_tree(&json!({"rules": [rule]})).unwrap();
            let rendered = serde_json::to_value(&tree).unwrap();
            let status = &rendered["fields"]["status"];
            assert_eq!(status["code"], "lookup");
            assert_eq!(status["args"][0]["value"], json!({"01": "OK"}));
            assert_eq!(status["args"][2]["path"], status["args"][1]["path"]);
            assert!(tree.referenced_dictionaries().is_empty());
        }

        let not_a_table = json!({"rules": [
            {"sourcePath": "$.code", "targetPath": "status", "transformType": "DICTIONARY",
             "transformConfig": {"dictionary": ["01"]}}
        ]});
        assert!(resolve_mapping_tree(&not_a_table).is_err());
    }

    #[test]
    fn rejects_conflicting_targets() {
        let raw = json!({"rules": [
            {"sourcePath": "a", "targetPath": "x"},
            {"sourcePath": "b", "targetPath": "x.y"}
        ]});
        assert!(matches!(resolve_mapping_tree(&raw), Err(MapError::Validation(_))));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(resolve_mapping_tree(&json!([1, 2])).is_err());
        assert!(resolve_mapping_tree(&json!("not json")).is_err());
    }
}
