//! Typed mapping tree.
//!
//! A mapping configuration owns exactly one root [`MappingNode`]. Functions
//! and dictionaries are referenced by code and resolved at evaluation time.

use super::path::SourcePath;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MappingNode {
    /// Constant value
    Literal { value: JsonValue },

    /// Value read from the source document (or the current `forEach` item)
    SourceRef { path: SourcePath },

    /// Call to a custom or system function; args are evaluated left to right
    FunctionCall {
        code: String,
        #[serde(default)]
        args: Vec<MappingNode>,
    },

    /// Translation through a dictionary
    DictionaryLookup {
        code: String,
        key: Box<MappingNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<JsonValue>,
        /// Look up by value and return the key
        #[serde(default, skip_serializing_if = "is_false")]
        reverse: bool,
    },

    /// Output object; field order is preserved
    Object {
        #[serde(with = "ordered_fields")]
        fields: Vec<(String, MappingNode)>,
    },

    Array { items: Vec<MappingNode> },

    /// One `template` output per element of the sequence at `source`
    ForEach {
        source: SourcePath,
        template: Box<MappingNode>,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl MappingNode {
    pub fn literal(value: JsonValue) -> Self {
        MappingNode::Literal { value }
    }

    pub fn object(fields: Vec<(&str, MappingNode)>) -> Self {
        MappingNode::Object {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Visits this node and all descendants, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a MappingNode)) {
        visit(self);
        match self {
            MappingNode::Literal { .. } | MappingNode::SourceRef { .. } => {}
            MappingNode::FunctionCall { args, .. } => args.iter().for_each(|a| a.walk(visit)),
            MappingNode::DictionaryLookup { key, .. } => key.walk(visit),
            MappingNode::Object { fields } => fields.iter().for_each(|(_, v)| v.walk(visit)),
            MappingNode::Array { items } => items.iter().for_each(|i| i.walk(visit)),
            MappingNode::ForEach { template, .. } => template.walk(visit),
        }
    }

    /// Function codes referenced anywhere in the tree.
    pub fn referenced_functions(&self) -> BTreeSet<String> {
        let mut codes = BTreeSet::new();
        self.walk(&mut |node| {
            if let MappingNode::FunctionCall { code, .. } = node {
                codes.insert(code.clone());
            }
        });
        codes
    }

    /// Dictionary codes referenced anywhere in the tree.
    pub fn referenced_dictionaries(&self) -> BTreeSet<String> {
        let mut codes = BTreeSet::new();
        self.walk(&mut |node| {
            if let MappingNode::DictionaryLookup { code, .. } = node {
                codes.insert(code.clone());
            }
        });
        codes
    }
}

/// (De)serializes `Vec<(String, MappingNode)>` as a JSON object in
/// declaration order.
mod ordered_fields {
    use super::MappingNode;
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(fields: &[(String, MappingNode)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(fields.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, MappingNode)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Vec<(String, MappingNode)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of target keys to mapping nodes")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields: Vec<(String, MappingNode)> = Vec::new();
                while let Some((key, node)) = map.next_entry::<String, MappingNode>()? {
                    if fields.iter().any(|(existing, _)| *existing == key) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate target key '{}'",
                            key
                        )));
                    }
                    fields.push((key, node));
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}
