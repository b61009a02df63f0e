//! Standard protocol import from a free-form document.
//!
//! Extraction is delegated to a [`ProtocolExtractor`], which may be slow
//! (a remote analysis service, for instance). It runs as its own task with
//! its own timeout and never shares the transform path's budgets. The
//! protocol table is written only after a complete, valid candidate exists.

use super::{Catalog, ProtocolDraft, StandardProtocol};
use crate::error::{MapError, MapResult};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    pub document_content: String,
}

/// Protocol definition proposed by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolCandidate {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub protocol_type: String,
    pub data_format: String,
    pub category: Option<String>,
}

#[async_trait]
pub trait ProtocolExtractor: Send + Sync {
    async fn extract(&self, request: &ImportRequest) -> MapResult<ProtocolCandidate>;
}

/// Local extractor: finds the first JSON or XML message in the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

#[async_trait]
impl ProtocolExtractor for HeuristicExtractor {
    async fn extract(&self, request: &ImportRequest) -> MapResult<ProtocolCandidate> {
        let content = request.document_content.trim();
        if content.is_empty() {
            return Err(MapError::Import("Document is empty".to_string()));
        }

        let (protocol_type, data_format) = if let Some(json) = embedded_json(content) {
            ("JSON", json)
        } else if let Some(xml) = embedded_xml(content) {
            ("XML", xml)
        } else {
            return Err(MapError::Import(
                "No JSON or XML message structure found in document".to_string(),
            ));
        };

        let stem = request
            .file_name
            .as_deref()
            .map(file_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or("imported_protocol");
        Ok(ProtocolCandidate {
            name: stem.replace(['_', '-'], " "),
            code: identifier(stem),
            description: request
                .file_name
                .as_ref()
                .map(|name| format!("Imported from {}", name)),
            protocol_type: protocol_type.to_string(),
            data_format,
            category: None,
        })
    }
}

fn file_stem(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    }
}

/// Upper-case identifier usable as a protocol code.
fn identifier(text: &str) -> String {
    let mut code: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    if code.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        code.insert(0, '_');
    }
    code
}

/// First parseable JSON object or array in `content`, pretty printed.
fn embedded_json(content: &str) -> Option<String> {
    for (start, open) in content.char_indices().filter(|(_, c)| *c == '{' || *c == '[') {
        let close = if open == '{' { '}' } else { ']' };
        let Some(end) = content.rfind(close) else { continue };
        if end <= start {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content[start..=end]) {
            if value.is_object() || value.is_array() {
                return serde_json::to_string_pretty(&value).ok();
            }
        }
    }
    None
}

fn embedded_xml(content: &str) -> Option<String> {
    let start = content.find('<')?;
    let end = content.rfind('>')?;
    (end > start).then(|| content[start..=end].to_string())
}

impl Catalog {
    /// Runs `extractor` on a separate task bounded by `timeout` and stores
    /// the resulting protocol.
    pub async fn import_protocol(
        &self,
        extractor: Arc<dyn ProtocolExtractor>,
        request: ImportRequest,
        timeout: Duration,
    ) -> MapResult<StandardProtocol> {
        let file_name = request.file_name.clone().unwrap_or_default();
        let (sender, receiver) = oneshot::channel();
        let task = tokio::spawn(async move {
            let result = extractor.extract(&request).await;
            let _ = sender.send(result);
        });

        let candidate = match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => result.map_err(|e| match e {
                MapError::Import(message) => MapError::Import(message),
                other => MapError::Import(other.to_string()),
            })?,
            Ok(Err(_)) => {
                return Err(MapError::Import(
                    "Document analysis ended without a result".to_string(),
                ))
            }
            Err(_) => {
                task.abort();
                warn!("Document analysis of '{}' timed out after {:?}", file_name, timeout);
                return Err(MapError::Import(format!(
                    "Document analysis timed out after {} seconds",
                    timeout.as_secs()
                )));
            }
        };

        let protocol = self.save_protocol(ProtocolDraft {
            id: None,
            name: candidate.name,
            code: candidate.code,
            description: candidate.description,
            protocol_type: candidate.protocol_type,
            data_format: candidate.data_format,
            category: candidate.category,
            enabled: true,
        })?;
        info!("Imported standard protocol '{}' from '{}'", protocol.code, file_name);
        Ok(protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_operations::DbOperations;

    fn request(file_name: &str, content: &str) -> ImportRequest {
        ImportRequest {
            file_name: Some(file_name.to_string()),
            document_content: content.to_string(),
        }
    }

    struct SlowExtractor;

    #[async_trait]
    impl ProtocolExtractor for SlowExtractor {
        async fn extract(&self, _request: &ImportRequest) -> MapResult<ProtocolCandidate> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(MapError::Import("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn heuristic_extractor_finds_embedded_json() {
        let doc = "Payment request sample:\n{\"amount\": 1, \"currency\": \"CNY\"}\nEnd.";
        let candidate = HeuristicExtractor.extract(&request("pay-req.docx", doc)).await.unwrap();
        assert_eq!(candidate.protocol_type, "JSON");
        assert_eq!(candidate.code, "PAY_REQ");
        assert!(candidate.data_format.contains("\"currency\""));
    }

    #[tokio::test]
    async fn heuristic_extractor_falls_back_to_xml() {
        let doc = "<Req><Amt>1</Amt></Req>";
        let candidate = HeuristicExtractor.extract(&request("1bal.xml", doc)).await.unwrap();
        assert_eq!(candidate.protocol_type, "XML");
        assert_eq!(candidate.code, "_1BAL");
        assert!(HeuristicExtractor.extract(&request("x", "plain text")).await.is_err());
    }

    #[tokio::test]
    async fn successful_import_is_stored() {
        let catalog = Catalog::new(Arc::new(DbOperations::temporary().unwrap()));
        let protocol = catalog
            .import_protocol(
                Arc::new(HeuristicExtractor),
                request("balance.txt", "{\"balance\": 10}"),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(protocol.code, "BALANCE");
        assert_eq!(catalog.list_protocols().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_or_slow_imports_write_nothing() {
        let catalog = Catalog::new(Arc::new(DbOperations::temporary().unwrap()));
        let failed = catalog
            .import_protocol(Arc::new(HeuristicExtractor), request("x", "nothing"), Duration::from_secs(60))
            .await;
        assert!(matches!(failed, Err(MapError::Import(_))));

        let slow = catalog
            .import_protocol(Arc::new(SlowExtractor), request("x", "{}"), Duration::from_millis(50))
            .await;
        assert!(matches!(slow, Err(MapError::Import(_))));
        assert!(catalog.list_protocols().unwrap().is_empty());
    }
}
