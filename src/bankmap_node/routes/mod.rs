//! HTTP handlers, one module per resource.

pub mod bank_routes;
pub mod config_routes;
pub mod dictionary_routes;
pub mod function_routes;
pub mod log_routes;
pub mod protocol_routes;
pub mod rule_routes;
pub mod transform_routes;

use crate::error::{MapError, MapResult};
use actix_web::web;
use serde::{Deserialize, Serialize};
use std::io;

/// `?code=X&excludeId=Y` for the uniqueness checks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCheckQuery {
    pub code: String,
    #[serde(default)]
    pub exclude_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CodeCheckResponse {
    pub exists: bool,
}

/// Runs `f` on the blocking pool. Evaluations and every storage write go
/// through here.
pub(crate) async fn run_blocking<T, F>(f: F) -> MapResult<T>
where
    F: FnOnce() -> MapResult<T> + Send + 'static,
    T: Send + 'static,
{
    match web::block(f).await {
        Ok(result) => result,
        Err(e) => Err(MapError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))),
    }
}
