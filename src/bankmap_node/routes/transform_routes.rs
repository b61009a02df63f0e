use super::run_blocking;
use crate::bankmap_node::api_response::respond;
use crate::bankmap_node::http_server::AppState;
use crate::bankmap_node::node::ScopeSelector;
use crate::service::TransformOptions;
use crate::version_store::ConfigType;
use actix_web::{web, Responder};
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Ad-hoc tree that was never saved.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineTransformRequest {
    pub source_data: JsonValue,
    #[serde(alias = "mappingTree")]
    pub mapping_config: JsonValue,
    #[serde(flatten)]
    pub options: TransformOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByNameTransformRequest {
    pub config_name: String,
    pub source_data: JsonValue,
    #[serde(flatten)]
    pub options: TransformOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByConfigTransformRequest {
    pub config_id: String,
    pub source_data: JsonValue,
    #[serde(flatten)]
    pub options: TransformOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByScopeTransformRequest {
    #[serde(default)]
    pub transaction_type_id: Option<String>,
    #[serde(default)]
    pub bank_category: Option<String>,
    #[serde(default, alias = "transactionName")]
    pub transaction_type: Option<String>,
    #[serde(default, alias = "requestType")]
    pub config_type: Option<ConfigType>,
    /// Current version when absent
    #[serde(default)]
    pub version: Option<u32>,
    pub source_data: JsonValue,
    #[serde(flatten)]
    pub options: TransformOptions,
}

pub async fn transform_inline(
    state: web::Data<AppState>,
    body: web::Json<InlineTransformRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let request = body.into_inner();
    respond(
        run_blocking(move || {
            node.transform_inline(&request.mapping_config, &request.source_data, &request.options)
        })
        .await,
    )
}

pub async fn transform_by_name(
    state: web::Data<AppState>,
    body: web::Json<ByNameTransformRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let request = body.into_inner();
    respond(
        run_blocking(move || {
            node.service().transform_by_name(
                &request.config_name,
                &request.source_data,
                &request.options,
            )
        })
        .await,
    )
}

pub async fn transform_by_config(
    state: web::Data<AppState>,
    body: web::Json<ByConfigTransformRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let request = body.into_inner();
    respond(
        run_blocking(move || {
            node.service().transform_by_config(
                &request.config_id,
                &request.source_data,
                &request.options,
            )
        })
        .await,
    )
}

pub async fn transform_by_scope(
    state: web::Data<AppState>,
    body: web::Json<ByScopeTransformRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let request = body.into_inner();
    let selector = ScopeSelector {
        transaction_type_id: request.transaction_type_id,
        bank_category: request.bank_category,
        transaction_type: request.transaction_type,
    };
    respond(
        run_blocking(move || {
            node.transform_by_scope(
                &selector,
                request.config_type.unwrap_or_default(),
                request.version,
                &request.source_data,
                &request.options,
            )
        })
        .await,
    )
}
