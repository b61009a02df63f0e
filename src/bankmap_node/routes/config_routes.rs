use super::run_blocking;
use crate::bankmap_node::api_response::respond;
use crate::bankmap_node::http_server::AppState;
use crate::bankmap_node::node::{ConfigSaveRequest, ScopeSelector};
use crate::error::MapError;
use crate::version_store::ConfigType;
use actix_web::{web, Responder};
use serde::Deserialize;

/// Scope named in a query string, e.g.
/// `?bankCategory=ICBC&transactionType=PAY&configType=REQUEST&version=2`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    #[serde(default)]
    pub transaction_type_id: Option<String>,
    #[serde(default)]
    pub bank_category: Option<String>,
    #[serde(default, alias = "transactionName")]
    pub transaction_type: Option<String>,
    #[serde(default, alias = "requestType")]
    pub config_type: Option<ConfigType>,
    #[serde(default)]
    pub version: Option<u32>,
}

impl ScopeQuery {
    fn selector(&self) -> ScopeSelector {
        ScopeSelector {
            transaction_type_id: self.transaction_type_id.clone(),
            bank_category: self.bank_category.clone(),
            transaction_type: self.transaction_type.clone(),
        }
    }

    fn config_type(&self) -> ConfigType {
        self.config_type.unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    #[serde(default)]
    pub transaction_type_id: Option<String>,
    #[serde(default)]
    pub bank_category: Option<String>,
    #[serde(default, alias = "transactionName")]
    pub transaction_type: Option<String>,
    #[serde(default, alias = "requestType")]
    pub config_type: Option<ConfigType>,
    pub version: u32,
}

pub async fn save_config(
    state: web::Data<AppState>,
    body: web::Json<ConfigSaveRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let request = body.into_inner();
    respond(run_blocking(move || node.save_config(request)).await)
}

pub async fn list_configs(state: web::Data<AppState>) -> impl Responder {
    respond(state.node.list_configs())
}

pub async fn get_config(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.node.configs().get(&path.into_inner()))
}

pub async fn delete_config(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.configs().delete(&id)).await)
}

pub async fn get_current_config(
    state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    respond(state.node.current_config(&query.selector(), query.config_type()))
}

pub async fn get_config_by_version(
    state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    let result = query
        .version
        .ok_or_else(|| MapError::Validation("version is required".to_string()))
        .and_then(|version| {
            state
                .node
                .config_by_version(&query.selector(), query.config_type(), version)
        });
    respond(result)
}

pub async fn list_config_versions(
    state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    respond(state.node.config_versions(&query.selector(), query.config_type()))
}

pub async fn rollback_config(
    state: web::Data<AppState>,
    body: web::Json<RollbackRequest>,
) -> impl Responder {
    let request = body.into_inner();
    let selector = ScopeSelector {
        transaction_type_id: request.transaction_type_id,
        bank_category: request.bank_category,
        transaction_type: request.transaction_type,
    };
    let node = state.node.clone();
    respond(
        run_blocking(move || {
            node.rollback_config(&selector, request.config_type.unwrap_or_default(), request.version)
        })
        .await,
    )
}

pub async fn toggle_config(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.configs().toggle_enabled(&id)).await)
}
