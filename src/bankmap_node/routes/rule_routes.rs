use super::run_blocking;
use crate::bankmap_node::api_response::respond;
use crate::bankmap_node::http_server::AppState;
use crate::rules::RuleDraft;
use crate::service::TransformOptions;
use actix_web::{web, Responder};
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTransformRequest {
    pub rule_id: String,
    pub source_data: JsonValue,
    #[serde(flatten)]
    pub options: TransformOptions,
}

pub async fn list_rules(state: web::Data<AppState>) -> impl Responder {
    respond(state.node.rules().list())
}

pub async fn get_rule(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.node.rules().get(&path.into_inner()))
}

pub async fn save_rule(state: web::Data<AppState>, body: web::Json<RuleDraft>) -> impl Responder {
    let node = state.node.clone();
    let draft = body.into_inner();
    respond(run_blocking(move || node.save_rule(draft)).await)
}

pub async fn delete_rule(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.rules().delete(&id)).await)
}

pub async fn transform_with_rule(
    state: web::Data<AppState>,
    body: web::Json<RuleTransformRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let request = body.into_inner();
    respond(
        run_blocking(move || {
            node.transform_rule(&request.rule_id, &request.source_data, &request.options)
        })
        .await,
    )
}
