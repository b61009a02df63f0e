use super::run_blocking;
use crate::bankmap_node::api_response::respond;
use crate::bankmap_node::http_server::AppState;
use crate::catalog::{ImportRequest, ProtocolDraft};
use actix_web::{web, Responder};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolTypeQuery {
    pub protocol_type: String,
}

pub async fn list_protocols(state: web::Data<AppState>) -> impl Responder {
    respond(state.node.catalog().list_protocols())
}

pub async fn list_protocols_by_type(
    state: web::Data<AppState>,
    query: web::Query<ProtocolTypeQuery>,
) -> impl Responder {
    respond(state.node.catalog().list_protocols_by_type(&query.protocol_type))
}

pub async fn get_protocol(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.node.catalog().get_protocol(&path.into_inner()))
}

pub async fn save_protocol(
    state: web::Data<AppState>,
    body: web::Json<ProtocolDraft>,
) -> impl Responder {
    let node = state.node.clone();
    let draft = body.into_inner();
    respond(run_blocking(move || node.catalog().save_protocol(draft)).await)
}

pub async fn delete_protocol(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.catalog().delete_protocol(&id)).await)
}

pub async fn toggle_protocol(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.catalog().toggle_protocol(&id)).await)
}

/// Analyzes an uploaded document and stores the protocol it describes.
pub async fn import_from_document(
    state: web::Data<AppState>,
    body: web::Json<ImportRequest>,
) -> impl Responder {
    respond(state.node.import_protocol(body.into_inner()).await)
}
