//! Banks, their transaction types and plugin export.

use super::{run_blocking, CodeCheckQuery, CodeCheckResponse};
use crate::bankmap_node::api_response::{error_response, respond};
use crate::bankmap_node::http_server::AppState;
use crate::catalog::{BankDraft, TransactionTypeDraft, TRANSACTION_TYPE_PRESETS};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse, Responder};

pub const CHECKSUM_HEADER: &str = "X-Checksum-Sha256";

pub async fn list_banks(state: web::Data<AppState>) -> impl Responder {
    respond(state.node.catalog().list_banks())
}

pub async fn list_enabled_banks(state: web::Data<AppState>) -> impl Responder {
    respond(state.node.catalog().list_enabled_banks())
}

pub async fn get_bank(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.node.catalog().get_bank(&path.into_inner()))
}

pub async fn save_bank(state: web::Data<AppState>, body: web::Json<BankDraft>) -> impl Responder {
    let node = state.node.clone();
    let draft = body.into_inner();
    respond(run_blocking(move || node.catalog().save_bank(draft)).await)
}

pub async fn delete_bank(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.catalog().delete_bank(&id)).await)
}

pub async fn check_bank_code(
    state: web::Data<AppState>,
    query: web::Query<CodeCheckQuery>,
) -> impl Responder {
    respond(
        state
            .node
            .catalog()
            .check_bank_code_exists(&query.code, query.exclude_id.as_deref())
            .map(|exists| CodeCheckResponse { exists }),
    )
}

/// Downloads the bank's plugin package as a JSON attachment.
pub async fn export_plugin(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.node.export_bank_plugin(&path.into_inner()) {
        Ok(export) => HttpResponse::Ok()
            .content_type("application/json")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(export.file_name)],
            })
            .insert_header((CHECKSUM_HEADER, export.checksum))
            .body(export.bytes),
        Err(e) => error_response(&e),
    }
}

pub async fn list_transaction_types(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    respond(state.node.catalog().list_transaction_types(&path.into_inner()))
}

pub async fn get_transaction_type(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    respond(state.node.catalog().get_transaction_type(&path.into_inner()))
}

pub async fn save_transaction_type(
    state: web::Data<AppState>,
    body: web::Json<TransactionTypeDraft>,
) -> impl Responder {
    let node = state.node.clone();
    let draft = body.into_inner();
    respond(run_blocking(move || node.catalog().save_transaction_type(draft)).await)
}

pub async fn delete_transaction_type(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.catalog().delete_transaction_type(&id)).await)
}

pub async fn list_transaction_type_presets() -> impl Responder {
    HttpResponse::Ok().json(crate::bankmap_node::api_response::ApiResponse::success(
        TRANSACTION_TYPE_PRESETS,
    ))
}
