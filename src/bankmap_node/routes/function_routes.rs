use super::{run_blocking, CodeCheckQuery, CodeCheckResponse};
use crate::bankmap_node::api_response::respond;
use crate::bankmap_node::http_server::AppState;
use crate::registry::{FunctionDefinition, FunctionDraft};
use crate::transform::SYSTEM_FUNCTIONS;
use actix_web::{web, Responder};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Serialize)]
pub struct SystemFunctionInfo {
    pub code: &'static str,
    pub description: &'static str,
}

/// Everything a mapping `functionCall` node can name.
#[derive(Debug, Serialize)]
pub struct FunctionCatalog {
    pub system: Vec<SystemFunctionInfo>,
    pub custom: Vec<FunctionDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub code: String,
    #[serde(default)]
    pub args: Vec<JsonValue>,
}

pub async fn list_all_functions(state: web::Data<AppState>) -> impl Responder {
    let result = state.node.functions().list().map(|custom| FunctionCatalog {
        system: SYSTEM_FUNCTIONS
            .iter()
            .map(|f| SystemFunctionInfo {
                code: f.code,
                description: f.description,
            })
            .collect(),
        custom,
    });
    respond(result)
}

pub async fn list_functions(state: web::Data<AppState>) -> impl Responder {
    respond(state.node.functions().list())
}

pub async fn get_function(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.node.functions().get(&path.into_inner()))
}

pub async fn save_function(
    state: web::Data<AppState>,
    body: web::Json<FunctionDraft>,
) -> impl Responder {
    let node = state.node.clone();
    let draft = body.into_inner();
    respond(run_blocking(move || node.functions().save(draft)).await)
}

pub async fn delete_function(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.functions().delete(&id)).await)
}

pub async fn check_function_code(
    state: web::Data<AppState>,
    query: web::Query<CodeCheckQuery>,
) -> impl Responder {
    respond(
        state
            .node
            .functions()
            .check_code_exists(&query.code, query.exclude_id.as_deref())
            .map(|exists| CodeCheckResponse { exists }),
    )
}

pub async fn toggle_function(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.functions().toggle_enabled(&id)).await)
}

/// Test-runs one function against literal arguments.
pub async fn invoke_function(
    state: web::Data<AppState>,
    body: web::Json<InvokeRequest>,
) -> impl Responder {
    let node = state.node.clone();
    let request = body.into_inner();
    respond(
        run_blocking(move || node.functions().invoke(&request.code, &request.args)).await,
    )
}
