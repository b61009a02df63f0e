use super::{run_blocking, CodeCheckQuery, CodeCheckResponse};
use crate::bankmap_node::api_response::respond;
use crate::bankmap_node::http_server::AppState;
use crate::registry::DictionaryDraft;
use actix_web::{web, Responder};

pub async fn list_dictionaries(state: web::Data<AppState>) -> impl Responder {
    respond(state.node.dictionaries().list())
}

pub async fn get_dictionary(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    respond(state.node.dictionaries().get(&path.into_inner()))
}

pub async fn save_dictionary(
    state: web::Data<AppState>,
    body: web::Json<DictionaryDraft>,
) -> impl Responder {
    let node = state.node.clone();
    let draft = body.into_inner();
    respond(run_blocking(move || node.dictionaries().save(draft)).await)
}

pub async fn delete_dictionary(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let node = state.node.clone();
    let id = path.into_inner();
    respond(run_blocking(move || node.dictionaries().delete(&id)).await)
}

pub async fn check_dictionary_code(
    state: web::Data<AppState>,
    query: web::Query<CodeCheckQuery>,
) -> impl Responder {
    respond(
        state
            .node
            .dictionaries()
            .check_code_exists(&query.code, query.exclude_id.as_deref())
            .map(|exists| CodeCheckResponse { exists }),
    )
}
