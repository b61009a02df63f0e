use crate::bankmap_node::api_response::ApiResponse;
use crate::web_logger;
use actix_web::{web, HttpResponse, Responder};
use futures_util::stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Buffered log lines; empty unless the server runs with the web logger.
pub async fn list_logs() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(web_logger::get_logs()))
}

/// Stream new log lines as Server-Sent Events
pub async fn stream_logs() -> impl Responder {
    match web_logger::subscribe() {
        Some(receiver) => {
            let stream = BroadcastStream::new(receiver).filter_map(|line| async move {
                line.ok().map(|line| {
                    Ok::<web::Bytes, actix_web::Error>(web::Bytes::from(format!(
                        "data: {}\n\n",
                        line
                    )))
                })
            });
            HttpResponse::Ok()
                .insert_header(("Content-Type", "text/event-stream"))
                .streaming(stream)
        }
        None => HttpResponse::ServiceUnavailable().json(ApiResponse::<()>::error(
            crate::bankmap_node::api_response::ApiError::new(
                "LOGS_UNAVAILABLE",
                "Log streaming requires the server to run with --web-log",
            ),
        )),
    }
}
