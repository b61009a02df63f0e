//! Response envelope shared by every route and the mapping from engine
//! errors onto HTTP statuses.

use crate::error::{MapError, MapResult};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Upper-case error category, e.g. `NOT_FOUND`
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, serde_json::Value>,
}

impl ApiError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: HashMap::new(),
        }
    }

    pub fn with_details(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

impl From<&MapError> for ApiError {
    fn from(error: &MapError) -> Self {
        let api_error = ApiError::new(&error.category().to_uppercase(), &error.to_string());
        match error {
            MapError::Transform(transform_error) => match serde_json::to_value(transform_error) {
                Ok(value) => api_error.with_details("transformError", value),
                Err(_) => api_error,
            },
            _ => api_error,
        }
    }
}

pub fn status_for(error: &MapError) -> StatusCode {
    match error {
        MapError::Validation(_) => StatusCode::BAD_REQUEST,
        MapError::NotFound(_) => StatusCode::NOT_FOUND,
        MapError::Conflict(_) | MapError::VersionConflict(_) => StatusCode::CONFLICT,
        MapError::Transform(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MapError::Import(_) => StatusCode::BAD_GATEWAY,
        MapError::Database(_)
        | MapError::Serialization(_)
        | MapError::Config(_)
        | MapError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(error: &MapError) -> HttpResponse {
    let status = status_for(error);
    if status.is_server_error() {
        error!("Request failed: {}", error);
    } else {
        warn!("Request rejected: {}", error);
    }
    HttpResponse::build(status).json(ApiResponse::<()>::error(ApiError::from(error)))
}

/// 200 with the value in `data`, or the mapped error status.
pub fn respond<T: Serialize>(result: MapResult<T>) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(ApiResponse::success(data)),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform_execution::TransformError;

    #[test]
    fn statuses_follow_error_category() {
        assert_eq!(status_for(&MapError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&MapError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&MapError::VersionConflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&MapError::Import("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&MapError::Database("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn transform_errors_carry_structured_details() {
        let error = MapError::Transform(TransformError::unknown_function("$.amount", "ROUND9"));
        let api_error = ApiError::from(&error);
        assert_eq!(api_error.code, "TRANSFORM");
        let details = &api_error.details["transformError"];
        assert_eq!(details["kind"], "UnknownFunction");
        assert_eq!(details["path"], "$.amount");
        assert_eq!(details["code"], "ROUND9");
        assert_eq!(status_for(&error), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
