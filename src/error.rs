use crate::transform_execution::error::TransformError;
use std::io;
use thiserror::Error;

/// Unified error type for the mapping engine.
///
/// Every public operation returns this error so the HTTP layer can map each
/// category onto a status code without inspecting messages.
#[derive(Debug, Error)]
pub enum MapError {
    /// Missing required field, duplicate code/name, unparseable script or tree
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown id, version or scope
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation would leave stored state inconsistent
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Version allocation kept racing after all retries
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// Structured evaluation failure
    #[error("Transform failed: {0}")]
    Transform(TransformError),

    /// Failure reported by the document import collaborator
    #[error("Import failed: {0}")]
    Import(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<TransformError> for MapError {
    fn from(error: TransformError) -> Self {
        MapError::Transform(error)
    }
}

impl From<sled::Error> for MapError {
    fn from(error: sled::Error) -> Self {
        MapError::Database(error.to_string())
    }
}

impl From<serde_json::Error> for MapError {
    fn from(error: serde_json::Error) -> Self {
        MapError::Serialization(error.to_string())
    }
}

impl MapError {
    /// Short machine-readable category used in HTTP error bodies.
    pub fn category(&self) -> &'static str {
        match self {
            MapError::Validation(_) => "validation",
            MapError::NotFound(_) => "not_found",
            MapError::Conflict(_) => "conflict",
            MapError::VersionConflict(_) => "version_conflict",
            MapError::Transform(_) => "transform",
            MapError::Import(_) => "import",
            MapError::Database(_) => "database",
            MapError::Serialization(_) => "serialization",
            MapError::Config(_) => "config",
            MapError::Io(_) => "io",
        }
    }
}

/// Result type alias for mapping engine operations.
pub type MapResult<T> = Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sled_errors_become_database_errors() {
        let err: MapError = sled::Error::Unsupported("nope".to_string()).into();
        assert!(matches!(err, MapError::Database(_)));
        assert_eq!(err.category(), "database");
    }

    #[test]
    fn display_includes_category_prefix() {
        let err = MapError::NotFound("function 'X'".to_string());
        assert_eq!(err.to_string(), "Not found: function 'X'");
    }
}
