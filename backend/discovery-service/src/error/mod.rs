//! Error types for the discovery core
//!
//! Every failure surfaced to a caller is one of the kinds below; the
//! transport layer maps `ErrorResponse` straight onto the wire. No stack
//! traces or source-chain details cross the service boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limit exceeded for user {0}")]
    RateLimitExceeded(Uuid),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("search timed out after {0}ms")]
    Timeout(u64),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Stable machine-readable error code
    pub fn error_type(&self) -> &'static str {
        match self {
            SearchError::Validation(_) => "VALIDATION_ERROR",
            SearchError::PermissionDenied(_) => "PERMISSION_DENIED",
            SearchError::RateLimitExceeded(_) => "RATE_LIMIT_EXCEEDED",
            SearchError::NotFound(_) => "RESOURCE_NOT_FOUND",
            SearchError::Timeout(_) => "SEARCH_TIMEOUT",
            SearchError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            SearchError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            SearchError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: ErrorBody {
                error_type: self.error_type().to_string(),
                message: self.to_string(),
                details: None,
            },
        }
    }
}

/// Structured error shape returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_codes() {
        assert_eq!(
            SearchError::Validation("term too long".into()).error_type(),
            "VALIDATION_ERROR"
        );
        assert_eq!(SearchError::Timeout(2000).error_type(), "SEARCH_TIMEOUT");
        assert_eq!(
            SearchError::Internal("boom".into()).error_type(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_response_shape() {
        let err = SearchError::Validation("term is required".into());
        let response = err.to_response();

        assert!(!response.success);
        assert_eq!(response.error.error_type, "VALIDATION_ERROR");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["type"], "VALIDATION_ERROR");
        // details omitted when absent
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_internal_preserves_original_message() {
        let err = SearchError::Internal("profile store returned 503".into());
        assert!(err.to_string().contains("profile store returned 503"));
    }
}
