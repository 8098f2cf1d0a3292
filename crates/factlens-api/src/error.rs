//! API error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Message returned with `429` when admission is refused.
pub const CAPACITY_MESSAGE: &str = "Too many concurrent jobs. Try again shortly.";

/// Error returned from handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    TooManyJobs,
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<factlens_core::Error> for ApiError {
    fn from(err: factlens_core::Error) -> Self {
        match err {
            factlens_core::Error::Capacity { .. } => ApiError::TooManyJobs,
            factlens_core::Error::InvalidInput(msg) | factlens_core::Error::Validation(msg) => {
                ApiError::BadRequest(msg)
            }
            factlens_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::TooManyJobs => (StatusCode::TOO_MANY_REQUESTS, CAPACITY_MESSAGE.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factlens_core::Error;

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            ApiError::from(Error::Capacity {
                active: 3,
                ceiling: 3
            }),
            ApiError::TooManyJobs
        ));
        assert!(matches!(
            ApiError::from(Error::InvalidInput("bad url".into())),
            ApiError::BadRequest(msg) if msg == "bad url"
        ));
        assert!(matches!(
            ApiError::from(Error::NotFound("job".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(Error::Persistence("down".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::TooManyJobs.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
