//! API error types with structured JSON responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::error::ServiceError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Slot unavailable")]
    SlotUnavailable(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Consent required")]
    ConsentRequired(String),
    #[error("External service error: {0}")]
    ExternalService(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Authentication required".into())
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", msg.clone()),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::ValidationFailed(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg.clone())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::SlotUnavailable(msg) => {
                (StatusCode::CONFLICT, "SLOT_UNAVAILABLE", msg.clone())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::ConsentRequired(msg) => {
                (StatusCode::FORBIDDEN, "CONSENT_REQUIRED", msg.clone())
            }
            ApiError::ExternalService(msg) => {
                tracing::warn!(detail = %msg, "External service failure");
                (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE", msg.clone())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unauthenticated(_) => ApiError::Unauthorized(message),
            ServiceError::InvalidInput(_) => ApiError::BadRequest(message),
            ServiceError::ValidationFailed(_) => ApiError::ValidationFailed(message),
            ServiceError::NotFound(_) => ApiError::NotFound(message),
            ServiceError::SlotUnavailable => ApiError::SlotUnavailable(message),
            ServiceError::Forbidden(_) => ApiError::Forbidden(message),
            ServiceError::ConsentRequired => ApiError::ConsentRequired(message),
            ServiceError::ExternalService(_) => ApiError::ExternalService(message),
            ServiceError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Task join error: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn slot_unavailable_returns_409() {
        let response = ApiError::from(ServiceError::SlotUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "SLOT_UNAVAILABLE");
        assert_eq!(json["error"]["message"], "This slot has already been booked");
    }

    #[tokio::test]
    async fn store_rejection_keeps_message() {
        let err = ServiceError::ValidationFailed("role cannot be changed".into());
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["message"], "role cannot be changed");
    }

    #[tokio::test]
    async fn consent_and_forbidden_are_403() {
        let consent = ApiError::from(ServiceError::ConsentRequired).into_response();
        assert_eq!(consent.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(consent).await["error"]["code"], "CONSENT_REQUIRED");

        let forbidden = ApiError::from(ServiceError::Forbidden("no".into())).into_response();
        assert_eq!(body_json(forbidden).await["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn external_service_returns_502() {
        let response =
            ApiError::from(ServiceError::ExternalService("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::from(ServiceError::Internal("disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
