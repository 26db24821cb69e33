//! Health check endpoint.

use axum::Json;
use serde::Serialize;

use crate::config;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`: liveness check.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: config::APP_NAME,
        version: config::APP_VERSION,
    })
}
