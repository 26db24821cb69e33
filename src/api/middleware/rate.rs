//! Per-client rate limiting middleware.
//!
//! Applies sliding-window rate limits per client:
//! - 100 requests per minute
//! - 1000 requests per hour
//!
//! Clients are keyed by the authenticated user when auth has already run,
//! else by peer address. Presented tokens are never used as keys: an
//! unverified token is attacker-chosen.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};

fn rate_key(req: &Request<axum::body::Body>) -> String {
    if let Some(auth) = req.extensions().get::<UserContext>() {
        return format!("user:{}", auth.user.id);
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Returns 429 once the client is over its limit.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = rate_key(&req);

    // MutexGuard is !Send; dropped before .await
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter.check(&key).map_err(|retry_after| {
            tracing::warn!(key = %key, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }
        })?;
    }

    Ok(next.run(req).await)
}
