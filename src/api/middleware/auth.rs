//! Session authentication middleware.
//!
//! Accepts `Authorization: Bearer <token>` or the `hc_session` cookie,
//! resolves the session on the blocking pool and injects `UserContext`
//! into request extensions for downstream handlers.

use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext, SESSION_COOKIE};
use crate::identity;

/// Session token presented by the client. The bearer header wins over
/// the cookie when both are present.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    cookie_value(headers, SESSION_COOKIE)
}

/// Non-empty value of the named request cookie.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Require a valid, unexpired session.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = session_token(req.headers()).ok_or_else(ApiError::unauthorized)?;

    let lookup = token.clone();
    let user = ctx
        .with_db(move |conn, _| identity::current_session(conn, &lookup, &Utc::now()))
        .await?;

    req.extensions_mut().insert(UserContext { user, token });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("hc_session=xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; hc_session=xyz; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_empty_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("hc_session="));
        assert_eq!(session_token(&headers), None);
    }
}
