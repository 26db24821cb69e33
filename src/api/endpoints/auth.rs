//! Authentication endpoints.
//!
//! - `POST /api/auth/signup`, `POST /api/auth/signin`: email accounts
//! - `GET /api/auth/oauth`, `GET /auth/callback`: provider flow
//! - `GET /api/auth/session`, `POST /api/auth/logout`: current session

use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::middleware::auth::cookie_value;
use crate::api::types::{ApiContext, UserContext, SESSION_COOKIE};
use crate::config::AppConfig;
use crate::identity::{self, IssuedSession, SignUpRequest};
use crate::models::{Role, User};

/// Cookie holding the pending OAuth `state` and requested role.
pub const OAUTH_STATE_COOKIE: &str = "hc_oauth";

/// How long a started provider flow stays valid.
const OAUTH_STATE_TTL_SECS: i64 = 600;

fn cookie(config: &AppConfig, name: &str, value: &str, max_age_secs: i64) -> String {
    let secure = if config.app_url.starts_with("https://") {
        "; Secure"
    } else {
        ""
    };
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}{secure}")
}

fn session_cookie(config: &AppConfig, token: &str, max_age_secs: i64) -> String {
    cookie(config, SESSION_COOKIE, token, max_age_secs)
}

/// `{state}.{role}`. States are URL-safe base64 and never contain a dot.
fn pending_oauth(headers: &HeaderMap) -> Option<(String, Role)> {
    let raw = cookie_value(headers, OAUTH_STATE_COOKIE)?;
    let (state, role) = raw.rsplit_once('.')?;
    Some((state.to_string(), Role::from_str(role).ok()?))
}

fn cookie_for(config: &AppConfig, session: &IssuedSession) -> String {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    session_cookie(config, &session.token, max_age)
}

#[derive(Serialize)]
pub struct SignUpResponse {
    pub user_id: Uuid,
    pub email: String,
    pub next: &'static str,
}

/// `POST /api/auth/signup`: create an email account. The requested
/// profile is applied at first sign-in.
pub async fn signup(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignUpResponse>), ApiError> {
    let Json(request) = payload?;
    let user = ctx
        .with_db(move |conn, core| identity::sign_up(conn, &core.config, request, &Utc::now()))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: user.id,
            email: user.email,
            next: "/login",
        }),
    ))
}

#[derive(Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
    pub redirect: &'static str,
}

/// `POST /api/auth/signin`: password sign-in; sets the session cookie.
pub async fn signin(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let session = ctx
        .with_db(move |conn, core| {
            identity::sign_in_password(
                conn,
                &core.config,
                &request.email,
                request.password,
                &Utc::now(),
            )
        })
        .await?;

    let cookie = cookie_for(&ctx.core.config, &session);
    let body = SessionResponse {
        token: session.token,
        user: session.user,
        expires_at: session.expires_at,
        redirect: session.redirect,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

#[derive(Deserialize)]
pub struct OAuthStartQuery {
    #[serde(default)]
    pub role: Option<Role>,
}

/// `GET /api/auth/oauth?role=`: send the browser to the provider. The
/// state and the requested role are pinned to this browser in a cookie.
pub async fn oauth_start(
    State(ctx): State<ApiContext>,
    query: Result<Query<OAuthStartQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let role = query.role.unwrap_or(Role::Patient);
    let start = identity::oauth_authorize_url(ctx.core.oauth.as_ref())?;

    let pending = cookie(
        &ctx.core.config,
        OAUTH_STATE_COOKIE,
        &format!("{}.{}", start.state, role.as_str()),
        OAUTH_STATE_TTL_SECS,
    );
    Ok(([(header::SET_COOKIE, pending)], Redirect::to(&start.url)).into_response())
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET /auth/callback`: provider redirect target. Lands on `/` with a
/// session cookie, or on `/login` with an error. The pending state cookie
/// is cleared either way.
pub async fn oauth_callback(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let config = &ctx.core.config;
    let app_url = config.app_url.clone();
    let cleared = cookie(config, OAUTH_STATE_COOKIE, "", 0);
    let failure = |reason: &str| {
        let url = reqwest::Url::parse_with_params(&format!("{app_url}/login"), &[("error", reason)])
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{app_url}/login"));
        ([(header::SET_COOKIE, cleared.clone())], Redirect::to(&url)).into_response()
    };

    if let Some(error) = query.error.as_deref() {
        tracing::info!(error, "OAuth provider returned an error");
        return failure("oauth_denied");
    }
    let role = match pending_oauth(&headers) {
        Some((expected, role))
            if identity::oauth_state_matches(&expected, query.state.as_deref()) =>
        {
            role
        }
        _ => {
            tracing::warn!("OAuth callback rejected: state mismatch");
            return failure("oauth_state");
        }
    };
    let Some(code) = query.code.filter(|c| !c.trim().is_empty()) else {
        return failure("missing_code");
    };

    let result = ctx
        .with_db(move |conn, core| {
            identity::oauth_callback(
                conn,
                &core.config,
                core.oauth.as_ref(),
                &code,
                Some(role),
                &Utc::now(),
            )
        })
        .await;

    match result {
        Ok(session) => {
            let target = format!("{app_url}{}", session.redirect);
            (
                AppendHeaders([
                    (header::SET_COOKIE, cleared.clone()),
                    (header::SET_COOKIE, cookie_for(config, &session)),
                ]),
                Redirect::to(&target),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth callback failed");
            failure("oauth_failed")
        }
    }
}

#[derive(Serialize)]
pub struct CurrentSession {
    pub user: User,
    pub redirect: &'static str,
}

/// `GET /api/auth/session`: the signed-in user and where to send them.
pub async fn session(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
) -> Result<Json<CurrentSession>, ApiError> {
    let user_id = auth.user.id;
    let redirect = ctx
        .with_db(move |conn, _| identity::post_login_redirect(conn, &user_id))
        .await?;
    Ok(Json(CurrentSession {
        user: auth.user,
        redirect,
    }))
}

/// `POST /api/auth/logout`: revoke the session and clear the cookie.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
) -> Result<Response, ApiError> {
    let token = auth.token;
    ctx.with_db(move |conn, _| identity::sign_out(conn, &token)).await?;

    let cleared = session_cookie(&ctx.core.config, "", 0);
    Ok((
        [(header::SET_COOKIE, cleared)],
        Json(serde_json::json!({ "signed_out": true })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_http_only_and_secure_on_https() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_tests(dir.path());
        let plain = session_cookie(&config, "abc", 60);
        assert!(plain.starts_with("hc_session=abc;"));
        assert!(plain.contains("HttpOnly"));
        assert!(!plain.contains("Secure"));

        config.app_url = "https://hc.example".into();
        assert!(session_cookie(&config, "abc", 60).ends_with("; Secure"));
    }

    #[test]
    fn pending_oauth_cookie_parses_state_and_role() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "hc_session=x; hc_oauth=Ab-c_9.doctor".parse().unwrap(),
        );
        assert_eq!(
            pending_oauth(&headers),
            Some(("Ab-c_9".to_string(), Role::Doctor))
        );

        headers.insert(header::COOKIE, "hc_oauth=Ab-c_9.admin".parse().unwrap());
        assert_eq!(pending_oauth(&headers), None);
        assert_eq!(pending_oauth(&HeaderMap::new()), None);
    }
}
