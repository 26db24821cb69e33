//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! JSON routes live under `/api/`; the OAuth callback sits at the root
//! because the provider redirects the browser there.
//!
//! Middleware stack on protected routes (outermost → innermost):
//! 1. Rate limiter by peer → 2. Auth validator → 3. Rate limiter by user
//! → 4. Audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Browser clients are only served from the configured app origin.
fn cors_layer(app_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);
    match HeaderValue::from_str(app_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(app_url, "App URL is not a valid origin; CORS disabled");
            cors
        }
    }
}

pub(crate) fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Rate limit (peer) → Auth → Rate limit (user)
    //   → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/session", get(endpoints::auth::session))
        .route("/auth/logout", post(endpoints::auth::logout))
        .route(
            "/profile",
            get(endpoints::profile::get).post(endpoints::profile::upsert),
        )
        .route("/profile/status", get(endpoints::profile::status))
        .route("/slots", post(endpoints::doctors::create_slot))
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::book),
        )
        .route(
            "/appointments/:id/consent",
            post(endpoints::appointments::consent),
        )
        .route("/media/token", post(endpoints::consultation::token))
        .route("/prescriptions", post(endpoints::prescriptions::create))
        .route("/prescriptions/pdf", get(endpoints::prescriptions::pdf))
        .route("/records", get(endpoints::records::list))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // Rate-limited only
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/signup", post(endpoints::auth::signup))
        .route("/auth/signin", post(endpoints::auth::signin))
        .route("/auth/oauth", get(endpoints::auth::oauth_start))
        .route("/doctors", get(endpoints::doctors::list))
        .route("/doctors/:id/slots", get(endpoints::doctors::slots))
        .route("/symptoms/questions", get(endpoints::symptoms::questions))
        .route("/symptoms/assess", post(endpoints::symptoms::assess))
        .route("/pharmacy/pharmacies", get(endpoints::pharmacy::pharmacies))
        .route("/pharmacy/medicines", get(endpoints::pharmacy::medicines))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let callback = Router::new()
        .route("/auth/callback", get(endpoints::auth::oauth_callback))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .merge(callback)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(&ctx.core.config.app_url))
}
