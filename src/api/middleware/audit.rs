//! Audit logging middleware.
//!
//! Records method, path and response status for every authenticated
//! request. Runs innermost (after auth has injected `UserContext`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, UserContext};
use crate::core_state::AccessSource;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let source = req
        .extensions()
        .get::<UserContext>()
        .map(|u| AccessSource::User {
            user_id: u.user.id,
        })
        .unwrap_or(AccessSource::Anonymous);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        let action = format!("{method} {path}");
        let entity = format!("status:{status}");
        // May flush to SQLite.
        let _ = tokio::task::spawn_blocking(move || {
            ctx.core.log_access(source, &action, &entity);
        })
        .await;
    }

    response
}
