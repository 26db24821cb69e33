//! Media join credentials for the consultation room.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::consultation::{self, JoinCredential};

#[derive(Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub room: String,
}

/// `POST /api/media/token`: join credential for an appointment room.
pub async fn token(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinCredential>, ApiError> {
    let Json(request) = payload?;
    let user_id = auth.user.id;
    let credential = ctx
        .with_db(move |conn, core| {
            consultation::issue_join_credential(
                conn,
                &core.config.media,
                &user_id,
                request.room.trim(),
                &Utc::now(),
            )
        })
        .await?;
    Ok(Json(credential))
}
