//! Profile endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::models::{Profile, ProfileFields};
use crate::profile::{self, ProfileStatus, ProfileView};

/// `GET /api/profile`: identity basics plus the stored profile, if any.
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
) -> Result<Json<ProfileView>, ApiError> {
    let view = ctx
        .with_db(move |conn, _| profile::get_profile(conn, &auth.user))
        .await?;
    Ok(Json(view))
}

/// `POST /api/profile`: create or update the caller's profile.
pub async fn upsert(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
    payload: Result<Json<ProfileFields>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(fields) = payload?;
    let saved = ctx
        .with_db(move |conn, _| profile::upsert_profile(conn, &auth.user, fields, &Utc::now()))
        .await?;
    Ok(Json(saved))
}

/// `GET /api/profile/status`
pub async fn status(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
) -> Result<Json<ProfileStatus>, ApiError> {
    let status = ctx
        .with_db(move |conn, _| profile::profile_status(conn, &auth.user))
        .await?;
    Ok(Json(status))
}
