//! Health records overview.

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::UserContext;
use crate::records::{self, HealthRecords};

#[derive(Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/records?q=`: signed-in users only.
pub async fn list(
    Extension(auth): Extension<UserContext>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<HealthRecords>, ApiError> {
    let Query(query) = query?;
    tracing::debug!(user_id = %auth.user.id, "Health records viewed");
    Ok(Json(records::search(&query.q)))
}
