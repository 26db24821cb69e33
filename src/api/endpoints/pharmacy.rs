//! Pharmacy directory and medicine search.

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::pharmacy::{self, MedicineAvailability, Pharmacy};

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/pharmacy/pharmacies`
pub async fn pharmacies() -> Json<&'static [Pharmacy]> {
    Json(pharmacy::PHARMACIES)
}

/// `GET /api/pharmacy/medicines?q=`
pub async fn medicines(
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<MedicineAvailability>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(pharmacy::search_medicines(&query.q)))
}
