//! Prescription endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::models::Prescription;
use crate::prescription::{self, NewPrescription};

/// `POST /api/prescriptions`: a doctor issues a prescription.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
    payload: Result<Json<NewPrescription>, JsonRejection>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    let Json(request) = payload?;
    let doctor_id = auth.user.id;
    let created = ctx
        .with_db(move |conn, _| {
            prescription::create_prescription(conn, &doctor_id, request, &Utc::now())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
pub struct PdfQuery {
    #[serde(default)]
    pub id: String,
}

/// `GET /api/prescriptions/pdf?id=`: printable PDF with a verification QR.
pub async fn pdf(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
    query: Result<Query<PdfQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    if query.id.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing prescription id".into()));
    }
    let prescription_id = parse_id(&query.id)?;
    let viewer_id = auth.user.id;

    let bytes = ctx
        .with_db(move |conn, core| {
            prescription::render_prescription_pdf(
                conn,
                &core.config.app_url,
                &prescription_id,
                &viewer_id,
            )
        })
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=prescription-{prescription_id}.pdf"),
            ),
        ],
        bytes,
    )
        .into_response())
}
