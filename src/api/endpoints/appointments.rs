//! Appointment endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::booking::{self, BookingConfirmation, BookingRequest};
use crate::consultation;
use crate::models::{AppointmentSummary, Consent};

/// `GET /api/appointments`: the caller's appointments as patient or doctor.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
) -> Result<Json<Vec<AppointmentSummary>>, ApiError> {
    let user_id = auth.user.id;
    let appointments = ctx
        .with_db(move |conn, _| booking::list_appointments(conn, &user_id))
        .await?;
    Ok(Json(appointments))
}

/// `POST /api/appointments`: book an open slot.
///
/// Two patients racing for the same slot: exactly one gets `201`, the
/// other `409 SLOT_UNAVAILABLE`.
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingConfirmation>), ApiError> {
    let Json(request) = payload?;
    let patient_id = auth.user.id;
    let confirmation = ctx
        .with_db(move |conn, _| booking::book_appointment(conn, &patient_id, request, &Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

/// `POST /api/appointments/:id/consent`
pub async fn consent(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Consent>, ApiError> {
    let appointment_id = parse_id(&appointment_id)?;
    let user_id = auth.user.id;
    let consent = ctx
        .with_db(move |conn, _| {
            consultation::record_consent(conn, &user_id, &appointment_id, &Utc::now())
        })
        .await?;
    Ok(Json(consent))
}
