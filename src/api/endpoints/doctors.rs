//! Doctor directory and slot endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::booking::{self, NewSlot};
use crate::models::{DoctorSummary, ScheduleSlot};

/// `GET /api/doctors`: every doctor with a name and specialty.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<DoctorSummary>>, ApiError> {
    let doctors = ctx.with_db(|conn, _| booking::list_doctors(conn)).await?;
    Ok(Json(doctors))
}

/// `GET /api/doctors/:id/slots`: open future slots, soonest first.
pub async fn slots(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Vec<ScheduleSlot>>, ApiError> {
    let doctor_id = parse_id(&doctor_id)?;
    let slots = ctx
        .with_db(move |conn, _| booking::list_open_slots(conn, &doctor_id))
        .await?;
    Ok(Json(slots))
}

/// `POST /api/slots`: a doctor publishes an open slot.
pub async fn create_slot(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<UserContext>,
    payload: Result<Json<NewSlot>, JsonRejection>,
) -> Result<(StatusCode, Json<ScheduleSlot>), ApiError> {
    let Json(slot) = payload?;
    let doctor_id = auth.user.id;
    let created = ctx
        .with_db(move |conn, _| booking::create_slot(conn, &doctor_id, slot))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
