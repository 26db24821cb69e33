//! Booking flow: doctor directory, open slots, atomic booking.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{self, SlotClaim};
use crate::error::ServiceError;
use crate::models::*;
use crate::profile;

pub const MAX_REASON_CHARS: usize = 1000;

/// Booking form as submitted. Ids arrive as text so that blank values are
/// reported as invalid input rather than as malformed JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub doctor_id: String,
    #[serde(default)]
    pub slot_id: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    /// Where the client goes next.
    pub redirect: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub fn consultation_path(appointment_id: &Uuid) -> String {
    format!("/consultation/{appointment_id}")
}

fn parse_id(raw: &str, label: &str) -> Result<Uuid, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceError::InvalidInput(format!("Please select a {label}")));
    }
    Uuid::parse_str(raw).map_err(|_| ServiceError::InvalidInput(format!("Invalid {label} id")))
}

pub fn list_doctors(conn: &Connection) -> Result<Vec<DoctorSummary>, ServiceError> {
    Ok(repository::list_doctors(conn)?)
}

pub fn list_open_slots(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<ScheduleSlot>, ServiceError> {
    Ok(repository::list_open_slots(conn, doctor_id)?)
}

/// Book `slot_id` with `doctor_id` for the patient.
///
/// The slot flip and the appointment insert commit together or not at all;
/// a slot that is already taken yields [`ServiceError::SlotUnavailable`].
pub fn book_appointment(
    conn: &mut Connection,
    patient_id: &Uuid,
    request: BookingRequest,
    now: &DateTime<Utc>,
) -> Result<BookingConfirmation, ServiceError> {
    let doctor_id = parse_id(&request.doctor_id, "doctor")?;
    let slot_id = parse_id(&request.slot_id, "time slot")?;
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(ServiceError::InvalidInput(
            "Please describe the reason for your visit".into(),
        ));
    }
    if reason.chars().count() > MAX_REASON_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "Reason must be at most {MAX_REASON_CHARS} characters"
        )));
    }
    // Accounts without a profile yet book as patients.
    if let Some(Profile {
        role: Some(Role::Doctor),
        ..
    }) = repository::get_profile(conn, patient_id)?
    {
        return Err(ServiceError::Forbidden(
            "Only patients can book appointments".into(),
        ));
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        doctor_id,
        slot_id,
        reason: reason.to_string(),
        status: AppointmentStatus::Scheduled,
        created_at: *now,
    };

    match repository::book_slot(conn, &appointment)? {
        SlotClaim::Booked => {
            tracing::info!(
                appointment_id = %appointment.id,
                slot_id = %slot_id,
                doctor_id = %doctor_id,
                "Appointment booked"
            );
            Ok(BookingConfirmation {
                redirect: consultation_path(&appointment.id),
                appointment,
            })
        }
        SlotClaim::AlreadyBooked => {
            tracing::info!(slot_id = %slot_id, "Booking rejected: slot already taken");
            Err(ServiceError::SlotUnavailable)
        }
        SlotClaim::Missing => Err(ServiceError::NotFound(format!(
            "No slot {slot_id} for doctor {doctor_id}"
        ))),
    }
}

/// Publish a new open slot. Only doctors may call this.
pub fn create_slot(
    conn: &Connection,
    doctor_id: &Uuid,
    slot: NewSlot,
) -> Result<ScheduleSlot, ServiceError> {
    profile::require_doctor(conn, doctor_id)?;

    let start_time = slot.start_time.trunc_subsecs(0);
    let end_time = slot.end_time.trunc_subsecs(0);
    if end_time <= start_time {
        return Err(ServiceError::InvalidInput(
            "Slot end must be after its start".into(),
        ));
    }

    let slot = ScheduleSlot {
        id: Uuid::new_v4(),
        doctor_id: *doctor_id,
        start_time,
        end_time,
        is_booked: false,
    };
    repository::insert_slot(conn, &slot)?;
    tracing::info!(slot_id = %slot.id, doctor_id = %doctor_id, "Slot published");
    Ok(slot)
}

pub fn list_appointments(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<AppointmentSummary>, ServiceError> {
    Ok(repository::list_appointments_for_user(conn, user_id)?)
}
