//! Consultation gating: consent records and media join credentials.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::crypto::{self, MediaClaims};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::*;

pub const CONSENT_TEXT: &str = "I consent to telemedicine consultation.";

const ROOM_PREFIX: &str = "appt_";

/// Media room dedicated to one appointment.
pub fn room_name(appointment_id: &Uuid) -> String {
    format!("{ROOM_PREFIX}{appointment_id}")
}

/// Inverse of [`room_name`].
pub fn appointment_for_room(room: &str) -> Option<Uuid> {
    room.strip_prefix(ROOM_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinCredential {
    pub token: String,
    pub room: String,
    /// Provider endpoint the client connects to, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    pub expires_at: i64,
}

fn load_appointment(conn: &Connection, appointment_id: &Uuid) -> Result<Appointment, ServiceError> {
    repository::get_appointment(conn, appointment_id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Appointment not found: {appointment_id}")))
}

/// Record the patient's consent for one appointment. Repeat calls return
/// the original record.
pub fn record_consent(
    conn: &Connection,
    user_id: &Uuid,
    appointment_id: &Uuid,
    now: &DateTime<Utc>,
) -> Result<Consent, ServiceError> {
    let appointment = load_appointment(conn, appointment_id)?;
    if appointment.patient_id != *user_id {
        return Err(ServiceError::Forbidden(
            "Only the patient can consent to this consultation".into(),
        ));
    }

    let consent = repository::record_consent(
        conn,
        &Consent {
            id: Uuid::new_v4(),
            patient_id: *user_id,
            appointment_id: *appointment_id,
            text: CONSENT_TEXT.to_string(),
            accepted: true,
            created_at: *now,
        },
    )?;
    tracing::info!(appointment_id = %appointment_id, "Consent recorded");
    Ok(consent)
}

/// Mint a join credential for `room`. The caller must be a party to the
/// appointment behind the room; patients must have consented first.
pub fn issue_join_credential(
    conn: &Connection,
    media: &MediaConfig,
    user_id: &Uuid,
    room: &str,
    now: &DateTime<Utc>,
) -> Result<JoinCredential, ServiceError> {
    let appointment_id = appointment_for_room(room)
        .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid room name: {room}")))?;
    let appointment = load_appointment(conn, &appointment_id)?;

    let is_patient = appointment.patient_id == *user_id;
    let is_doctor = appointment.doctor_id == *user_id;
    if !is_patient && !is_doctor {
        return Err(ServiceError::Forbidden(
            "Not a participant in this consultation".into(),
        ));
    }
    if is_patient && repository::get_consent(conn, &appointment_id, user_id)?.is_none() {
        return Err(ServiceError::ConsentRequired);
    }

    let (api_key, api_secret) = match (&media.api_key, &media.api_secret) {
        (Some(key), Some(secret)) => (key.as_str(), secret.as_str()),
        _ => {
            return Err(ServiceError::ExternalService(
                "Media service credentials are not configured".into(),
            ))
        }
    };

    let mut claims = MediaClaims::join(
        api_key,
        &user_id.to_string(),
        room,
        now.timestamp(),
        media.token_ttl_secs,
    );
    claims.name = repository::get_profile(conn, user_id)?.and_then(|p| p.name);

    let token = crypto::sign_media_token(api_secret, &claims)
        .map_err(|e| ServiceError::Internal(format!("Failed to sign media token: {e}")))?;

    tracing::info!(appointment_id = %appointment_id, "Join credential issued");
    Ok(JoinCredential {
        token,
        room: room.to_string(),
        server_url: media.ws_url.clone(),
        expires_at: claims.exp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{self, BookingRequest};
    use crate::db::repository::fixtures::{make_doctor, make_slot, make_user};
    use crate::db::sqlite::open_memory_database;

    struct Scenario {
        conn: Connection,
        doctor: Uuid,
        patient: Uuid,
        appointment: Uuid,
    }

    fn booked() -> Scenario {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let patient = make_user(&conn, "p@example.com");
        let slot = make_slot(&conn, &doctor, 0);
        let confirmation = booking::book_appointment(
            &mut conn,
            &patient,
            BookingRequest {
                doctor_id: doctor.to_string(),
                slot_id: slot.to_string(),
                reason: "fever".into(),
            },
            &Utc::now(),
        )
        .unwrap();
        Scenario {
            conn,
            doctor,
            patient,
            appointment: confirmation.appointment.id,
        }
    }

    fn media() -> MediaConfig {
        MediaConfig {
            api_key: Some("APIkey".into()),
            api_secret: Some("media-secret".into()),
            ws_url: Some("wss://media.example.com".into()),
            token_ttl_secs: 3600,
        }
    }

    #[test]
    fn room_name_round_trips() {
        let id = Uuid::new_v4();
        assert_eq!(room_name(&id), format!("appt_{id}"));
        assert_eq!(appointment_for_room(&room_name(&id)), Some(id));
        assert_eq!(appointment_for_room("lobby"), None);
    }

    #[test]
    fn patient_needs_consent_before_joining() {
        let s = booked();
        let room = room_name(&s.appointment);
        let now = Utc::now();

        let err = issue_join_credential(&s.conn, &media(), &s.patient, &room, &now).unwrap_err();
        assert!(matches!(err, ServiceError::ConsentRequired));

        let consent = record_consent(&s.conn, &s.patient, &s.appointment, &now).unwrap();
        assert_eq!(consent.text, CONSENT_TEXT);

        let credential = issue_join_credential(&s.conn, &media(), &s.patient, &room, &now).unwrap();
        assert_eq!(credential.room, room);
        assert_eq!(credential.expires_at, now.timestamp() + 3600);

        let claims =
            crypto::verify_media_token("media-secret", &credential.token, now.timestamp()).unwrap();
        assert_eq!(claims.iss, "APIkey");
        assert_eq!(claims.sub, s.patient.to_string());
        assert_eq!(claims.video.room, room);
    }

    #[test]
    fn doctor_joins_without_consent() {
        let s = booked();
        let credential = issue_join_credential(
            &s.conn,
            &media(),
            &s.doctor,
            &room_name(&s.appointment),
            &Utc::now(),
        )
        .unwrap();
        let claims =
            crypto::verify_media_token("media-secret", &credential.token, Utc::now().timestamp())
                .unwrap();
        assert_eq!(claims.name.as_deref(), Some("Dr. D"));
    }

    #[test]
    fn outsiders_are_forbidden() {
        let s = booked();
        let stranger = make_user(&s.conn, "x@example.com");
        let now = Utc::now();

        let consent = record_consent(&s.conn, &stranger, &s.appointment, &now).unwrap_err();
        assert!(matches!(consent, ServiceError::Forbidden(_)));

        let doctor_consent = record_consent(&s.conn, &s.doctor, &s.appointment, &now).unwrap_err();
        assert!(matches!(doctor_consent, ServiceError::Forbidden(_)));

        let join = issue_join_credential(
            &s.conn,
            &media(),
            &stranger,
            &room_name(&s.appointment),
            &now,
        )
        .unwrap_err();
        assert!(matches!(join, ServiceError::Forbidden(_)));
    }

    #[test]
    fn consent_is_idempotent() {
        let s = booked();
        let now = Utc::now();
        let a = record_consent(&s.conn, &s.patient, &s.appointment, &now).unwrap();
        let b = record_consent(&s.conn, &s.patient, &s.appointment, &now).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn bad_room_and_missing_appointment() {
        let s = booked();
        let now = Utc::now();
        assert!(matches!(
            issue_join_credential(&s.conn, &media(), &s.patient, "general", &now),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            issue_join_credential(&s.conn, &media(), &s.patient, &room_name(&Uuid::new_v4()), &now),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            record_consent(&s.conn, &s.patient, &Uuid::new_v4(), &now),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn missing_media_credentials_are_external_error() {
        let s = booked();
        let err = issue_join_credential(
            &s.conn,
            &MediaConfig::default(),
            &s.doctor,
            &room_name(&s.appointment),
            &Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ExternalService(_)));
    }
}
