use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Consent;

/// Record consent once per (appointment, patient); returns the stored row.
pub fn record_consent(conn: &Connection, consent: &Consent) -> Result<Consent, DatabaseError> {
    conn.execute(
        "INSERT INTO consents (id, patient_id, appointment_id, text, accepted, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(appointment_id, patient_id) DO NOTHING",
        params![
            consent.id.to_string(),
            consent.patient_id.to_string(),
            consent.appointment_id.to_string(),
            consent.text,
            consent.accepted,
            fmt_ts(&consent.created_at),
        ],
    )?;

    get_consent(conn, &consent.appointment_id, &consent.patient_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: "Consent".into(),
            id: consent.appointment_id.to_string(),
        }
    })
}

pub fn get_consent(
    conn: &Connection,
    appointment_id: &Uuid,
    patient_id: &Uuid,
) -> Result<Option<Consent>, DatabaseError> {
    let consent = conn
        .query_row(
            "SELECT id, patient_id, appointment_id, text, accepted, created_at
             FROM consents WHERE appointment_id = ?1 AND patient_id = ?2",
            params![appointment_id.to_string(), patient_id.to_string()],
            |row| {
                Ok(Consent {
                    id: parse_uuid(0, &row.get::<_, String>(0)?)?,
                    patient_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
                    appointment_id: parse_uuid(2, &row.get::<_, String>(2)?)?,
                    text: row.get(3)?,
                    accepted: row.get(4)?,
                    created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
                })
            },
        )
        .optional()?;
    Ok(consent)
}
