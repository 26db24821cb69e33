use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::{fmt_ts, parse_enum, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

/// Result of trying to claim a slot for an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClaim {
    Booked,
    /// No slot with that id belongs to the doctor.
    Missing,
    AlreadyBooked,
}

/// Claim the appointment's slot and insert the appointment in one
/// IMMEDIATE transaction. Concurrent callers serialize on the write lock,
/// so exactly one conditional update can flip a given slot.
pub fn book_slot(conn: &mut Connection, appt: &Appointment) -> Result<SlotClaim, DatabaseError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let claimed = tx.execute(
        "UPDATE schedule_slots SET is_booked = 1
         WHERE id = ?1 AND doctor_id = ?2 AND is_booked = 0",
        params![appt.slot_id.to_string(), appt.doctor_id.to_string()],
    )?;

    if claimed != 1 {
        let exists = tx
            .query_row(
                "SELECT 1 FROM schedule_slots WHERE id = ?1 AND doctor_id = ?2",
                params![appt.slot_id.to_string(), appt.doctor_id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        // Dropping the transaction rolls it back.
        return Ok(if exists {
            SlotClaim::AlreadyBooked
        } else {
            SlotClaim::Missing
        });
    }

    tx.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, slot_id, reason, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.slot_id.to_string(),
            appt.reason,
            appt.status.as_str(),
            fmt_ts(&appt.created_at),
        ],
    )?;

    tx.commit()?;
    Ok(SlotClaim::Booked)
}

pub fn get_appointment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let appt = conn
        .query_row(
            "SELECT id, patient_id, doctor_id, slot_id, reason, status, created_at
             FROM appointments WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok(Appointment {
                    id: parse_uuid(0, &row.get::<_, String>(0)?)?,
                    patient_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
                    doctor_id: parse_uuid(2, &row.get::<_, String>(2)?)?,
                    slot_id: parse_uuid(3, &row.get::<_, String>(3)?)?,
                    reason: row.get(4)?,
                    status: parse_enum(5, &row.get::<_, String>(5)?)?,
                    created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
                })
            },
        )
        .optional()?;
    Ok(appt)
}

/// Appointments where the user is either party, latest slot first.
pub fn list_appointments_for_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<AppointmentSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.patient_id, a.doctor_id, COALESCE(NULLIF(trim(p.name), ''), a.doctor_id),
                a.slot_id, s.start_time, s.end_time, a.reason, a.status
         FROM appointments a
         JOIN schedule_slots s ON s.id = a.slot_id
         LEFT JOIN profiles p ON p.id = a.doctor_id
         WHERE a.patient_id = ?1 OR a.doctor_id = ?1
         ORDER BY s.start_time DESC",
    )?;

    let rows = stmt.query_map(params![user_id.to_string()], |row| {
        Ok(AppointmentSummary {
            id: parse_uuid(0, &row.get::<_, String>(0)?)?,
            patient_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
            doctor_id: parse_uuid(2, &row.get::<_, String>(2)?)?,
            doctor_name: row.get(3)?,
            slot_id: parse_uuid(4, &row.get::<_, String>(4)?)?,
            start_time: parse_ts(5, &row.get::<_, String>(5)?)?,
            end_time: parse_ts(6, &row.get::<_, String>(6)?)?,
            reason: row.get(7)?,
            status: parse_enum(8, &row.get::<_, String>(8)?)?,
        })
    })?;

    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_doctor, make_slot, make_user};
    use crate::db::repository::get_slot;
    use crate::db::sqlite::{open_database, open_memory_database};
    use chrono::Utc;
    use std::sync::{Arc, Barrier};

    fn appointment(patient: Uuid, doctor: Uuid, slot: Uuid, reason: &str) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: doctor,
            slot_id: slot,
            reason: reason.into(),
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    fn count_appointments(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn booking_claims_slot() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let patient = make_user(&conn, "p@example.com");
        let slot = make_slot(&conn, &doctor, 0);

        let appt = appointment(patient, doctor, slot, "fever");
        assert_eq!(book_slot(&mut conn, &appt).unwrap(), SlotClaim::Booked);

        let stored = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(stored.slot_id, slot);
        assert_eq!(stored.status, AppointmentStatus::Scheduled);
        assert!(get_slot(&conn, &slot).unwrap().unwrap().is_booked);
    }

    #[test]
    fn second_booking_of_same_slot_is_rejected() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let p1 = make_user(&conn, "p1@example.com");
        let p2 = make_user(&conn, "p2@example.com");
        let slot = make_slot(&conn, &doctor, 0);

        let a1 = appointment(p1, doctor, slot, "fever");
        assert_eq!(book_slot(&mut conn, &a1).unwrap(), SlotClaim::Booked);

        let a2 = appointment(p2, doctor, slot, "cough");
        assert_eq!(book_slot(&mut conn, &a2).unwrap(), SlotClaim::AlreadyBooked);
        assert!(get_appointment(&conn, &a2.id).unwrap().is_none());
        assert_eq!(count_appointments(&conn), 1);
    }

    #[test]
    fn slot_of_another_doctor_is_missing() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let other = make_doctor(&conn, "o@example.com", "Dr. O");
        let patient = make_user(&conn, "p@example.com");
        let slot = make_slot(&conn, &doctor, 0);

        let appt = appointment(patient, other, slot, "fever");
        assert_eq!(book_slot(&mut conn, &appt).unwrap(), SlotClaim::Missing);
        assert!(!get_slot(&conn, &slot).unwrap().unwrap().is_booked);
    }

    #[test]
    fn failed_insert_rolls_back_slot_flip() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let slot = make_slot(&conn, &doctor, 0);

        // Unknown patient id trips the foreign key after the slot update.
        let appt = appointment(Uuid::new_v4(), doctor, slot, "fever");
        let err = book_slot(&mut conn, &appt).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert!(!get_slot(&conn, &slot).unwrap().unwrap().is_booked);
        assert_eq!(count_appointments(&conn), 0);
    }

    #[test]
    fn concurrent_bookings_yield_one_appointment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let (doctor, p1, p2, slot) = {
            let conn = open_database(&path).unwrap();
            let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
            let p1 = make_user(&conn, "p1@example.com");
            let p2 = make_user(&conn, "p2@example.com");
            let slot = make_slot(&conn, &doctor, 0);
            (doctor, p1, p2, slot)
        };

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [p1, p2]
            .into_iter()
            .map(|patient| {
                let barrier = Arc::clone(&barrier);
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut conn = open_database(&path).unwrap();
                    barrier.wait();
                    book_slot(&mut conn, &appointment(patient, doctor, slot, "race"))
                        .unwrap()
                })
            })
            .collect();

        let outcomes: Vec<SlotClaim> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outcomes.iter().filter(|o| **o == SlotClaim::Booked).count(), 1);
        assert_eq!(
            outcomes.iter().filter(|o| **o == SlotClaim::AlreadyBooked).count(),
            1
        );

        let conn = open_database(&path).unwrap();
        assert_eq!(count_appointments(&conn), 1);
    }

    #[test]
    fn appointments_listed_for_both_parties() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. Rajesh");
        let patient = make_user(&conn, "p@example.com");
        let early = make_slot(&conn, &doctor, 0);
        let late = make_slot(&conn, &doctor, 24);

        book_slot(&mut conn, &appointment(patient, doctor, early, "first")).unwrap();
        book_slot(&mut conn, &appointment(patient, doctor, late, "second")).unwrap();

        let for_patient = list_appointments_for_user(&conn, &patient).unwrap();
        assert_eq!(for_patient.len(), 2);
        assert_eq!(for_patient[0].reason, "second");
        assert_eq!(for_patient[0].doctor_name, "Dr. Rajesh");

        let for_doctor = list_appointments_for_user(&conn, &doctor).unwrap();
        assert_eq!(for_doctor.len(), 2);

        let stranger = make_user(&conn, "s@example.com");
        assert!(list_appointments_for_user(&conn, &stranger).unwrap().is_empty());
    }
}
