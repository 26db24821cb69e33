use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

/// Insert a prescription with its items in one transaction.
pub fn insert_prescription(
    conn: &mut Connection,
    prescription: &Prescription,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO prescriptions (id, doctor_id, patient_id, appointment_id, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            prescription.id.to_string(),
            prescription.doctor_id.to_string(),
            prescription.patient_id.to_string(),
            prescription.appointment_id.map(|id| id.to_string()),
            prescription.note,
            fmt_ts(&prescription.created_at),
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO prescription_items (id, prescription_id, position, medication_name,
             dosage, frequency, duration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (position, item) in prescription.items.iter().enumerate() {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                prescription.id.to_string(),
                position as i64,
                item.medication_name,
                item.dosage,
                item.frequency,
                item.duration,
            ])?;
        }
    }

    tx.commit()?;
    Ok(())
}

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let header = conn
        .query_row(
            "SELECT id, doctor_id, patient_id, appointment_id, note, created_at
             FROM prescriptions WHERE id = ?1",
            params![id.to_string()],
            |row| {
                let appointment_id = match row.get::<_, Option<String>>(3)? {
                    Some(raw) => Some(parse_uuid(3, &raw)?),
                    None => None,
                };
                Ok(Prescription {
                    id: parse_uuid(0, &row.get::<_, String>(0)?)?,
                    doctor_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
                    patient_id: parse_uuid(2, &row.get::<_, String>(2)?)?,
                    appointment_id,
                    note: row.get(4)?,
                    created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
                    items: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut prescription) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT medication_name, dosage, frequency, duration
         FROM prescription_items WHERE prescription_id = ?1
         ORDER BY position",
    )?;
    let items = stmt.query_map(params![id.to_string()], |row| {
        Ok(PrescriptionItem {
            medication_name: row.get(0)?,
            dosage: row.get(1)?,
            frequency: row.get(2)?,
            duration: row.get(3)?,
        })
    })?;
    prescription.items = items.collect::<Result<Vec<_>, _>>()?;

    Ok(Some(prescription))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_doctor, make_user};
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    #[test]
    fn prescription_items_keep_order() {
        let mut conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@example.com", "Dr. D");
        let patient = make_user(&conn, "p@example.com");
        let prescription = Prescription {
            id: Uuid::new_v4(),
            doctor_id: doctor,
            patient_id: patient,
            appointment_id: None,
            note: Some("Rest well".into()),
            created_at: Utc::now(),
            items: vec![
                PrescriptionItem {
                    medication_name: "Paracetamol 500mg".into(),
                    dosage: "500mg".into(),
                    frequency: "3 times daily".into(),
                    duration: "5 days".into(),
                },
                PrescriptionItem {
                    medication_name: "Cough Syrup".into(),
                    dosage: "10ml".into(),
                    frequency: "2 times daily".into(),
                    duration: "7 days".into(),
                },
            ],
        };
        insert_prescription(&mut conn, &prescription).unwrap();

        let stored = get_prescription(&conn, &prescription.id).unwrap().unwrap();
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].medication_name, "Paracetamol 500mg");
        assert_eq!(stored.items[1].medication_name, "Cough Syrup");
        assert_eq!(stored.note.as_deref(), Some("Rest well"));
    }

    #[test]
    fn missing_prescription_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_prescription(&conn, &Uuid::new_v4()).unwrap().is_none());
    }
}
