use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

fn languages_from_json(idx: usize, raw: &str) -> Result<Vec<String>, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub fn upsert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, specialty, languages) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
             specialty = COALESCE(excluded.specialty, doctors.specialty),
             languages = excluded.languages",
        params![
            doctor.id.to_string(),
            doctor.specialty,
            serde_json::to_string(&doctor.languages)?,
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let doctor = conn
        .query_row(
            "SELECT id, specialty, languages FROM doctors WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok(Doctor {
                    id: parse_uuid(0, &row.get::<_, String>(0)?)?,
                    specialty: row.get(1)?,
                    languages: languages_from_json(2, &row.get::<_, String>(2)?)?,
                })
            },
        )
        .optional()?;
    Ok(doctor)
}

/// All doctors with a display name; the profile name falls back to the id.
pub fn list_doctors(conn: &Connection) -> Result<Vec<DoctorSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, COALESCE(NULLIF(trim(p.name), ''), d.id), d.specialty, d.languages
         FROM doctors d
         LEFT JOIN profiles p ON p.id = d.id
         ORDER BY p.name COLLATE NOCASE, d.id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(DoctorSummary {
            id: parse_uuid(0, &row.get::<_, String>(0)?)?,
            name: row.get(1)?,
            specialty: row.get(2)?,
            languages: languages_from_json(3, &row.get::<_, String>(3)?)?,
        })
    })?;

    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_doctor, make_user};
    use crate::db::repository::upsert_profile;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    #[test]
    fn doctors_listed_with_names() {
        let conn = open_memory_database().unwrap();
        make_doctor(&conn, "z@example.com", "Dr. Zoya");
        make_doctor(&conn, "a@example.com", "Dr. Arjun");

        let doctors = list_doctors(&conn).unwrap();
        assert_eq!(doctors.len(), 2);
        assert_eq!(doctors[0].name, "Dr. Arjun");
        assert_eq!(doctors[1].name, "Dr. Zoya");
        assert_eq!(doctors[0].languages, vec!["en".to_string()]);
    }

    #[test]
    fn unnamed_doctor_falls_back_to_id() {
        let conn = open_memory_database().unwrap();
        let id = make_user(&conn, "n@example.com");
        upsert_profile(
            &conn,
            &id,
            &ProfileFields {
                role: Some(Role::Doctor),
                ..Default::default()
            },
            &Utc::now(),
        )
        .unwrap();
        upsert_doctor(
            &conn,
            &Doctor {
                id,
                specialty: None,
                languages: vec![],
            },
        )
        .unwrap();

        let doctors = list_doctors(&conn).unwrap();
        assert_eq!(doctors[0].name, id.to_string());
    }

    #[test]
    fn upsert_keeps_specialty_when_absent() {
        let conn = open_memory_database().unwrap();
        let id = make_doctor(&conn, "k@example.com", "Dr. Kaur");
        upsert_doctor(
            &conn,
            &Doctor {
                id,
                specialty: None,
                languages: vec!["pa".into(), "hi".into()],
            },
        )
        .unwrap();

        let doctor = get_doctor(&conn, &id).unwrap().unwrap();
        assert_eq!(doctor.specialty.as_deref(), Some("General Medicine"));
        assert_eq!(doctor.languages, vec!["pa".to_string(), "hi".to_string()]);
    }

    #[test]
    fn doctor_row_requires_profile() {
        let conn = open_memory_database().unwrap();
        let err = upsert_doctor(
            &conn,
            &Doctor {
                id: Uuid::new_v4(),
                specialty: None,
                languages: vec![],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
