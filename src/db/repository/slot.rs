use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{fmt_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::ScheduleSlot;

fn slot_from_row(row: &Row) -> Result<ScheduleSlot, rusqlite::Error> {
    Ok(ScheduleSlot {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        doctor_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        start_time: parse_ts(2, &row.get::<_, String>(2)?)?,
        end_time: parse_ts(3, &row.get::<_, String>(3)?)?,
        is_booked: row.get(4)?,
    })
}

pub fn insert_slot(conn: &Connection, slot: &ScheduleSlot) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO schedule_slots (id, doctor_id, start_time, end_time, is_booked)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            slot.id.to_string(),
            slot.doctor_id.to_string(),
            fmt_ts(&slot.start_time),
            fmt_ts(&slot.end_time),
            slot.is_booked,
        ],
    )?;
    Ok(())
}

pub fn get_slot(conn: &Connection, id: &Uuid) -> Result<Option<ScheduleSlot>, DatabaseError> {
    let slot = conn
        .query_row(
            "SELECT id, doctor_id, start_time, end_time, is_booked
             FROM schedule_slots WHERE id = ?1",
            params![id.to_string()],
            slot_from_row,
        )
        .optional()?;
    Ok(slot)
}

/// Unbooked slots of one doctor, earliest first.
pub fn list_open_slots(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<ScheduleSlot>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_id, start_time, end_time, is_booked
         FROM schedule_slots
         WHERE doctor_id = ?1 AND is_booked = 0
         ORDER BY start_time ASC",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string()], slot_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
