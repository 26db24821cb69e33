use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::ProfileFields;

/// Profile fields captured at sign-up, applied at first sign-in.
pub fn save_pending_profile(
    conn: &Connection,
    user_id: &Uuid,
    fields: &ProfileFields,
    expires_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pending_profiles (user_id, payload, expires_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET payload = excluded.payload,
             expires_at = excluded.expires_at",
        params![
            user_id.to_string(),
            serde_json::to_string(fields)?,
            fmt_ts(expires_at),
        ],
    )?;
    Ok(())
}

/// Remove and return the pending profile. Expired rows are removed
/// and reported as absent.
pub fn take_pending_profile(
    conn: &Connection,
    user_id: &Uuid,
    now: &DateTime<Utc>,
) -> Result<Option<ProfileFields>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT payload, expires_at FROM pending_profiles WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    parse_ts(1, &row.get::<_, String>(1)?)?,
                ))
            },
        )
        .optional()?;

    let Some((payload, expires_at)) = row else {
        return Ok(None);
    };

    conn.execute(
        "DELETE FROM pending_profiles WHERE user_id = ?1",
        params![user_id.to_string()],
    )?;

    if expires_at <= *now {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&payload)?))
}

/// Delete pending profiles whose expiry has passed.
pub fn prune_pending_profiles(conn: &Connection, now: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM pending_profiles WHERE expires_at <= ?1",
        params![fmt_ts(now)],
    )?;
    Ok(deleted)
}
