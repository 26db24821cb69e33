use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{fmt_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::SessionRecord;

/// Store a session keyed by the SHA-256 hash of its bearer token.
pub fn insert_session(
    conn: &Connection,
    token_hash: &[u8],
    session: &SessionRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at, revoked)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            token_hash,
            session.user_id.to_string(),
            fmt_ts(&session.created_at),
            fmt_ts(&session.expires_at),
            session.revoked,
        ],
    )?;
    Ok(())
}

pub fn get_session(
    conn: &Connection,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>, DatabaseError> {
    let session = conn
        .query_row(
            "SELECT user_id, created_at, expires_at, revoked FROM sessions WHERE token_hash = ?1",
            params![token_hash],
            |row| {
                Ok(SessionRecord {
                    user_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
                    created_at: parse_ts(1, &row.get::<_, String>(1)?)?,
                    expires_at: parse_ts(2, &row.get::<_, String>(2)?)?,
                    revoked: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(session)
}

/// Mark a session revoked. Returns false when no live session matched.
pub fn revoke_session(conn: &Connection, token_hash: &[u8]) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE sessions SET revoked = 1 WHERE token_hash = ?1 AND revoked = 0",
        params![token_hash],
    )?;
    Ok(changed > 0)
}

/// Remove sessions that expired before `now` or were revoked.
pub fn prune_sessions(conn: &Connection, now: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE revoked = 1 OR expires_at < ?1",
        params![fmt_ts(now)],
    )?;
    Ok(deleted)
}
