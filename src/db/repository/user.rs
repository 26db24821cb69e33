use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{fmt_ts, parse_enum, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const USER_COLUMNS: &str = "id, email, provider, metadata, created_at";

fn user_from_row(row: &Row) -> Result<User, rusqlite::Error> {
    let metadata_raw: String = row.get(3)?;
    let metadata = serde_json::from_str(&metadata_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(User {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        email: row.get(1)?,
        provider: parse_enum(2, &row.get::<_, String>(2)?)?,
        metadata,
        created_at: parse_ts(4, &row.get::<_, String>(4)?)?,
    })
}

/// Insert an identity record. Email users carry a password credential.
pub fn insert_user(
    conn: &Connection,
    user: &User,
    credential: Option<&PasswordCredential>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, provider, password_hash, password_salt,
         password_iterations, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.email,
            user.provider.as_str(),
            credential.map(|c| c.hash.as_slice()),
            credential.map(|c| c.salt.as_slice()),
            credential.map(|c| c.iterations),
            serde_json::to_string(&user.metadata)?,
            fmt_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Case-insensitive lookup (the column collates NOCASE).
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_password_credential(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<PasswordCredential>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT password_hash, password_salt, password_iterations FROM users WHERE id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, Option<Vec<u8>>>(0)?,
                    row.get::<_, Option<Vec<u8>>>(1)?,
                    row.get::<_, Option<u32>>(2)?,
                ))
            },
        )
        .optional()?;

    Ok(match row {
        Some((Some(hash), Some(salt), Some(iterations))) => Some(PasswordCredential {
            hash,
            salt,
            iterations,
        }),
        _ => None,
    })
}

pub fn update_user_metadata(
    conn: &Connection,
    user_id: &Uuid,
    metadata: &UserMetadata,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET metadata = ?1 WHERE id = ?2",
        params![serde_json::to_string(metadata)?, user_id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}
