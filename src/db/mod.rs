pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("Corrupt row data: {0}")]
    CorruptRow(String),
}

impl From<rusqlite::Error> for DatabaseError {
    /// Constraint failures keep the store's own message so callers can
    /// surface it verbatim.
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DatabaseError::ConstraintViolation(
                    msg.clone().unwrap_or_else(|| err.to_string()),
                )
            }
            _ => DatabaseError::Sqlite(err),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::CorruptRow(err.to_string())
    }
}
