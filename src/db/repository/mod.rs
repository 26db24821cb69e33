//! Repository layer: entity-scoped database operations.
//!
//! Ids and timestamps are stored as text. Timestamps use RFC 3339 with
//! whole seconds and a `Z` suffix so that string order matches time order.

mod appointment;
mod audit;
mod consent;
mod doctor;
mod pending_profile;
mod prescription;
mod profile;
mod session;
mod slot;
mod user;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

pub use appointment::*;
pub use audit::*;
pub use consent::*;
pub use doctor::*;
pub use pending_profile::*;
pub use prescription::*;
pub use profile::*;
pub use session::*;
pub use slot::*;
pub use user::*;

/// Canonical text form of a timestamp column.
pub fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_uuid(idx: usize, raw: &str) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_enum<T>(idx: usize, raw: &str) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = super::DatabaseError>,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_text_round_trips() {
        let dt = Utc.with_ymd_and_hms(2030, 5, 17, 8, 30, 0).unwrap();
        let raw = fmt_ts(&dt);
        assert_eq!(raw, "2030-05-17T08:30:00Z");
        assert_eq!(parse_ts(0, &raw).unwrap(), dt);
    }

    #[test]
    fn timestamp_text_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2030, 1, 9, 23, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2030, 1, 10, 1, 0, 0).unwrap();
        assert!(fmt_ts(&early) < fmt_ts(&late));
    }

    #[test]
    fn bad_uuid_is_a_conversion_error() {
        let err = parse_uuid(3, "not-a-uuid").unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(3, _, _)));
    }
}
