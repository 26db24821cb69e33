use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{fmt_ts, parse_enum, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const PROFILE_COLUMNS: &str = "id, name, phone, role, language, address, specialty,
    doctor_languages, about, portfolio, company, github, linkedin, avatar_url,
    onboarding_completed, created_at, updated_at";

fn profile_from_row(row: &Row) -> Result<Profile, rusqlite::Error> {
    let role = match row.get::<_, Option<String>>(3)? {
        Some(raw) => Some(parse_enum::<Role>(3, &raw)?),
        None => None,
    };
    Ok(Profile {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        role,
        language: row.get(4)?,
        address: row.get(5)?,
        specialty: row.get(6)?,
        doctor_languages: row.get(7)?,
        about: row.get(8)?,
        portfolio: row.get(9)?,
        company: row.get(10)?,
        github: row.get(11)?,
        linkedin: row.get(12)?,
        avatar_url: row.get(13)?,
        onboarding_completed: row.get(14)?,
        created_at: parse_ts(15, &row.get::<_, String>(15)?)?,
        updated_at: parse_ts(16, &row.get::<_, String>(16)?)?,
    })
}

pub fn get_profile(conn: &Connection, user_id: &Uuid) -> Result<Option<Profile>, DatabaseError> {
    let profile = conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            params![user_id.to_string()],
            profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

/// Insert or update the profile keyed by `user_id`.
///
/// `None` fields keep the stored value. A stored role is never replaced;
/// the immutability trigger backs this up at the storage level.
/// `onboarding_completed` follows whether both name and role are present.
pub fn upsert_profile(
    conn: &Connection,
    user_id: &Uuid,
    fields: &ProfileFields,
    now: &DateTime<Utc>,
) -> Result<Profile, DatabaseError> {
    conn.execute(
        "INSERT INTO profiles (id, name, phone, role, language, address, specialty,
             doctor_languages, about, portfolio, company, github, linkedin, avatar_url,
             onboarding_completed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, COALESCE(?5, 'en'), ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
             0, ?15, ?15)
         ON CONFLICT(id) DO UPDATE SET
             name = COALESCE(?2, profiles.name),
             phone = COALESCE(?3, profiles.phone),
             role = COALESCE(profiles.role, ?4),
             language = COALESCE(?5, profiles.language),
             address = COALESCE(?6, profiles.address),
             specialty = COALESCE(?7, profiles.specialty),
             doctor_languages = COALESCE(?8, profiles.doctor_languages),
             about = COALESCE(?9, profiles.about),
             portfolio = COALESCE(?10, profiles.portfolio),
             company = COALESCE(?11, profiles.company),
             github = COALESCE(?12, profiles.github),
             linkedin = COALESCE(?13, profiles.linkedin),
             avatar_url = COALESCE(?14, profiles.avatar_url),
             updated_at = ?15",
        params![
            user_id.to_string(),
            fields.name,
            fields.phone,
            fields.role.map(|r| r.as_str()),
            fields.language,
            fields.address,
            fields.specialty,
            fields.doctor_languages,
            fields.about,
            fields.portfolio,
            fields.company,
            fields.github,
            fields.linkedin,
            fields.avatar_url,
            fmt_ts(now),
        ],
    )?;

    conn.execute(
        "UPDATE profiles
         SET onboarding_completed = (name IS NOT NULL AND trim(name) != '' AND role IS NOT NULL)
         WHERE id = ?1",
        params![user_id.to_string()],
    )?;

    get_profile(conn, user_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Profile".into(),
        id: user_id.to_string(),
    })
}

/// Create a minimal profile only when none exists. Returns true if created.
pub fn insert_profile_if_absent(
    conn: &Connection,
    user_id: &Uuid,
    name: &str,
    role: Role,
    now: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO profiles (id, name, role, language, onboarding_completed, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'en', 1, ?4, ?4)
         ON CONFLICT(id) DO NOTHING",
        params![user_id.to_string(), name, role.as_str(), fmt_ts(now)],
    )?;
    Ok(inserted > 0)
}
