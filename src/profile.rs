//! Canonical profile store.
//!
//! Every endpoint that writes a profile goes through [`upsert_profile`]:
//! server-side validation, first-write-wins role, identity metadata
//! fallbacks and the soft doctor-row sync all live here.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository;
use crate::error::ServiceError;
use crate::models::*;

pub const MAX_NAME_CHARS: usize = 120;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()-]{6,20}$").unwrap());
static LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[A-Z]{2})?$").unwrap());

/// Identity fields shown next to the profile.
#[derive(Debug, Clone, Serialize)]
pub struct UserBasics {
    pub id: Uuid,
    pub email: String,
    pub metadata: UserMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user: UserBasics,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStatus {
    pub has_profile: bool,
    pub is_complete: bool,
    pub onboarding_completed: bool,
    /// Share of tracked fields that are filled, 0..=100.
    pub completeness: u8,
    pub redirect: &'static str,
}

/// Trim every field; blank strings count as absent.
fn normalize(mut fields: ProfileFields) -> ProfileFields {
    fn clean(value: &mut Option<String>) {
        *value = value
            .take()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    for value in [
        &mut fields.name,
        &mut fields.phone,
        &mut fields.language,
        &mut fields.address,
        &mut fields.specialty,
        &mut fields.doctor_languages,
        &mut fields.about,
        &mut fields.portfolio,
        &mut fields.company,
        &mut fields.github,
        &mut fields.linkedin,
        &mut fields.avatar_url,
    ] {
        clean(value);
    }
    fields
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://"))
        && !value.contains(char::is_whitespace)
        && value.len() > "https://".len()
}

/// Reject malformed values before they reach the store.
pub fn validate_fields(fields: &ProfileFields) -> Result<(), ServiceError> {
    if let Some(name) = &fields.name {
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(ServiceError::InvalidInput(format!(
                "Name must be at most {MAX_NAME_CHARS} characters"
            )));
        }
    }
    if let Some(phone) = &fields.phone {
        if !PHONE_RE.is_match(phone) {
            return Err(ServiceError::InvalidInput("Invalid phone number".into()));
        }
    }
    if let Some(language) = &fields.language {
        if !LANGUAGE_RE.is_match(language) {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid language code: {language}"
            )));
        }
    }
    for (label, value) in [
        ("portfolio", &fields.portfolio),
        ("github", &fields.github),
        ("linkedin", &fields.linkedin),
        ("avatar_url", &fields.avatar_url),
    ] {
        if let Some(url) = value {
            if !is_http_url(url) {
                return Err(ServiceError::InvalidInput(format!(
                    "{label} must be an http(s) URL"
                )));
            }
        }
    }
    Ok(())
}

/// Languages column of the doctor row, from the comma-separated profile field.
fn doctor_languages(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Insert or update the caller's profile.
pub fn upsert_profile(
    conn: &Connection,
    user: &User,
    fields: ProfileFields,
    now: &DateTime<Utc>,
) -> Result<Profile, ServiceError> {
    let mut fields = normalize(fields);
    validate_fields(&fields)?;

    let existing = repository::get_profile(conn, &user.id)?;

    fields.role = existing
        .as_ref()
        .and_then(|p| p.role)
        .or(fields.role)
        .or(user.metadata.role)
        .or(Some(Role::Patient));

    if existing.as_ref().and_then(|p| p.name.as_ref()).is_none() && fields.name.is_none() {
        fields.name = user
            .metadata
            .name
            .clone()
            .or_else(|| user.metadata.full_name.clone());
    }
    if existing.as_ref().and_then(|p| p.phone.as_ref()).is_none() && fields.phone.is_none() {
        fields.phone = user.metadata.phone.clone();
    }

    let profile = repository::upsert_profile(conn, &user.id, &fields, now)?;

    if profile.role == Some(Role::Doctor) {
        let doctor = Doctor {
            id: user.id,
            specialty: profile.specialty.clone(),
            languages: doctor_languages(profile.doctor_languages.as_deref()),
        };
        if let Err(e) = repository::upsert_doctor(conn, &doctor) {
            tracing::warn!(user_id = %user.id, error = %e, "Doctor row sync failed");
        }
    }

    tracing::info!(user_id = %user.id, role = ?profile.role, "Profile saved");
    Ok(profile)
}

/// The caller's profile, provided it carries the doctor role. Makes sure
/// the doctor row exists so slots and prescriptions can reference it.
pub fn require_doctor(conn: &Connection, user_id: &Uuid) -> Result<Profile, ServiceError> {
    let profile = match repository::get_profile(conn, user_id)? {
        Some(p) if p.role == Some(Role::Doctor) => p,
        _ => return Err(ServiceError::Forbidden("Doctor role required".into())),
    };
    if repository::get_doctor(conn, user_id)?.is_none() {
        repository::upsert_doctor(
            conn,
            &Doctor {
                id: *user_id,
                specialty: profile.specialty.clone(),
                languages: doctor_languages(profile.doctor_languages.as_deref()),
            },
        )?;
    }
    Ok(profile)
}

pub fn get_profile(conn: &Connection, user: &User) -> Result<ProfileView, ServiceError> {
    Ok(ProfileView {
        user: UserBasics {
            id: user.id,
            email: user.email.clone(),
            metadata: user.metadata.clone(),
        },
        profile: repository::get_profile(conn, &user.id)?,
    })
}

/// Where a freshly signed-in user should land.
pub fn redirect_for(profile: Option<&Profile>) -> &'static str {
    match profile {
        Some(p) if p.name.is_some() && p.role.is_some() => "/",
        _ => "/profile",
    }
}

fn completeness(profile: &Profile, email: &str) -> u8 {
    let mut tracked = vec![
        profile.name.is_some(),
        profile.phone.is_some(),
        profile.role.is_some(),
        !email.is_empty(),
        profile.address.is_some(),
        profile.about.is_some(),
        profile.avatar_url.is_some(),
    ];
    if profile.role == Some(Role::Doctor) {
        tracked.push(profile.specialty.is_some());
    }
    let filled = tracked.iter().filter(|f| **f).count();
    ((filled as f64 / tracked.len() as f64) * 100.0).round() as u8
}

pub fn profile_status(conn: &Connection, user: &User) -> Result<ProfileStatus, ServiceError> {
    let profile = repository::get_profile(conn, &user.id)?;
    Ok(match &profile {
        Some(p) => ProfileStatus {
            has_profile: true,
            is_complete: p.name.is_some() && p.role.is_some(),
            onboarding_completed: p.onboarding_completed,
            completeness: completeness(p, &user.email),
            redirect: redirect_for(Some(p)),
        },
        None => ProfileStatus {
            has_profile: false,
            is_complete: false,
            onboarding_completed: false,
            completeness: 0,
            redirect: redirect_for(None),
        },
    })
}

/// Park sign-up profile fields until the first sign-in.
pub fn save_pending_profile(
    conn: &Connection,
    user_id: &Uuid,
    fields: ProfileFields,
    ttl_hours: i64,
    now: &DateTime<Utc>,
) -> Result<(), ServiceError> {
    let fields = normalize(fields);
    validate_fields(&fields)?;
    repository::save_pending_profile(conn, user_id, &fields, &(*now + Duration::hours(ttl_hours)))?;
    Ok(())
}

/// Apply and discard a parked sign-up profile, if one is still valid.
pub fn resume_pending_profile(
    conn: &Connection,
    user: &User,
    now: &DateTime<Utc>,
) -> Result<Option<Profile>, ServiceError> {
    match repository::take_pending_profile(conn, &user.id, now)? {
        Some(fields) => {
            tracing::info!(user_id = %user.id, "Applying pending profile");
            upsert_profile(conn, user, fields, now).map(Some)
        }
        None => Ok(None),
    }
}
