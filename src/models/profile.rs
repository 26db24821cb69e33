use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// One row per user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub language: String,
    pub address: Option<String>,
    pub specialty: Option<String>,
    pub doctor_languages: Option<String>,
    pub about: Option<String>,
    pub portfolio: Option<String>,
    pub company: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub avatar_url: Option<String>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub doctor_languages: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Doctor specialization row, kept in step with the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub specialty: Option<String>,
    pub languages: Vec<String>,
}

/// Doctor row joined with the profile's display name, as listed for booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
    pub languages: Vec<String>,
}
