//! API endpoint handlers.
//!
//! Handlers parse the request, hand the work to the service layer on the
//! blocking pool and shape the response. No business rules live here.

pub mod appointments;
pub mod auth;
pub mod consultation;
pub mod doctors;
pub mod health;
pub mod pharmacy;
pub mod prescriptions;
pub mod profile;
pub mod records;
pub mod symptoms;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse an id taken from the path or query string.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest("Invalid ID format".into()))
}
