//! Session and identity adapter.
//!
//! Email/password accounts, OAuth code exchange, opaque server-side
//! sessions and the post-login redirect decision. Raw session tokens are
//! handed to the client once; only their SHA-256 hash is stored.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AppConfig, OAuthConfig};
use crate::crypto::{self, MIN_PASSWORD_LENGTH};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::*;
use crate::profile;

/// Timeout for each call to the identity provider.
const PROVIDER_TIMEOUT_SECS: u64 = 15;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password must be at least {} characters", MIN_PASSWORD_LENGTH)]
    WeakPassword,
    #[error("User already registered")]
    AlreadyRegistered,
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Session expired or invalid")]
    InvalidSession,
    #[error("OAuth provider is not configured")]
    ProviderNotConfigured,
    #[error("OAuth provider error: {0}")]
    Provider(String),
}

impl From<IdentityError> for ServiceError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidEmail | IdentityError::WeakPassword => {
                ServiceError::InvalidInput(err.to_string())
            }
            IdentityError::AlreadyRegistered => ServiceError::ValidationFailed(err.to_string()),
            IdentityError::InvalidCredentials | IdentityError::InvalidSession => {
                ServiceError::Unauthenticated(err.to_string())
            }
            IdentityError::ProviderNotConfigured | IdentityError::Provider(_) => {
                ServiceError::ExternalService(err.to_string())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// OAuth provider seam
// ═══════════════════════════════════════════════════════════

/// Identity returned by the provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OAuthIdentity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Authorization-code exchange with an external identity provider.
///
/// Implementations block; callers run them on the blocking pool.
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to. `state` round-trips to the callback.
    fn authorize_url(&self, state: &str) -> Result<String, IdentityError>;

    fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, IdentityError>;
}

/// Standard OAuth 2.0 / OpenID Connect provider over HTTP.
pub struct HttpOAuthProvider {
    config: OAuthConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl HttpOAuthProvider {
    pub fn new(config: OAuthConfig) -> Self {
        Self { config }
    }

    fn credentials(&self) -> Result<(&str, &str), IdentityError> {
        match (&self.config.client_id, &self.config.client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(IdentityError::ProviderNotConfigured),
        }
    }

    fn client(&self) -> Result<reqwest::blocking::Client, IdentityError> {
        reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| IdentityError::Provider(e.to_string()))
    }
}

impl OAuthProvider for HttpOAuthProvider {
    fn authorize_url(&self, state: &str) -> Result<String, IdentityError> {
        let (client_id, _) = self.credentials()?;
        let url = reqwest::Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| IdentityError::Provider(format!("Invalid authorize URL: {e}")))?;
        Ok(url.to_string())
    }

    fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, IdentityError> {
        let (client_id, client_secret) = self.credentials()?;
        let client = self.client()?;

        let response = client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Provider(format!(
                "Token exchange failed with status {}",
                status.as_u16()
            )));
        }
        let token: TokenResponse = response
            .json()
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        let response = client
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .map_err(|e| IdentityError::Provider(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Provider(format!(
                "User info request failed with status {}",
                status.as_u16()
            )));
        }
        response
            .json()
            .map_err(|e| IdentityError::Provider(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════
// Accounts and sessions
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// A freshly issued session. `token` is the only copy of the raw secret.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
    pub redirect: &'static str,
}

fn normalize_email(email: &str) -> Result<String, IdentityError> {
    let email = email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(IdentityError::InvalidEmail);
    }
    Ok(email)
}

/// Create an email account and park the requested profile until the
/// first sign-in. No session is issued here.
pub fn sign_up(
    conn: &Connection,
    config: &AppConfig,
    request: SignUpRequest,
    now: &DateTime<Utc>,
) -> Result<User, ServiceError> {
    let email = normalize_email(&request.email)?;
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::WeakPassword.into());
    }
    if repository::get_user_by_email(conn, &email)?.is_some() {
        return Err(IdentityError::AlreadyRegistered.into());
    }

    let pending = ProfileFields {
        name: request.name.clone(),
        phone: request.phone.clone(),
        role: request.role,
        ..Default::default()
    };
    profile::validate_fields(&pending)?;

    let user = User {
        id: Uuid::new_v4(),
        email,
        provider: AuthProvider::Email,
        metadata: UserMetadata {
            name: request.name,
            full_name: None,
            phone: request.phone,
            role: request.role,
        },
        created_at: *now,
    };
    let credential = crypto::hash_password(request.password, config.password_iterations);
    repository::insert_user(conn, &user, Some(&credential))?;
    profile::save_pending_profile(conn, &user.id, pending, config.pending_profile_ttl_hours, now)?;

    tracing::info!(user_id = %user.id, "User signed up");
    Ok(user)
}

fn issue_session(
    conn: &Connection,
    config: &AppConfig,
    user: User,
    redirect: &'static str,
    now: &DateTime<Utc>,
) -> Result<IssuedSession, ServiceError> {
    let token = crypto::generate_token();
    let expires_at = *now + Duration::hours(config.session_ttl_hours);
    repository::insert_session(
        conn,
        &crypto::hash_token(&token),
        &SessionRecord {
            user_id: user.id,
            created_at: *now,
            expires_at,
            revoked: false,
        },
    )?;
    Ok(IssuedSession {
        token,
        user,
        expires_at,
        redirect,
    })
}

/// Password sign-in. Applies any pending sign-up profile.
pub fn sign_in_password(
    conn: &Connection,
    config: &AppConfig,
    email: &str,
    password: String,
    now: &DateTime<Utc>,
) -> Result<IssuedSession, ServiceError> {
    let email = normalize_email(email).map_err(|_| IdentityError::InvalidCredentials)?;
    let user = repository::get_user_by_email(conn, &email)?
        .ok_or(IdentityError::InvalidCredentials)?;
    let credential = repository::get_password_credential(conn, &user.id)?
        .ok_or(IdentityError::InvalidCredentials)?;
    if !crypto::verify_password(password, &credential) {
        tracing::info!(user_id = %user.id, "Sign-in rejected");
        return Err(IdentityError::InvalidCredentials.into());
    }

    profile::resume_pending_profile(conn, &user, now)?;
    let redirect = post_login_redirect(conn, &user.id)?;

    tracing::info!(user_id = %user.id, "User signed in");
    issue_session(conn, config, user, redirect, now)
}

/// A started provider flow. `state` is bound to the browser and must come
/// back unchanged on the callback.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub url: String,
    pub state: String,
}

/// URL that starts the provider flow, with a fresh random `state`.
pub fn oauth_authorize_url(provider: &dyn OAuthProvider) -> Result<OAuthStart, ServiceError> {
    let state = crypto::generate_token();
    let url = provider.authorize_url(&state)?;
    Ok(OAuthStart { url, state })
}

/// Whether the callback echoed the state minted for this browser.
pub fn oauth_state_matches(expected: &str, presented: Option<&str>) -> bool {
    match presented {
        Some(presented) if !expected.is_empty() => crypto::tokens_match(expected, presented),
        _ => false,
    }
}

/// Display name for an OAuth user: provider name, then email local part.
fn oauth_display_name(identity: &OAuthIdentity) -> String {
    identity
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| {
            identity
                .email
                .split('@')
                .next()
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "User".to_string())
}

/// Complete the provider flow: find or create the user, create the
/// profile with the requested role only when none exists, issue a session.
pub fn oauth_callback(
    conn: &Connection,
    config: &AppConfig,
    provider: &dyn OAuthProvider,
    code: &str,
    role: Option<Role>,
    now: &DateTime<Utc>,
) -> Result<IssuedSession, ServiceError> {
    if code.trim().is_empty() {
        return Err(ServiceError::InvalidInput("Missing authorization code".into()));
    }
    let identity = provider.exchange_code(code)?;
    let email = normalize_email(&identity.email)
        .map_err(|_| IdentityError::Provider("Provider returned no usable email".into()))?;
    let role = role.unwrap_or(Role::Patient);
    let name = oauth_display_name(&identity);

    let user = match repository::get_user_by_email(conn, &email)? {
        Some(user) => user,
        None => {
            let user = User {
                id: Uuid::new_v4(),
                email,
                provider: AuthProvider::Google,
                metadata: UserMetadata {
                    name: None,
                    full_name: identity.name.clone(),
                    phone: identity.phone_number.clone(),
                    role: Some(role),
                },
                created_at: *now,
            };
            repository::insert_user(conn, &user, None)?;
            user
        }
    };

    if repository::insert_profile_if_absent(conn, &user.id, &name, role, now)? {
        tracing::info!(user_id = %user.id, role = %role, "Profile created from OAuth sign-in");
        if role == Role::Doctor {
            let doctor = Doctor {
                id: user.id,
                specialty: None,
                languages: Vec::new(),
            };
            if let Err(e) = repository::upsert_doctor(conn, &doctor) {
                tracing::warn!(user_id = %user.id, error = %e, "Doctor row sync failed");
            }
        }
    }

    tracing::info!(user_id = %user.id, "User signed in with OAuth");
    issue_session(conn, config, user, "/", now)
}

/// Resolve a bearer token to its user.
pub fn current_session(
    conn: &Connection,
    token: &str,
    now: &DateTime<Utc>,
) -> Result<User, ServiceError> {
    let session = repository::get_session(conn, &crypto::hash_token(token))?
        .ok_or(IdentityError::InvalidSession)?;
    if session.revoked || session.expires_at <= *now {
        return Err(IdentityError::InvalidSession.into());
    }
    let user = repository::get_user(conn, &session.user_id)?.ok_or(IdentityError::InvalidSession)?;
    Ok(user)
}

/// Revoke the session behind `token`. Signing out twice is not an error.
pub fn sign_out(conn: &Connection, token: &str) -> Result<(), ServiceError> {
    if repository::revoke_session(conn, &crypto::hash_token(token))? {
        tracing::info!("Session revoked");
    }
    Ok(())
}

/// `/profile` until the user has a profile with name and role, `/` after.
pub fn post_login_redirect(conn: &Connection, user_id: &Uuid) -> Result<&'static str, ServiceError> {
    let stored = repository::get_profile(conn, user_id)?;
    Ok(profile::redirect_for(stored.as_ref()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Provider double that answers every exchange with one identity.
    pub struct FakeOAuthProvider {
        pub identity: Mutex<Option<OAuthIdentity>>,
    }

    impl FakeOAuthProvider {
        pub fn returning(email: &str, name: Option<&str>) -> Self {
            Self {
                identity: Mutex::new(Some(OAuthIdentity {
                    email: email.into(),
                    name: name.map(str::to_string),
                    phone_number: None,
                })),
            }
        }

        pub fn failing() -> Self {
            Self {
                identity: Mutex::new(None),
            }
        }
    }

    impl OAuthProvider for FakeOAuthProvider {
        fn authorize_url(&self, state: &str) -> Result<String, IdentityError> {
            Ok(format!("https://idp.test/authorize?state={state}"))
        }

        fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, IdentityError> {
            if code == "bad" {
                return Err(IdentityError::Provider("invalid_grant".into()));
            }
            self.identity
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| IdentityError::Provider("invalid_grant".into()))
        }
    }
}
