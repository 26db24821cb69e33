use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "HealthConnect";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix shared by every environment variable the service reads.
const ENV_PREFIX: &str = "HEALTHCONNECT_";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
const DEFAULT_PENDING_PROFILE_TTL_HOURS: i64 = 72;
const DEFAULT_PASSWORD_ITERATIONS: u32 = 600_000;
const DEFAULT_MEDIA_TOKEN_TTL_SECS: i64 = 3600;
const DEFAULT_AUDIT_RETENTION_DAYS: i64 = 90;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Get the application data directory
/// ~/HealthConnect/ on all platforms, or the working directory when no
/// home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "healthconnect_lib=info,healthconnect=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Credentials for the real-time media provider. Both halves must be set
/// for join credentials to be issued.
#[derive(Debug, Clone, Default)]
pub struct MediaConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub ws_url: Option<String>,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_url: String,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Public base URL of the web client; used for CORS, redirects and
    /// prescription verification links.
    pub app_url: String,
    pub session_ttl_hours: i64,
    pub pending_profile_ttl_hours: i64,
    pub password_iterations: u32,
    pub audit_retention_days: i64,
    pub media: MediaConfig,
    pub oauth: OAuthConfig,
}

impl AppConfig {
    /// Read `HEALTHCONNECT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
        };

        let bind_addr: SocketAddr = parse_or(get("BIND"), "BIND", DEFAULT_BIND.parse().ok())?;
        let data_dir = get("DATA_DIR").map(PathBuf::from).unwrap_or_else(app_data_dir);
        let db_path = get("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("healthconnect.db"));
        let app_url = get("APP_URL")
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let media = MediaConfig {
            api_key: get("MEDIA_API_KEY"),
            api_secret: get("MEDIA_API_SECRET"),
            ws_url: get("MEDIA_WS_URL"),
            token_ttl_secs: parse_or(
                get("MEDIA_TOKEN_TTL_SECS"),
                "MEDIA_TOKEN_TTL_SECS",
                Some(DEFAULT_MEDIA_TOKEN_TTL_SECS),
            )?,
        };

        let oauth = OAuthConfig {
            client_id: get("OAUTH_CLIENT_ID"),
            client_secret: get("OAUTH_CLIENT_SECRET"),
            authorize_url: get("OAUTH_AUTHORIZE_URL")
                .unwrap_or_else(|| GOOGLE_AUTHORIZE_URL.to_string()),
            token_url: get("OAUTH_TOKEN_URL").unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            userinfo_url: get("OAUTH_USERINFO_URL")
                .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string()),
            redirect_url: get("OAUTH_REDIRECT_URL")
                .unwrap_or_else(|| format!("{app_url}/auth/callback")),
        };

        Ok(Self {
            bind_addr,
            data_dir,
            db_path,
            session_ttl_hours: parse_or(
                get("SESSION_TTL_HOURS"),
                "SESSION_TTL_HOURS",
                Some(DEFAULT_SESSION_TTL_HOURS),
            )?,
            pending_profile_ttl_hours: parse_or(
                get("PENDING_PROFILE_TTL_HOURS"),
                "PENDING_PROFILE_TTL_HOURS",
                Some(DEFAULT_PENDING_PROFILE_TTL_HOURS),
            )?,
            password_iterations: parse_or(
                get("PASSWORD_ITERATIONS"),
                "PASSWORD_ITERATIONS",
                Some(DEFAULT_PASSWORD_ITERATIONS),
            )?,
            audit_retention_days: parse_or(
                get("AUDIT_RETENTION_DAYS"),
                "AUDIT_RETENTION_DAYS",
                Some(DEFAULT_AUDIT_RETENTION_DAYS),
            )?,
            app_url,
            media,
            oauth,
        })
    }

    /// Configuration rooted at `data_dir`, with cheap password hashing.
    #[cfg(test)]
    pub fn for_tests(data_dir: &std::path::Path) -> Self {
        let dir = data_dir.to_string_lossy().to_string();
        let mut config = Self::from_lookup(|key| match key {
            "HEALTHCONNECT_DATA_DIR" => Some(dir.clone()),
            "HEALTHCONNECT_PASSWORD_ITERATIONS" => Some("1000".into()),
            "HEALTHCONNECT_MEDIA_API_KEY" => Some("APItestkey".into()),
            "HEALTHCONNECT_MEDIA_API_SECRET" => Some("test-secret-with-enough-entropy".into()),
            _ => None,
        })
        .unwrap();
        config.bind_addr = ([127, 0, 0, 1], 0).into();
        config
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    let invalid = |value: String| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{name}"),
        value,
    };
    match raw {
        Some(value) => value.trim().parse().map_err(|_| invalid(value)),
        None => default.ok_or_else(|| invalid(String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("HEALTHCONNECT_{k}"), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("HealthConnect"));
    }

    #[test]
    fn app_name_is_healthconnect() {
        assert_eq!(APP_NAME, "HealthConnect");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.app_url, "http://localhost:3000");
        assert_eq!(config.session_ttl_hours, 168);
        assert_eq!(config.media.token_ttl_secs, 3600);
        assert!(config.media.api_key.is_none());
        assert_eq!(config.oauth.redirect_url, "http://localhost:3000/auth/callback");
        assert!(config.db_path.ends_with("healthconnect.db"));
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("BIND", "0.0.0.0:9000"),
            ("DATA_DIR", "/srv/hc"),
            ("APP_URL", "https://care.example.org/"),
            ("PASSWORD_ITERATIONS", "2000"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/srv/hc/healthconnect.db"));
        assert_eq!(config.app_url, "https://care.example.org");
        assert_eq!(config.password_iterations, 2000);
    }

    #[test]
    fn invalid_number_is_reported() {
        let err = config_from(&[("SESSION_TTL_HOURS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("HEALTHCONNECT_SESSION_TTL_HOURS"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("APP_URL", "  ")]).unwrap();
        assert_eq!(config.app_url, "http://localhost:3000");
    }

    #[test]
    fn default_filter_targets_crate() {
        assert!(default_log_filter().contains("healthconnect_lib=info"));
    }
}
