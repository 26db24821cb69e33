//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::error::ServiceError;
use crate::models::User;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "hc_session";

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }

    /// Run `work` on the blocking pool with a fresh connection.
    pub async fn with_db<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Connection, &CoreState) -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
            let mut conn = core.open_db()?;
            Ok(work(&mut conn, &*core)?)
        })
        .await?
    }
}

// ═══════════════════════════════════════════════════════════
// User context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user: User,
    /// Raw session token the request presented.
    pub token: String,
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        if self.windows.len() > 10_000 {
            self.windows.retain(|_, hits| {
                hits.last()
                    .is_some_and(|ts| now.duration_since(*ts) < Duration::from_secs(3600))
            });
        }
        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_under_limit() {
        let mut limiter = RateLimiter::new();
        assert!(limiter.check("client-1").is_ok());
        assert!(limiter.check("client-1").is_ok());
    }

    #[test]
    fn rate_limiter_rejects_over_per_minute() {
        let mut limiter = RateLimiter::with_limits(2, 1000);
        assert!(limiter.check("client-1").is_ok());
        assert!(limiter.check("client-1").is_ok());
        assert_eq!(limiter.check("client-1"), Err(60));
    }

    #[test]
    fn rate_limiter_rejects_over_per_hour() {
        let mut limiter = RateLimiter::with_limits(100, 3);
        for _ in 0..3 {
            assert!(limiter.check("client-1").is_ok());
        }
        assert_eq!(limiter.check("client-1"), Err(3600));
    }

    #[test]
    fn rate_limiter_isolates_clients() {
        let mut limiter = RateLimiter::with_limits(1, 1000);
        assert!(limiter.check("client-1").is_ok());
        assert!(limiter.check("client-2").is_ok());
        assert_eq!(limiter.check("client-1"), Err(60));
    }
}
