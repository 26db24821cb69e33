//! Shared application state.
//!
//! `CoreState` is built once at startup, wrapped in `Arc` and handed to
//! every request through the API context. It holds no connection: each
//! unit of work opens its own SQLite handle via [`CoreState::open_db`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db;
use crate::identity::{HttpOAuthProvider, OAuthProvider};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    /// Identity provider used by the OAuth sign-in flow.
    pub oauth: Arc<dyn OAuthProvider>,
    /// Audit log for authenticated API access.
    audit: AuditLogger,
}

impl CoreState {
    /// State wired to the configured OAuth provider. A provider without
    /// client credentials still starts; OAuth calls then fail individually.
    pub fn new(config: AppConfig) -> Self {
        let oauth: Arc<dyn OAuthProvider> = Arc::new(HttpOAuthProvider::new(config.oauth.clone()));
        Self::with_oauth_provider(config, oauth)
    }

    pub fn with_oauth_provider(config: AppConfig, oauth: Arc<dyn OAuthProvider>) -> Self {
        Self {
            config,
            oauth,
            audit: AuditLogger::new(),
        }
    }

    /// Open a connection to the application database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(db::open_database(&self.config.db_path)?)
    }

    /// Log an access event. Auto-flushes to DB when the buffer is full.
    pub fn log_access(&self, source: AccessSource, action: &str, entity: &str) {
        let needs_flush = self.audit.log(source, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush the audit buffer and drop entries past the retention window.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        if let Err(e) =
            db::repository::prune_audit_log(&conn, &Utc::now(), self.config.audit_retention_days)
        {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(())
    }

    /// Startup and shutdown housekeeping: expired sessions, expired pending
    /// profiles, buffered audit entries.
    pub fn run_maintenance(&self, now: &DateTime<Utc>) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        let sessions = db::repository::prune_sessions(&conn, now)?;
        let pending = db::repository::prune_pending_profiles(&conn, now)?;
        if sessions > 0 || pending > 0 {
            tracing::info!(sessions, pending, "Pruned expired records");
        }
        drop(conn);
        self.flush_and_prune_audit()
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Access source tracking
// ═══════════════════════════════════════════════════════════

/// Who made a request, for audit logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSource {
    Anonymous,
    User { user_id: Uuid },
}

impl std::fmt::Display for AccessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::User { user_id } => write!(f, "user:{user_id}"),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub source: AccessSource,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Buffer an access event.
    /// Returns `true` once the buffer has reached the flush threshold.
    pub fn log(&self, source: AccessSource, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: Utc::now(),
                source,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Write buffered entries to SQLite. Returns how many were written.
    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let tuples: Vec<(String, String, String, String)> = entries
            .iter()
            .map(|e| {
                (
                    db::repository::fmt_ts(&e.timestamp),
                    e.source.to_string(),
                    e.action.clone(),
                    e.entity.clone(),
                )
            })
            .collect();

        let count = tuples.len();
        db::repository::insert_audit_entries(conn, &tuples)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}
