pub mod api;
pub mod booking; // Doctor directory, slots, atomic booking
pub mod config;
pub mod consultation; // Consent + media join credentials
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod error;
pub mod identity; // Accounts, sessions, OAuth
pub mod models;
pub mod pharmacy;
pub mod prescription; // e-Prescriptions + PDF
pub mod profile;
pub mod records;
pub mod symptom_checker;

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError};
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(std::io::Error),
}

/// Run housekeeping on the blocking pool.
async fn maintenance(core: Arc<CoreState>) -> Result<(), StartupError> {
    tokio::task::spawn_blocking(move || core.run_maintenance(&Utc::now())).await??;
    Ok(())
}

/// Start the server and block until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let core = Arc::new(CoreState::new(config));

    // Opens the database, which applies pending migrations.
    maintenance(core.clone()).await?;

    let mut server = api::start_api_server(core.clone(), bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await.map_err(StartupError::Signal)?;
    server.shutdown();

    if let Err(e) = maintenance(core).await {
        tracing::warn!("Shutdown maintenance failed: {e}");
    }
    Ok(())
}
