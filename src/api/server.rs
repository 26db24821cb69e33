//! HTTP server lifecycle: bind, spawn the axum server in the background,
//! return a handle with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to get server address: {0}")]
    LocalAddr(std::io::Error),
}

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    /// Shut down the server gracefully. In-flight requests complete.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

/// Start the API server on `addr`. Port 0 picks an ephemeral port; the
/// bound address is on the returned handle.
pub async fn start_api_server(
    core: Arc<CoreState>,
    addr: SocketAddr,
) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::identity::testing::FakeOAuthProvider;

    fn test_core(dir: &std::path::Path) -> Arc<CoreState> {
        Arc::new(CoreState::with_oauth_provider(
            AppConfig::for_tests(dir),
            Arc::new(FakeOAuthProvider::failing()),
        ))
    }

    fn localhost() -> SocketAddr {
        ([127, 0, 0, 1], 0).into()
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = start_api_server(test_core(tmp.path()), localhost())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        let url = format!("http://{}/api/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let protected = format!("http://{}/api/appointments", server.addr);
        let resp = reqwest::get(&protected).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn shutdown_twice_is_harmless() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = start_api_server(test_core(tmp.path()), localhost())
            .await
            .expect("server should start");
        server.shutdown();
        server.shutdown();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let core = test_core(tmp.path());
        let mut first = start_api_server(core.clone(), localhost()).await.unwrap();

        let err = start_api_server(core, first.addr).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
        first.shutdown();
    }
}
