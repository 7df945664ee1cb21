//! API server
//!
//! Wires the matchmaking core to its HTTP/WebSocket surface and runs it
//! with graceful shutdown. Horizontal scaling is running more of these
//! processes against the same Redis.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::{config::MatchwireConfig, errors::Result, fanout::EventBus, store::AtomicStore};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Matchmaker + signaling server
pub struct ApiServer {
    config: MatchwireConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(
        config: MatchwireConfig,
        store: Arc<dyn AtomicStore>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let state = AppState::new(&config, store, bus);
        Self { config, state }
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        let app = self.create_app();
        let addr = self.socket_addr()?;

        info!("starting matchwire worker");
        info!("   listen: http://{}", addr);
        info!("   grace period: {}s", self.config.cleanup.grace_period_secs);
        self.log_endpoints();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::errors::Error::Config(format!("bind {}: {}", addr, e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::errors::Error::store(format!("server error: {}", e)))?;

        info!("worker stopped gracefully");
        Ok(())
    }

    /// Create the application with the middleware stack
    fn create_app(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
            // Request ID middleware (first for tracing)
            .layer(axum::middleware::from_fn(request_id_middleware))
            // CORS layer (before timeout to handle preflight)
            .layer(create_cors_layer(self.config.server.allowed_origins.clone()))
            // Timeout layer
            .layer(TimeoutLayer::new(self.config.request_timeout()))
            // Tracing layer (last for complete request tracing)
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| {
                crate::errors::Error::Config(format!(
                    "invalid server.host '{}': {}",
                    self.config.server.host, e
                ))
            })?;
        Ok(SocketAddr::from((ip, self.config.server.port)))
    }

    fn log_endpoints(&self) {
        info!("available endpoints:");
        info!("   POST /match/join    - enter a bet tier queue");
        info!("   POST /match/cancel  - withdraw queued tickets");
        info!("   POST /match/result  - settle a finished match (auth)");
        info!("   GET  /health        - health check");
        info!("   GET  /ws            - realtime channel (token auth)");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C signal");
        },
        _ = terminate => {
            info!("received terminate signal");
        },
    }
}
