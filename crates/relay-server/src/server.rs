//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::mailbox::Mailboxes;
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;
use crate::shutdown::{DrainReport, ShutdownCoordinator};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Live-path router.
    pub router: Arc<MessageRouter>,
    /// Long-poll mailboxes.
    pub mailboxes: Arc<Mailboxes>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
    mailboxes: Arc<Mailboxes>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl RelayServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            config: Arc::new(config),
            router: Arc::new(MessageRouter::new(registry.clone())),
            registry,
            mailboxes: Arc::new(Mailboxes::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            router: self.router.clone(),
            mailboxes: self.mailboxes.clone(),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        let mut app = Router::new()
            .route("/ws", get(api::ws_handler))
            .route("/poll/{username}", get(api::poll_handler))
            .route("/send/{username}", post(api::send_handler))
            .route("/health", get(api::health_handler))
            .route("/metrics", get(api::metrics_handler))
            .with_state(state);

        if let Some(dir) = &self.config.static_dir {
            app = app.nest_service("/static", ServeDir::new(dir));
        }

        app.layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "server error");
            }
        });

        info!(%local_addr, "relay server listening");
        Ok((local_addr, handle))
    }

    /// Fire shutdown and wait up to `grace` for `serve_task` and all live
    /// sessions to finish.
    pub async fn stop(&self, serve_task: JoinHandle<()>, grace: Duration) -> DrainReport {
        self.shutdown.drain(serve_task, &self.registry, grace).await
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the mailboxes.
    pub fn mailboxes(&self) -> &Arc<Mailboxes> {
        &self.mailboxes
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
