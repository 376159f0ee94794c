//! `PostureServer`: Axum router, listener and shared state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use posture_core::ClassifierProvider;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::status::{self, StatusResponse};
use crate::websocket::{
    BroadcastFanout, ConnectionRegistry, FramePipeline, Role, SessionContext, run_ws_session,
};

/// State shared by every handler.
#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionContext>,
    max_connections: usize,
    max_message_size: usize,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

/// The posture monitoring server.
pub struct PostureServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    fanout: Arc<BroadcastFanout>,
    pipeline: Arc<FramePipeline>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl PostureServer {
    /// Create a server that classifies with `provider`.
    pub fn new(config: ServerConfig, provider: ClassifierProvider) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let fanout = Arc::new(BroadcastFanout::new(
            Arc::clone(&registry),
            config.max_observer_drops,
        ));
        let pipeline = Arc::new(FramePipeline::new(provider, Arc::clone(&fanout)));
        Self {
            config,
            registry,
            fanout,
            pipeline,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            sessions: Arc::new(SessionContext {
                registry: Arc::clone(&self.registry),
                pipeline: Arc::clone(&self.pipeline),
                shutdown: self.shutdown.token(),
                queue_capacity: self.config.outbound_queue_capacity,
                ping_interval: self.config.ping_interval(),
                pong_timeout: self.config.pong_timeout(),
            }),
            max_connections: self.config.max_connections,
            max_message_size: self.config.max_message_size,
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(status_handler))
            .route("/stream", get(stream_handler))
            .route("/dashboard", get(dashboard_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in a background task.
    ///
    /// The task ends once [`ShutdownCoordinator::shutdown`] fires and the
    /// in-flight HTTP requests finish.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(
            %local_addr,
            classifier = self.pipeline.provider().name(),
            "posture server listening"
        );

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server stopped with error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Observer fan-out.
    pub fn fanout(&self) -> &Arc<BroadcastFanout> {
        &self.fanout
    }

    /// Classifier provider.
    pub fn provider(&self) -> &ClassifierProvider {
        self.pipeline.provider()
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(status::status(state.sessions.pipeline.provider()))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = &state.sessions.registry;
    Json(health::health_check(
        state.start_time,
        registry.count(Role::Sender),
        registry.count(Role::Observer),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /stream
async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, Role::Sender, state)
}

/// GET /dashboard
async fn dashboard_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, Role::Observer, state)
}

fn upgrade(ws: WebSocketUpgrade, role: Role, state: AppState) -> Response {
    if state.sessions.shutdown.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
    }
    let open = state.sessions.registry.total();
    if open >= state.max_connections {
        warn!(%role, open, limit = state.max_connections, "connection limit reached");
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    let sessions = Arc::clone(&state.sessions);
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, role, sessions))
}
