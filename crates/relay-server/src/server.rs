//! [`RelayServer`]: the HTTP listener in front of one session.
//!
//! Routes:
//! - `GET /health`: liveness plus client and network counts.
//! - `GET /ws`: WebSocket upgrade into an RPC client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use relay_rpc::{MethodRegistry, RpcContext};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{HealthResponse, health_check};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::event_bridge::EventBridge;
use crate::websocket::session::{Heartbeat, SessionDeps, run_ws_session};

#[derive(Clone)]
struct ServerState {
    deps: SessionDeps,
    config: Arc<ServerConfig>,
    started: Instant,
}

/// One session served to any number of WebSocket clients.
pub struct RelayServer {
    state: ServerState,
    shutdown: Arc<ShutdownCoordinator>,
}

impl RelayServer {
    /// Wire `registry` and `ctx` behind the listener described by `config`.
    /// The registry's per-call timeout becomes `config.handler_timeout`.
    pub fn new(config: ServerConfig, registry: MethodRegistry, ctx: RpcContext) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let deps = SessionDeps {
            registry: Arc::new(registry.with_timeout(config.handler_timeout)),
            ctx: Arc::new(ctx),
            broadcast: Arc::new(BroadcastManager::new()),
            heartbeat: Heartbeat {
                interval: config.heartbeat_interval,
                timeout: config.heartbeat_timeout,
            },
            shutdown: shutdown.token(),
        };
        Self {
            state: ServerState {
                deps,
                config: Arc::new(config),
                started: Instant::now(),
            },
            shutdown,
        }
    }

    /// Routes over the shared state.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/ws", get(upgrade))
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
    }

    /// Forward session events to every attached client until shutdown.
    pub fn spawn_event_bridge(&self) -> JoinHandle<()> {
        let deps = &self.state.deps;
        let bridge = EventBridge::new(deps.ctx.session.subscribe(), Arc::clone(&deps.broadcast));
        tokio::spawn(bridge.run(self.shutdown.token()))
    }

    /// Bind `host:port` and serve in a background task until shutdown.
    /// Port 0 picks a free port; the returned address has the real one.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let config = &self.state.config;
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        let serve = axum::serve(listener, self.router()).with_graceful_shutdown(self.shutdown.token().cancelled_owned());

        let task = tokio::spawn(async move {
            if let Err(e) = serve.await {
                error!(error = %e, "listener failed");
            }
        });
        info!(%addr, "relay listening");
        Ok((addr, task))
    }

    /// Clients attached right now.
    pub fn client_count(&self) -> usize {
        self.state.deps.broadcast.len()
    }

    /// Shutdown signal shared by the listener, the event bridge and every
    /// client.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let clients = state.deps.broadcast.len();
    let networks = match state.deps.ctx.session.registered_networks().await {
        Ok(ids) => Some(ids.len()),
        Err(_) => None,
    };
    Json(health_check(state.started, clients, networks))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    let clients = state.deps.broadcast.len();
    if clients >= state.config.max_connections {
        warn!(clients, limit = state.config.max_connections, "refusing client, limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let client_id = format!("client_{}", uuid::Uuid::now_v7().simple());
    let deps = state.deps;
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, client_id, deps))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_test_context;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn server_with(config: ServerConfig) -> RelayServer {
        let mut registry = MethodRegistry::new();
        relay_rpc::handlers::register_all(&mut registry);
        RelayServer::new(config, registry, make_test_context())
    }

    async fn get(server: &RelayServer, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let server = server_with(ServerConfig::default());
        let (status, body) = get(&server, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["networks"], 0);
        assert!(body["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_a_client_error() {
        let server = server_with(ServerConfig::default());
        let (status, _) = get(&server, "/ws").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn other_paths_404() {
        let server = server_with(ServerConfig::default());
        let (status, _) = get(&server, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_task_ends_on_shutdown() {
        let server = server_with(ServerConfig::default());
        assert_eq!(server.client_count(), 0);
        let (addr, task) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(!server.shutdown().is_shutting_down());

        server.shutdown().shutdown();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
