//! HTTP server — WebSocket upgrade plus a health route

use crate::orchestrator::Orchestrator;
use crate::ws::handle_connection;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use repograph_core::AgentConfig;
use repograph_llm::{AnthropicOracle, SharedOracle};
use repograph_pkg::GraphStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub agent: AgentConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8765,
            agent: AgentConfig::from_env(),
        }
    }
}

pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let oracle: SharedOracle = AnthropicOracle::from_config(&config.agent.llm)
        .map(|o| Arc::new(o) as Arc<dyn repograph_llm::LlmOracle>);
    if oracle.is_none() {
        info!("no LLM API key configured; deterministic fallbacks active");
    }

    let graph = GraphStore::connect(&config.agent.graph_db).await.map(Arc::new);
    if graph.is_none() {
        info!("graph database not attached; queries run in-memory");
    }

    let orchestrator = Arc::new(Orchestrator::new(config.agent, oracle, graph));

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(orchestrator.clone());

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    info!("repograph gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  WebSocket: ws://{}/ws", addr);
    info!("  Health:    http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(orchestrator))
        .await?;
    Ok(())
}

async fn shutdown_signal(orchestrator: Arc<Orchestrator>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested, cancelling sessions");
    for session_id in orchestrator.sessions.list() {
        orchestrator.sessions.remove(&session_id);
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(orchestrator): State<Arc<Orchestrator>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, orchestrator))
}

async fn health_handler(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": orchestrator.sessions.list().len(),
        "approval_required": orchestrator.config().approval_required,
    }))
}
