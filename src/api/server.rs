//! HTTP server setup and handlers.

use crate::readiness::{ReadinessGate, ReadinessState};

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use std::net::SocketAddr;

const ALIVE_TEXT: &str = "Discord bot is running!";

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: ReadinessState,
    /// Milliseconds since process start.
    pub uptime: u64,
    pub ready: bool,
    pub timestamp: String,
    /// When the process started, UTC.
    #[serde(rename = "startTime")]
    pub started_at: String,
}

/// Routes served by the health endpoint.
pub fn router(gate: ReadinessGate) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(gate)
}

/// Bind `port` on all interfaces and serve until `shutdown_rx` flips.
pub async fn start_http_server(
    port: u16,
    gate: ReadinessGate,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let bind = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP server listening");

    let app = router(gate);
    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
            })
            .await
        {
            tracing::error!(%error, "HTTP server exited with error");
        }
    });

    Ok(handle)
}

async fn alive() -> &'static str {
    ALIVE_TEXT
}

async fn status(State(gate): State<ReadinessGate>) -> Json<StatusResponse> {
    let state = gate.state();
    Json(StatusResponse {
        status: state,
        uptime: u64::try_from(gate.uptime().as_millis()).unwrap_or(u64::MAX),
        ready: state == ReadinessState::Ready,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        started_at: gate.started_at().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
