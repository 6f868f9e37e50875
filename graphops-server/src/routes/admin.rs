//! Health endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: Services,
}

#[derive(Serialize)]
pub struct Services {
    pub graph: &'static str,
    pub vector: &'static str,
    pub queue: &'static str,
}

/// Check backend status and connectivity to the collaborating services.
///
/// The vector store and job queue are external collaborators; they are
/// probed with a plain TCP dial and reported as `unconfigured` when no
/// address is set.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let graph_ok = state.ops.graph_ok().await;
    let vector = probe(state.config.vector_addr.as_deref()).await;
    let queue = probe(state.config.queue_addr.as_deref()).await;

    let degraded = !graph_ok || vector == "error" || queue == "error";
    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        services: Services {
            graph: if graph_ok { "ok" } else { "error" },
            vector,
            queue,
        },
    })
}

async fn probe(addr: Option<&str>) -> &'static str {
    let Some(addr) = addr else {
        return "unconfigured";
    };
    let dial = tokio::net::TcpStream::connect(addr);
    match tokio::time::timeout(Duration::from_secs(1), dial).await {
        Ok(Ok(_)) => "ok",
        _ => "error",
    }
}
