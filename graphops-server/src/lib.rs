//! GraphOps HTTP Server
//!
//! A thin REST shell around `graphops-api`: workspace management,
//! synchronous spreadsheet/CSV imports, and the entity query surface.
//! All state lives in the backing graph store; the server itself only
//! caches workspace schemas and ingest specs.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{GraphMode, ServerConfig};
pub use error::{ErrorResponse, Result, ServerError};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

/// The assembled server.
pub struct GraphOpsServer {
    state: Arc<AppState>,
    router: Router,
}

impl GraphOpsServer {
    /// Build state and routes from the configuration.
    pub fn new(config: ServerConfig) -> graphops_core::Result<Self> {
        let state = Arc::new(AppState::new(config)?);
        let router = routes::build_router(state.clone());
        Ok(Self { state, router })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind and serve until the process is stopped.
    pub async fn run(self) -> std::io::Result<()> {
        let addr = self.state.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(
            addr = %addr,
            graph = self.state.config.graph_mode_str(),
            "GraphOps server listening"
        );
        axum::serve(listener, self.router).await
    }
}
