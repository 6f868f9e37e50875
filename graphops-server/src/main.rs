//! GraphOps server entry point
//!
//! Run with: `cargo run -p graphops-server -- --help`

use clap::Parser;
use graphops_server::{GraphOpsServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        graph = config.graph_mode_str(),
        addr = %config.listen_addr,
        schemas_dir = %config.schemas_dir.display(),
        specs_dir = %config.specs_dir.display(),
        "Starting GraphOps server"
    );

    let server = GraphOpsServer::new(config)?;
    server.run().await.map_err(Into::into)
}
