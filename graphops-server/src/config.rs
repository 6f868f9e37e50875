//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Which graph backend the server runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GraphMode {
    /// In-process store (development and tests)
    #[default]
    Memory,
    /// NebulaGraph via its HTTP gateway
    Nebula,
}

/// GraphOps server configuration.
///
/// Every flag has an environment fallback so containerized deployments
/// can run without a command line.
#[derive(Debug, Clone, Parser)]
#[command(name = "graphops-server", about = "GraphOps temporal graph platform server")]
pub struct ServerConfig {
    /// Listen address
    #[arg(long, env = "GRAPHOPS_LISTEN", default_value = "0.0.0.0:9200")]
    pub listen_addr: SocketAddr,

    /// Graph backend
    #[arg(long, value_enum, env = "GRAPHOPS_GRAPH", default_value = "memory")]
    pub graph: GraphMode,

    /// NebulaGraph HTTP gateway base URL
    #[arg(long, env = "NEBULA_GATEWAY_URL", default_value = "http://127.0.0.1:8080")]
    pub nebula_gateway_url: String,

    /// graphd host the gateway dials
    #[arg(long, env = "NEBULA_GRAPHD_HOST", default_value = "127.0.0.1")]
    pub nebula_graphd_host: String,

    /// graphd port
    #[arg(long, env = "NEBULA_GRAPHD_PORT", default_value_t = 9669)]
    pub nebula_graphd_port: u16,

    #[arg(long, env = "NEBULA_USER", default_value = "root")]
    pub nebula_user: String,

    #[arg(long, env = "NEBULA_PASSWORD", default_value = "nebula")]
    pub nebula_password: String,

    /// Graph space holding all GraphOps state
    #[arg(long, env = "NEBULA_SPACE", default_value = "graphops")]
    pub nebula_space: String,

    /// Vector-store address (`host:port`), reported by /health and
    /// passed through to collaborators unchanged
    #[arg(long, env = "GRAPHOPS_VECTOR_ADDR")]
    pub vector_addr: Option<String>,

    /// Job-queue address (`host:port`), reported by /health and passed
    /// through to collaborators unchanged
    #[arg(long, env = "GRAPHOPS_QUEUE_ADDR")]
    pub queue_addr: Option<String>,

    /// Directory of workspace domain schemas (`*.yaml`)
    #[arg(long, env = "GRAPHOPS_SCHEMAS_DIR", default_value = "schemas")]
    pub schemas_dir: PathBuf,

    /// Directory of ingest specs (`*.yaml`)
    #[arg(long, env = "GRAPHOPS_SPECS_DIR", default_value = "specs")]
    pub specs_dir: PathBuf,

    /// Directory uploaded source files are stored under
    #[arg(long, env = "GRAPHOPS_UPLOAD_DIR", default_value = "data/uploads")]
    pub upload_dir: PathBuf,

    /// Enable permissive CORS (browser explorer)
    #[arg(long, env = "GRAPHOPS_CORS")]
    pub cors_enabled: bool,
}

impl ServerConfig {
    /// Short backend label for startup logs.
    pub fn graph_mode_str(&self) -> &'static str {
        match self.graph {
            GraphMode::Memory => "memory",
            GraphMode::Nebula => "nebula",
        }
    }
}
