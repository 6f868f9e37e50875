//! Shared application state

use std::sync::Arc;

use tracing::info;

use graphops_api::GraphOps;
use graphops_core::Result;
use graphops_graph::{GraphGateway, MemoryGateway, NebulaConfig, NebulaGateway};
use graphops_spec::{SchemaRegistry, SpecStore};

use crate::config::{GraphMode, ServerConfig};

pub struct AppState {
    pub config: ServerConfig,
    pub ops: GraphOps,
}

impl AppState {
    /// Build the gateway for the configured backend, load workspace
    /// schemas, and assemble the operations facade.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let gateway: Arc<dyn GraphGateway> = match config.graph {
            GraphMode::Memory => Arc::new(MemoryGateway::new()),
            GraphMode::Nebula => Arc::new(NebulaGateway::new(NebulaConfig {
                gateway_url: config.nebula_gateway_url.clone(),
                graphd_host: config.nebula_graphd_host.clone(),
                graphd_port: config.nebula_graphd_port,
                username: config.nebula_user.clone(),
                password: config.nebula_password.clone(),
                space: config.nebula_space.clone(),
            })),
        };

        let registry = Arc::new(SchemaRegistry::new(&config.schemas_dir));
        let loaded = registry.reload()?;
        info!(schemas = loaded, dir = %config.schemas_dir.display(), "workspace schemas loaded");

        let specs = Arc::new(SpecStore::new(&config.specs_dir));
        let ops = GraphOps::new(gateway, registry, specs);
        Ok(Self { config, ops })
    }
}
