//! Serving side: registry, sources, windowed fetch and table building

pub mod builder;
pub mod connection;
pub mod fetch;
pub mod predicate;
pub mod reaper;
pub mod registry;
pub mod source;

pub use builder::{DataTable, TableBuilder};
pub use connection::DataTableConnectionService;
pub use fetch::FetchService;
pub use reaper::EvictionPolicy;
pub use registry::{SourceRegistry, SourceScope};
pub use source::{FrameSource, PagedSource, ProjectedSource, RowIdentity, TableSource};

use crate::config::ServerConfig;
use crate::datatable::error::Result;
use crate::datatable::{wire, FetchRequest, FetchResponse};
use tokio::task::JoinHandle;

/// One serving instance: its own registry, fetch service and reaper
#[derive(Clone)]
pub struct DataTableServer {
    config: ServerConfig,
    registry: SourceRegistry,
    fetch: FetchService,
}

impl DataTableServer {
    pub fn new(config: ServerConfig) -> Self {
        let registry = SourceRegistry::new();
        DataTableServer {
            config,
            fetch: FetchService::new(registry.clone()),
            registry,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn connection_service(&self) -> DataTableConnectionService {
        DataTableConnectionService::new(self.registry.clone(), self.config.port)
    }

    pub fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.fetch.fetch(request)
    }

    /// Serve one encoded `QueryRequest`, returning the encoded `QueryResponse`
    pub fn handle_query(&self, request: &[u8]) -> Result<Vec<u8>> {
        let request = wire::decode_request(request)?;
        let response = self.fetch.fetch(&request)?;
        wire::encode_response(&response)
    }

    /// Start evicting idle handles per the server config
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        reaper::spawn_reaper(
            self.registry.clone(),
            EvictionPolicy::from_config(&self.config),
        )
    }
}
