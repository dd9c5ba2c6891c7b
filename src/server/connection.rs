//! Binds sources to descriptors for the view layer

use super::registry::{SourceRegistry, SourceScope};
use super::source::{RowIdentity, TableSource};
use crate::datatable::wire::QUERY_PATH;
use crate::datatable::ConnectionDescriptor;
use std::sync::Arc;
use tracing::info;

/// Registers sources on behalf of one server and hands back descriptors
#[derive(Clone)]
pub struct DataTableConnectionService {
    registry: SourceRegistry,
    port: u16,
}

impl DataTableConnectionService {
    pub fn new(registry: SourceRegistry, port: u16) -> Self {
        DataTableConnectionService { registry, port }
    }

    /// Register `source` and return the scope that owns it plus its descriptor
    pub fn add_source(
        &self,
        source: Arc<dyn TableSource>,
        identity: Option<RowIdentity>,
    ) -> (SourceScope, ConnectionDescriptor) {
        let handle = self.registry.register(source, identity);
        let descriptor = ConnectionDescriptor::new(self.port, QUERY_PATH, handle.clone());
        info!(
            handle = %handle,
            connection = descriptor.connection_id(),
            "source bound to connection"
        );
        (self.registry.scope(handle), descriptor)
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }
}
