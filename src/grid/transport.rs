//! How the grid reaches a server
//!
//! The transport only moves encoded bytes for a descriptor; framing and
//! networking belong to whoever implements it.

use crate::datatable::error::{DataTableError, Result};
use crate::datatable::wire::{self, QUERY_PATH};
use crate::datatable::{ConnectionDescriptor, FetchRequest, FetchResponse};
use crate::server::DataTableServer;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

pub trait FetchTransport: Send + Sync {
    /// Send an encoded `QueryRequest`, resolve to the encoded `QueryResponse`
    fn query(
        &self,
        descriptor: &ConnectionDescriptor,
        request: Vec<u8>,
    ) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Encode, send and decode one fetch
///
/// The returned future owns everything it needs, so callers may keep
/// mutating their own state while it is pending.
pub fn fetch(
    transport: &Arc<dyn FetchTransport>,
    descriptor: &ConnectionDescriptor,
    request: &FetchRequest,
) -> BoxFuture<'static, Result<FetchResponse>> {
    let encoded = match wire::encode_request(request) {
        Ok(bytes) => bytes,
        Err(e) => return futures::future::ready(Err(e)).boxed(),
    };
    let pending = transport.query(descriptor, encoded);
    async move {
        let bytes = pending.await?;
        wire::decode_response(&bytes)
    }
    .boxed()
}

/// Serves queries straight from a server in the same process
#[derive(Clone)]
pub struct InProcessTransport {
    server: DataTableServer,
}

impl InProcessTransport {
    pub fn new(server: DataTableServer) -> Self {
        InProcessTransport { server }
    }
}

impl FetchTransport for InProcessTransport {
    fn query(
        &self,
        descriptor: &ConnectionDescriptor,
        request: Vec<u8>,
    ) -> BoxFuture<'static, Result<Vec<u8>>> {
        if descriptor.path() != QUERY_PATH || descriptor.port() != self.server.config().port {
            let message = format!(
                "no endpoint at port {} path {}",
                descriptor.port(),
                descriptor.path()
            );
            return futures::future::ready(Err(DataTableError::Transport(message))).boxed();
        }
        let server = self.server.clone();
        async move {
            tokio::task::yield_now().await;
            server.handle_query(&request)
        }
        .boxed()
    }
}
