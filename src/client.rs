//! Transport abstraction over "an HTTP round trip through some proxy"
//!
//! The benchmarking core only ever talks to [`ProxyAdapter`] and
//! [`ProxyTransport`]. Protocol support lives behind the adapter, so the core
//! can be exercised against a fake adapter in tests.

pub mod proxied;

pub use proxied::ReqwestAdapter;

use crate::{
    error::Result,
    models::ProxyDescriptor,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Streamed body, one chunk at a time
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Response head plus a body that is read lazily
pub struct TransportResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn new(status: u16, body: ByteStream) -> Self {
        Self { status, body }
    }

    /// Check if the response indicates success
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// HTTP round trips routed through one proxy
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// GET `url`; the body is not consumed
    async fn get(&self, url: &str) -> Result<TransportResponse>;

    /// POST a streamed body of `content_length` bytes, returning the status
    async fn post(&self, url: &str, body: ByteStream, content_length: u64) -> Result<u16>;
}

/// Produces transports for proxy descriptors
pub trait ProxyAdapter: Send + Sync {
    /// Build a transport for `descriptor`, or a dial error when the protocol
    /// is not supported
    fn dial(&self, descriptor: &ProxyDescriptor) -> Result<Arc<dyn ProxyTransport>>;
}
