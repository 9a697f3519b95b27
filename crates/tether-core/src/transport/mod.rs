//! Stream acquisition
//!
//! A [`StreamAcquirer`] opens the raw byte stream for an endpoint. The
//! consumer owns whatever it returns until the connection is done with.

mod http;

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Fault;

pub use http::HttpAcquirer;

/// Body of one connection attempt
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Opens byte streams for the consumer
#[async_trait]
pub trait StreamAcquirer: Send + Sync {
    /// Open a stream to `endpoint`
    ///
    /// Failures before any body byte is read should be reported as
    /// [`Fault::Connect`] so the consumer retries them.
    async fn open_stream(
        &self,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, Fault>;
}
