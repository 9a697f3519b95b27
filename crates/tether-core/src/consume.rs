//! Reconnecting stream consumer
//!
//! Drives acquirer → decoder → caller in a loop. Connection and read faults
//! are absorbed by reconnecting; a clean end of the stream or cancellation
//! ends the sequence; any other fault is handed to the caller as the last
//! element.
//!
//! Reconnects are immediate and unlimited. There is no backoff: a dead
//! endpoint is retried as fast as the acquirer fails.

use async_stream::stream;
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::TetherConfig;
use crate::decode::{DecodeOptions, ItemDecoder, JsonDecoder};
use crate::error::{ConsumeError, Fault};
use crate::transport::{HttpAcquirer, StreamAcquirer};

/// Items of one endpoint, in decode order
pub type ItemStream<T> = BoxStream<'static, Result<T, ConsumeError>>;

/// Why a connection's inner loop stopped
enum Outcome {
    /// Clean end of stream, or cancellation
    Finished,
    /// Read fault; open a new connection
    Reconnect,
    /// Fault the consumer does not handle
    Failed(ConsumeError),
}

/// Consume `endpoint` as a lazy sequence of `T`
///
/// Nothing happens until the returned stream is polled. At most one
/// connection and one item cursor are alive at a time, and both are dropped
/// before the next connection is opened or the stream ends. Dropping the
/// returned stream releases them as well.
///
/// Cancellation is checked before every connection attempt and every item,
/// and also interrupts a pending connect or read.
pub fn consume<T, A, D>(
    acquirer: A,
    decoder: D,
    endpoint: Url,
    options: DecodeOptions,
    cancel: CancellationToken,
) -> ItemStream<T>
where
    T: DeserializeOwned + Send + 'static,
    A: StreamAcquirer + 'static,
    D: ItemDecoder + 'static,
{
    let items = stream! {
        let mut attempt: u64 = 0;

        'connect: while !cancel.is_cancelled() {
            attempt += 1;

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'connect,
                opened = acquirer.open_stream(&endpoint, &cancel) => opened,
            };

            let body = match opened {
                Ok(body) => body,
                Err(Fault::Unclassified(err)) => {
                    warn!(endpoint = %endpoint, attempt, "Failed to open stream: {}", err);
                    yield Err(err);
                    break 'connect;
                }
                Err(fault) => {
                    debug!(endpoint = %endpoint, attempt, "Connect failed, retrying: {}", fault);
                    continue 'connect;
                }
            };
            info!(endpoint = %endpoint, attempt, "Connected");

            let mut cursor = decoder.decode::<T>(body, &options, &cancel);
            let mut outcome = Outcome::Finished;
            let mut delivered: u64 = 0;

            while !cancel.is_cancelled() {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = cursor.next() => next,
                };

                match next {
                    Some(Ok(Some(item))) => {
                        delivered += 1;
                        yield Ok(item);
                    }
                    Some(Ok(None)) => trace!("Skipping null item"),
                    Some(Err(Fault::Unclassified(err))) => {
                        outcome = Outcome::Failed(err);
                        break;
                    }
                    Some(Err(fault)) => {
                        debug!(
                            endpoint = %endpoint,
                            attempt,
                            delivered,
                            "Stream interrupted, reconnecting: {}",
                            fault
                        );
                        outcome = Outcome::Reconnect;
                        break;
                    }
                    None => break,
                }
            }

            // Releases the body too; the cursor owns it
            drop(cursor);

            match outcome {
                Outcome::Reconnect => continue 'connect,
                Outcome::Failed(err) => {
                    warn!(endpoint = %endpoint, delivered, "Stopping on unrecoverable fault: {}", err);
                    yield Err(err);
                }
                Outcome::Finished if cancel.is_cancelled() => {
                    debug!(endpoint = %endpoint, delivered, "Consumer cancelled");
                }
                Outcome::Finished => {
                    info!(endpoint = %endpoint, delivered, "Stream ended");
                }
            }
            break 'connect;
        }
    };

    items.boxed()
}

/// A reusable acquirer/decoder pair with fixed decode options
#[derive(Debug, Clone)]
pub struct Consumer<A = HttpAcquirer, D = JsonDecoder> {
    acquirer: A,
    decoder: D,
    options: DecodeOptions,
}

impl Consumer {
    /// HTTP consumer built from the `[http]` and `[decode]` config tables
    pub fn from_config(config: &TetherConfig) -> anyhow::Result<Self> {
        let acquirer = HttpAcquirer::from_config(&config.http)?;
        Ok(Self::new(acquirer, JsonDecoder::new(), config.decode.clone()))
    }
}

impl<A, D> Consumer<A, D> {
    pub fn new(acquirer: A, decoder: D, options: DecodeOptions) -> Self {
        Self {
            acquirer,
            decoder,
            options,
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }
}

impl<A, D> Consumer<A, D>
where
    A: StreamAcquirer + Clone + 'static,
    D: ItemDecoder + Clone + 'static,
{
    /// See [`consume`]
    pub fn consume<T>(&self, endpoint: Url, cancel: CancellationToken) -> ItemStream<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        consume(
            self.acquirer.clone(),
            self.decoder.clone(),
            endpoint,
            self.options.clone(),
            cancel,
        )
    }
}
