//! Channel-backed consumer
//!
//! Runs a consumer on its own task and hands items over a bounded channel,
//! for callers that would rather `recv()` than poll a stream.

use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::consume::Consumer;
use crate::decode::ItemDecoder;
use crate::error::ConsumeError;
use crate::transport::StreamAcquirer;

/// Receiving end of a spawned consumer
pub struct ConsumerHandle<T> {
    rx: mpsc::Receiver<Result<T, ConsumeError>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Spawn `consumer` on `endpoint`, buffering at most `capacity` items
///
/// The producer task stops when the stream ends, when `cancel` fires, or
/// when the receiver goes away. The connection is released in every case.
pub fn spawn_consumer<T, A, D>(
    consumer: &Consumer<A, D>,
    endpoint: Url,
    capacity: usize,
    cancel: CancellationToken,
) -> ConsumerHandle<T>
where
    T: DeserializeOwned + Send + 'static,
    A: StreamAcquirer + Clone + 'static,
    D: ItemDecoder + Clone + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let mut items = consumer.consume::<T>(endpoint, cancel.clone());

    let task = tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    debug!("Receiver dropped, stopping consumer");
                    break;
                }
                next = items.next() => next,
            };
            let Some(next) = next else {
                break;
            };
            if tx.send(next).await.is_err() {
                debug!("Receiver dropped, stopping consumer");
                break;
            }
        }
    });

    ConsumerHandle { rx, cancel, task }
}

impl<T> ConsumerHandle<T> {
    /// Next item; `None` once the consumer has finished
    pub async fn recv(&mut self) -> Option<Result<T, ConsumeError>> {
        self.rx.recv().await
    }

    /// Ask the producer to stop at its next cancellation point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop receiving and wait for the producer to release its connection
    pub async fn join(self) -> Result<(), JoinError> {
        drop(self.rx);
        self.task.await
    }

    /// Receive as a stream; the producer task keeps running detached
    pub fn into_stream(self) -> ReceiverStream<Result<T, ConsumeError>> {
        ReceiverStream::new(self.rx)
    }
}
