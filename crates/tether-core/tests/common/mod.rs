//! Scripted collaborators for consumer tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tether_core::{
    ByteStream, CancellationToken, ConnectError, ConsumeError, DecodeOptions, Fault,
    ItemCursor, ItemDecoder, JsonDecoder, StreamAcquirer,
};
use url::Url;

/// Stream wrapper that counts how many times it is dropped
pub struct Tracked<S> {
    inner: S,
    drops: Arc<AtomicUsize>,
}

impl<S> Tracked<S> {
    pub fn new(inner: S, drops: Arc<AtomicUsize>) -> Self {
        Self { inner, drops }
    }
}

impl<S: Stream + Unpin> Stream for Tracked<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<S> Drop for Tracked<S> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// What the next `open_stream` call does
pub enum Script {
    /// Fail with a connection-class fault
    Refuse,
    /// Fail with a fault the consumer must not retry
    Reject,
    /// Serve these chunks, then end the body
    Body(Vec<io::Result<Bytes>>),
    /// Serve these chunks, then never produce another byte
    Hang(Vec<io::Result<Bytes>>),
}

fn chunks(parts: &[&'static str]) -> Vec<io::Result<Bytes>> {
    parts
        .iter()
        .copied()
        .map(|part| Ok(Bytes::from_static(part.as_bytes())))
        .collect()
}

impl Script {
    pub fn body(parts: &[&'static str]) -> Self {
        Script::Body(chunks(parts))
    }

    pub fn hang(parts: &[&'static str]) -> Self {
        Script::Hang(chunks(parts))
    }

    /// Serve `parts`, then fail the read
    pub fn reset(parts: &[&'static str]) -> Self {
        let mut body = chunks(parts);
        body.push(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )));
        Script::Body(body)
    }
}

#[derive(Clone, Default)]
pub struct ScriptedAcquirer {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    /// Calls to `open_stream`
    pub opens: Arc<AtomicUsize>,
    /// Bodies handed out
    pub streams: Arc<AtomicUsize>,
    /// Bodies dropped
    pub stream_drops: Arc<AtomicUsize>,
    /// `stream_drops` observed at each successful open
    pub drops_at_open: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedAcquirer {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn streams(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    pub fn stream_drops(&self) -> usize {
        self.stream_drops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamAcquirer for ScriptedAcquirer {
    async fn open_stream(
        &self,
        _endpoint: &Url,
        _cancel: &CancellationToken,
    ) -> Result<ByteStream, Fault> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no more scripted connections");

        let body: BoxStream<'static, io::Result<Bytes>> = match script {
            Script::Refuse => {
                return Err(ConnectError::Status {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                }
                .into())
            }
            Script::Reject => return Err(ConsumeError::InvalidRequest(builder_error()).into()),
            Script::Body(chunks) => stream::iter(chunks).boxed(),
            Script::Hang(chunks) => stream::iter(chunks).chain(stream::pending()).boxed(),
        };

        self.drops_at_open
            .lock()
            .unwrap()
            .push(self.stream_drops.load(Ordering::SeqCst));
        self.streams.fetch_add(1, Ordering::SeqCst);
        Ok(Tracked::new(body, self.stream_drops.clone()).boxed())
    }
}

/// JSON decoder whose cursors count their own drops
#[derive(Clone, Default)]
pub struct CountingDecoder {
    pub cursors: Arc<AtomicUsize>,
    pub cursor_drops: Arc<AtomicUsize>,
}

impl CountingDecoder {
    pub fn cursors(&self) -> usize {
        self.cursors.load(Ordering::SeqCst)
    }

    pub fn cursor_drops(&self) -> usize {
        self.cursor_drops.load(Ordering::SeqCst)
    }
}

impl ItemDecoder for CountingDecoder {
    fn decode<T>(
        &self,
        stream: ByteStream,
        options: &DecodeOptions,
        cancel: &CancellationToken,
    ) -> ItemCursor<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.cursors.fetch_add(1, Ordering::SeqCst);
        let cursor = JsonDecoder::new().decode::<T>(stream, options, cancel);
        Tracked::new(cursor, self.cursor_drops.clone()).boxed()
    }
}

pub fn endpoint() -> Url {
    Url::parse("http://stream.test/events").unwrap()
}

fn builder_error() -> reqwest::Error {
    reqwest::Client::new()
        .get("http://stream.test")
        .header("bad header", "x")
        .build()
        .unwrap_err()
}
