//! Item decoding
//!
//! Turns a [`ByteStream`] into an [`ItemCursor`]: a lazy sequence of decoded
//! items that may fault part way through.

mod json_array;
mod json_lines;

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::error::Fault;
use crate::transport::ByteStream;

pub use json_array::JsonArrayCodec;
pub use json_lines::JsonLinesCodec;

/// Default upper bound for a single encoded item (8 MiB)
pub const DEFAULT_MAX_ITEM_BYTES: usize = 8 * 1024 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Live position over one connection's items
///
/// `Ok(None)` is the absent marker: an item that decoded to JSON `null`.
/// The cursor owns the byte stream it reads from, so dropping the cursor
/// releases the connection.
pub type ItemCursor<T> = BoxStream<'static, Result<Option<T>, Fault>>;

/// Wire layout of the items in a stream body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamFormat {
    /// A single top-level JSON array whose elements arrive over time
    #[default]
    JsonArray,
    /// One JSON value per line
    JsonLines,
}

/// Options interpreted by the decoder; the consumer passes them through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub format: StreamFormat,
    pub max_item_bytes: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            format: StreamFormat::default(),
            max_item_bytes: DEFAULT_MAX_ITEM_BYTES,
        }
    }
}

impl DecodeOptions {
    pub fn json_lines() -> Self {
        Self {
            format: StreamFormat::JsonLines,
            ..Self::default()
        }
    }
}

/// A unit produced by the framing codecs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw bytes of one encoded item
    Item(bytes::Bytes),
    /// The body ended after a complete document
    End,
}

/// Turns a byte stream into a cursor of decoded items
pub trait ItemDecoder: Send + Sync {
    fn decode<T>(
        &self,
        stream: ByteStream,
        options: &DecodeOptions,
        cancel: &CancellationToken,
    ) -> ItemCursor<T>
    where
        T: DeserializeOwned + Send + 'static;
}

/// Frames the body with a codec and deserializes every frame with serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ItemDecoder for JsonDecoder {
    fn decode<T>(
        &self,
        stream: ByteStream,
        options: &DecodeOptions,
        cancel: &CancellationToken,
    ) -> ItemCursor<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let reader = StreamReader::new(stream);
        let frames: BoxStream<'static, Result<Frame, Fault>> = match options.format {
            StreamFormat::JsonArray => {
                FramedRead::new(reader, JsonArrayCodec::new(options.max_item_bytes)).boxed()
            }
            StreamFormat::JsonLines => {
                FramedRead::new(reader, JsonLinesCodec::new(options.max_item_bytes)).boxed()
            }
        };

        frames
            .take_until(cancel.clone().cancelled_owned())
            .map(|frame| match frame {
                Ok(Frame::Item(bytes)) => {
                    Some(serde_json::from_slice::<Option<T>>(&bytes).map_err(Fault::from))
                }
                Ok(Frame::End) => None,
                Err(fault) => Some(Err(fault)),
            })
            .take_while(|next| future::ready(next.is_some()))
            .filter_map(future::ready)
            .boxed()
    }
}
