//! Tether core: resumable consumption of HTTP JSON streams
//!
//! [`consume`] turns an endpoint that streams JSON items into a lazy
//! [`ItemStream`], reconnecting through connection and read failures.

pub mod cancellation;
pub mod channel;
pub mod config;
pub mod consume;
pub mod decode;
pub mod error;
pub mod transport;

pub use cancellation::ConsumeCancellation;
pub use channel::{spawn_consumer, ConsumerHandle};
pub use config::{HttpConfig, TetherConfig};
pub use consume::{consume, Consumer, ItemStream};
pub use decode::{DecodeOptions, ItemCursor, ItemDecoder, JsonDecoder, StreamFormat};
pub use error::{ConnectError, ConsumeError, Fault, FaultClass};
pub use transport::{ByteStream, HttpAcquirer, StreamAcquirer};

// Re-exported so callers can build tokens without depending on tokio-util
pub use tokio_util::sync::CancellationToken;
