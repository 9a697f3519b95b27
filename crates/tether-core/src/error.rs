//! Fault taxonomy for stream consumption
//!
//! Collaborators report failures as a [`Fault`]. The consumer decides what to
//! do with a fault purely from its [`FaultClass`]: connection and read faults
//! are absorbed by reconnecting, everything else reaches the caller as a
//! [`ConsumeError`].

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// How the consumer treats a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// The stream could not be established at all
    Connection,
    /// Reading bytes from an already-open stream failed
    Read,
    /// Anything else; never retried
    Unclassified,
}

/// Failure to establish a byte stream to the endpoint
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("endpoint responded with status {status}")]
    Status { status: StatusCode },
}

/// Faults that escape the reconnect loop and end the caller's sequence
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("malformed item: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected byte {found:?} at offset {offset}: expected {expected}")]
    Framing {
        found: char,
        offset: usize,
        expected: &'static str,
    },

    #[error("item exceeds the limit of {limit} bytes")]
    ItemTooLarge { limit: usize },

    #[error("stream ended before the document was complete")]
    Truncated,

    #[error("invalid request: {0}")]
    InvalidRequest(#[source] reqwest::Error),
}

/// A failure reported by a stream acquirer or item decoder
#[derive(Debug, Error)]
pub enum Fault {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("stream read failed: {0}")]
    Read(#[source] io::Error),

    #[error(transparent)]
    Unclassified(#[from] ConsumeError),
}

impl Fault {
    pub fn class(&self) -> FaultClass {
        match self {
            Fault::Connect(_) => FaultClass::Connection,
            Fault::Read(_) => FaultClass::Read,
            Fault::Unclassified(_) => FaultClass::Unclassified,
        }
    }

    /// Whether the consumer recovers from this fault by reconnecting
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.class(), FaultClass::Unclassified)
    }
}

// Codecs surface reader failures through `From<io::Error>`, so any I/O error
// on the byte stream lands in the read class.
impl From<io::Error> for Fault {
    fn from(err: io::Error) -> Self {
        Fault::Read(err)
    }
}

impl From<serde_json::Error> for Fault {
    fn from(err: serde_json::Error) -> Self {
        Fault::Unclassified(ConsumeError::Malformed(err))
    }
}

impl From<reqwest::Error> for Fault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Fault::Unclassified(ConsumeError::InvalidRequest(err))
        } else if err.is_body() || err.is_decode() {
            Fault::Read(io::Error::other(err))
        } else {
            Fault::Connect(ConnectError::Request(err))
        }
    }
}
