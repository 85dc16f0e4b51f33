//! Transport module - Exchanges whole frames over blocking byte streams
//!
//! Provides:
//! - `read_exact` for accumulating a fixed number of bytes across short reads
//! - `send_message` / `recv_message` for one frame per call
//! - `Connection` for a stream with limits and statistics attached
//!
//! Anything implementing `std::io::Read` / `std::io::Write` works, so tests
//! run against in-memory stubs and production code against sockets. There is
//! no timeout here; set one on the underlying stream if needed.

mod connection;
mod frame;

pub use connection::*;
pub use frame::*;

use thiserror::Error;

use crate::protocol::{CodecError, MAX_PAYLOAD_LEN};

/// Default size of a single read call while accumulating a frame
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),

    #[error("Header read failed: peer closed after {received} of 4 bytes")]
    HeaderReadFailed { received: usize },

    #[error("Payload read failed: peer closed after {received} of {expected} bytes")]
    PayloadReadFailed { expected: usize, received: usize },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Configuration for frame exchange
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Largest payload accepted from the peer
    pub max_payload_len: usize,
    /// Upper bound on a single read call
    pub read_chunk_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_len: MAX_PAYLOAD_LEN,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_payload_len(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size.max(1);
        self
    }
}
