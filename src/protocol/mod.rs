//! Protocol module - Defines the SBDP wire format
//!
//! A message is a flat mapping of UTF-8 keys to typed scalar or byte values,
//! framed as:
//! - 4 bytes payload length (big-endian)
//! - Payload: zero or more fields, each
//!   - 2 bytes key length (big-endian) + UTF-8 key
//!   - 1 byte type code
//!   - 8 bytes for int64/uint64/float64, or
//!     4 bytes length (big-endian) + data for string/binary

mod codec;
mod message;
mod value;

pub use codec::*;
pub use message::*;
pub use value::*;

/// Size of the frame header (payload length)
pub const HEADER_SIZE: usize = 4;

/// Size of the per-field key length prefix
pub const KEY_LEN_SIZE: usize = 2;

/// Size of the string/binary length prefix
pub const VALUE_LEN_SIZE: usize = 4;

/// Width of every fixed-size scalar on the wire
pub const SCALAR_SIZE: usize = 8;

/// Longest key the wire format can carry
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Longest string or binary value the wire format can carry
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// Longest payload a frame header can declare
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Default port used by the loopback demo
pub const DEFAULT_PORT: u16 = 50007;
