//! SBDP - Simple Binary Dictionary Protocol
//!
//! A binary format for flat key/value messages, where each value is one of
//! int64, uint64, float64, UTF-8 string or opaque binary, plus blocking
//! helpers for exchanging whole frames over any `Read`/`Write` stream.
//!
//! ```
//! use sbdp::{decode, encode, Message, Value};
//!
//! let msg = Message::new().with("age", 30i64).with("name", "Alice");
//! let frame = encode(&msg).unwrap();
//! let back = decode(&frame).unwrap();
//! assert_eq!(back.get("name"), Some(&Value::from("Alice")));
//! ```

pub mod config;
pub mod protocol;
pub mod transport;

pub use protocol::{
    decode, decode_payload, encode, encode_into, CodecError, FrameDecoder, Message, TypeCode,
    Value,
};
pub use transport::{
    read_exact, recv_message, recv_message_with_limit, send_message, Connection, TransportConfig,
    TransportError,
};
