//! Protocol codec for encoding/decoding messages
//!
//! Handles field serialization and framing. Every length read from the wire
//! is checked against the bytes actually present before it is used.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{
    Message, TypeCode, Value, HEADER_SIZE, KEY_LEN_SIZE, MAX_KEY_LEN, MAX_PAYLOAD_LEN,
    MAX_VALUE_LEN, SCALAR_SIZE, VALUE_LEN_SIZE,
};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),

    #[error("Invalid {type_code} literal {literal:?}: {reason}")]
    InvalidLiteral {
        type_code: TypeCode,
        literal: String,
        reason: String,
    },

    #[error("Key too long: {0} bytes (max: {})", MAX_KEY_LEN)]
    KeyTooLong(usize),

    #[error("Value for key {key:?} too long: {len} bytes (max: {})", MAX_VALUE_LEN)]
    ValueTooLong { key: String, len: usize },

    #[error("Frame too large: {len} bytes (max: {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Frame too short: {0} bytes, header needs {}", HEADER_SIZE)]
    TooShort(usize),

    #[error("Incomplete frame: declared {declared} payload bytes, {available} available")]
    Incomplete { declared: usize, available: usize },

    #[error("Buffer underrun at payload offset {offset}: needed {needed} bytes, {available} remaining")]
    BufferUnderrun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid UTF-8 in key at payload offset {offset}")]
    InvalidKeyEncoding { offset: usize },

    #[error("Invalid UTF-8 in string value for key {key:?}")]
    InvalidStringEncoding { key: String },

    #[error("Unknown type code {code:#04x} at payload offset {offset}")]
    UnknownTypeCode { code: u8, offset: usize },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Encode a message into a standalone frame
pub fn encode(message: &Message) -> CodecResult<Bytes> {
    let mut buf = BytesMut::new();
    encode_into(message, &mut buf)?;
    Ok(buf.freeze())
}

/// Append one encoded frame to `buf`.
///
/// Fields are written in the message's iteration order. Nothing is written
/// unless the whole message is representable.
pub fn encode_into(message: &Message, buf: &mut BytesMut) -> CodecResult<()> {
    let payload_len = payload_len(message)?;

    buf.reserve(HEADER_SIZE + payload_len);
    buf.put_u32(payload_len as u32);

    for (key, value) in message.iter() {
        buf.put_u16(key.len() as u16);
        buf.put_slice(key.as_bytes());
        buf.put_u8(value.type_code() as u8);

        match value {
            Value::Int64(v) => buf.put_i64(*v),
            Value::UInt64(v) => buf.put_u64(*v),
            Value::Float64(v) => buf.put_f64(*v),
            Value::Str(s) => {
                buf.put_u32(s.len() as u32);
                buf.put_slice(s.as_bytes());
            }
            Value::Bytes(b) => {
                buf.put_u32(b.len() as u32);
                buf.put_slice(b);
            }
        }
    }

    Ok(())
}

/// Validate every field and compute the payload length
fn payload_len(message: &Message) -> CodecResult<usize> {
    let mut total = 0usize;

    for (key, value) in message.iter() {
        if key.len() > MAX_KEY_LEN {
            return Err(CodecError::KeyTooLong(key.len()));
        }

        match value {
            Value::Str(s) => check_value_len(key, s.len(), MAX_VALUE_LEN)?,
            Value::Bytes(b) => check_value_len(key, b.len(), MAX_VALUE_LEN)?,
            _ => {}
        }

        let field_len = KEY_LEN_SIZE + key.len() + 1 + value.encoded_len();
        total = add_field_len(total, field_len, MAX_PAYLOAD_LEN)?;
    }

    Ok(total)
}

fn check_value_len(key: &str, len: usize, max: usize) -> CodecResult<()> {
    if len > max {
        return Err(CodecError::ValueTooLong {
            key: key.to_string(),
            len,
        });
    }
    Ok(())
}

/// Running payload total, failing once it passes `max`
fn add_field_len(total: usize, field_len: usize, max: usize) -> CodecResult<usize> {
    match total.checked_add(field_len) {
        Some(sum) if sum <= max => Ok(sum),
        Some(sum) => Err(CodecError::FrameTooLarge { len: sum, max }),
        None => Err(CodecError::FrameTooLarge {
            len: usize::MAX,
            max,
        }),
    }
}

/// Peek the total frame length (header included) once the header is present
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    let declared = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    HEADER_SIZE.checked_add(declared)
}

/// Decode one framed message.
///
/// Bytes after the declared payload are ignored.
pub fn decode(frame: &[u8]) -> CodecResult<Message> {
    if frame.len() < HEADER_SIZE {
        return Err(CodecError::TooShort(frame.len()));
    }

    let mut header = &frame[..HEADER_SIZE];
    let declared = header.get_u32() as usize;
    let available = frame.len() - HEADER_SIZE;
    if available < declared {
        return Err(CodecError::Incomplete {
            declared,
            available,
        });
    }

    decode_payload(&frame[HEADER_SIZE..HEADER_SIZE + declared])
}

/// Decode the concatenated fields of a frame, without its header.
///
/// A key that appears more than once takes its last value.
pub fn decode_payload(payload: &[u8]) -> CodecResult<Message> {
    let mut reader = FieldReader::new(payload);
    let mut message = Message::new();

    while !reader.is_done() {
        let (key, value) = reader.read_field()?;
        message.insert(key, value);
    }

    Ok(message)
}

/// Bounds-checked cursor over a payload
struct FieldReader<'a> {
    payload: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, offset: 0 }
    }

    fn is_done(&self) -> bool {
        self.offset == self.payload.len()
    }

    fn take(&mut self, needed: usize) -> CodecResult<&'a [u8]> {
        let available = self.payload.len() - self.offset;
        if available < needed {
            return Err(CodecError::BufferUnderrun {
                offset: self.offset,
                needed,
                available,
            });
        }
        let slice = &self.payload[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn read_field(&mut self) -> CodecResult<(String, Value)> {
        let key_len = self.take(KEY_LEN_SIZE)?.get_u16() as usize;
        let key_offset = self.offset;
        let key = std::str::from_utf8(self.take(key_len)?)
            .map_err(|_| CodecError::InvalidKeyEncoding { offset: key_offset })?
            .to_string();

        let code_offset = self.offset;
        let code = self.take(1)?.get_u8();
        let type_code = TypeCode::from_u8(code).ok_or(CodecError::UnknownTypeCode {
            code,
            offset: code_offset,
        })?;

        let value = match type_code {
            TypeCode::Int64 => Value::Int64(self.take(SCALAR_SIZE)?.get_i64()),
            TypeCode::UInt64 => Value::UInt64(self.take(SCALAR_SIZE)?.get_u64()),
            TypeCode::Float64 => Value::Float64(self.take(SCALAR_SIZE)?.get_f64()),
            TypeCode::Str => {
                let data = self.read_length_prefixed()?;
                let text = std::str::from_utf8(data)
                    .map_err(|_| CodecError::InvalidStringEncoding { key: key.clone() })?;
                Value::Str(text.to_string())
            }
            TypeCode::Bytes => Value::Bytes(Bytes::copy_from_slice(self.read_length_prefixed()?)),
        };

        Ok((key, value))
    }

    fn read_length_prefixed(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.take(VALUE_LEN_SIZE)?.get_u32() as usize;
        self.take(len)
    }
}

/// Incremental frame decoder over a growing read buffer
pub struct FrameDecoder {
    state: DecodeState,
    max_payload_len: usize,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Header,
    Payload {
        length: usize,
    },
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Header,
            max_payload_len: MAX_PAYLOAD_LEN,
        }
    }

    /// Reject frames declaring more than `max` payload bytes
    pub fn with_max_payload_len(mut self, max: usize) -> Self {
        self.max_payload_len = max;
        self
    }

    /// Attempt to decode a message from the buffer.
    ///
    /// Returns `Ok(None)` if more data is needed. A decoded frame is removed
    /// from the buffer; anything after it is left in place.
    ///
    /// `FrameTooLarge` leaves the offending header in the buffer, so every
    /// later call fails the same way. The decoder cannot resync after it;
    /// drop the stream.
    pub fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Message>> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
                    if length > self.max_payload_len {
                        return Err(CodecError::FrameTooLarge {
                            len: length,
                            max: self.max_payload_len,
                        });
                    }

                    buf.advance(HEADER_SIZE);
                    self.state = DecodeState::Payload { length };
                }
                DecodeState::Payload { length } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    let payload = buf.split_to(length);
                    self.state = DecodeState::Header;

                    return decode_payload(&payload).map(Some);
                }
            }
        }
    }

    /// Whether a frame has been started but not finished
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::Payload { .. })
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
