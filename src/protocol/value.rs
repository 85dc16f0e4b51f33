//! Value model
//!
//! The five value kinds a field can carry and their type codes.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use super::{CodecError, SCALAR_SIZE, VALUE_LEN_SIZE};

/// Type code identifying a field's value kind on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCode {
    Int64 = 1,
    UInt64 = 2,
    Float64 = 3,
    Str = 4,
    Bytes = 5,
}

impl TypeCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Int64),
            2 => Some(Self::UInt64),
            3 => Some(Self::Float64),
            4 => Some(Self::Str),
            5 => Some(Self::Bytes),
            _ => None,
        }
    }

    /// Name used for this kind in textual field specs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float64 => "float64",
            Self::Str => "string",
            Self::Bytes => "binary",
        }
    }

    /// Whether values of this kind carry a 4-byte length prefix
    pub fn is_length_prefixed(&self) -> bool {
        matches!(self, Self::Str | Self::Bytes)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeCode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int64" => Ok(Self::Int64),
            "uint64" => Ok(Self::UInt64),
            "float64" | "float" => Ok(Self::Float64),
            "string" => Ok(Self::Str),
            "binary" => Ok(Self::Bytes),
            other => Err(CodecError::UnsupportedType(other.to_string())),
        }
    }
}

/// A single typed field value
#[derive(Debug, Clone)]
pub enum Value {
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Str(String),
    Bytes(Bytes),
}

impl Value {
    pub fn type_code(&self) -> TypeCode {
        match self {
            Value::Int64(_) => TypeCode::Int64,
            Value::UInt64(_) => TypeCode::UInt64,
            Value::Float64(_) => TypeCode::Float64,
            Value::Str(_) => TypeCode::Str,
            Value::Bytes(_) => TypeCode::Bytes,
        }
    }

    /// Number of bytes this value occupies after its type code
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::Int64(_) | Value::UInt64(_) | Value::Float64(_) => SCALAR_SIZE,
            Value::Str(s) => VALUE_LEN_SIZE + s.len(),
            Value::Bytes(b) => VALUE_LEN_SIZE + b.len(),
        }
    }

    /// Build a value from a type name and its textual form.
    ///
    /// `binary` literals are hex. An unknown type name fails with
    /// [`CodecError::UnsupportedType`].
    pub fn parse(type_name: &str, literal: &str) -> Result<Self, CodecError> {
        let type_code: TypeCode = type_name.parse()?;
        let invalid = |reason: String| CodecError::InvalidLiteral {
            type_code,
            literal: literal.to_string(),
            reason,
        };

        let value = match type_code {
            TypeCode::Int64 => Value::Int64(literal.parse().map_err(|e| invalid(format!("{e}")))?),
            TypeCode::UInt64 => {
                Value::UInt64(literal.parse().map_err(|e| invalid(format!("{e}")))?)
            }
            TypeCode::Float64 => {
                Value::Float64(literal.parse().map_err(|e| invalid(format!("{e}")))?)
            }
            TypeCode::Str => Value::Str(literal.to_string()),
            TypeCode::Bytes => Value::Bytes(
                hex::decode(literal)
                    .map_err(|e| invalid(format!("{e}")))?
                    .into(),
            ),
        };
        Ok(value)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

// Floats compare by bit pattern so a decoded NaN equals the encoded one.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(v))
    }
}
