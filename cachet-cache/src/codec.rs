//! Value encoding: serialization and compression.
//!
//! Typed values pivot through [`serde_json::Value`]. A [`ValueSerializer`]
//! turns that into the string stored in the backing store; strings pass
//! through unchanged with the default [`JsonSerializer`]. Payloads above the
//! configured threshold are gzip-compressed.

use crate::error::{CacheError, CacheResult};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::{Read, Write};

/// Pluggable string encoding for cached values.
pub trait ValueSerializer: Send + Sync {
    /// Serializer name, for logs.
    fn name(&self) -> &'static str;

    /// Encode a value into its stored form.
    fn serialize(&self, value: &Value) -> CacheResult<String>;

    /// Decode a stored form. Must not fail: payloads the serializer cannot
    /// read come back as [`Value::String`] holding the raw text.
    fn deserialize(&self, raw: &str) -> Value;
}

/// JSON serializer with string pass-through.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl ValueSerializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, value: &Value) -> CacheResult<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => {
                serde_json::to_string(other).map_err(|e| CacheError::Serialization(e.to_string()))
            }
        }
    }

    fn deserialize(&self, raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }
}

/// Convert a typed value into the serializer's input.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> CacheResult<Value> {
    serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

/// Convert a decoded value into `T`.
///
/// A string that happens to look like JSON (`"123"`) decodes as a number;
/// when `T` rejects that, the raw text is offered to `T` as a string.
pub fn from_value<T: DeserializeOwned>(value: Value, raw: &str) -> CacheResult<T> {
    let reparsed_string = matches!(&value, Value::String(s) if s == raw);
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(decoded),
        Err(_) if !reparsed_string => serde_json::from_value(Value::String(raw.to_string()))
            .map_err(|e| CacheError::Deserialization(e.to_string())),
        Err(e) => Err(CacheError::Deserialization(e.to_string())),
    }
}

/// Whether a serialized payload is large enough to compress.
pub fn should_compress(serialized: &str, threshold: usize) -> bool {
    serialized.len() > threshold
}

/// Gzip-compress a payload.
pub fn compress(data: &[u8]) -> CacheResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CacheError::Compression(e.to_string()))
}

/// Reverse [`compress`].
pub fn decompress(data: &[u8]) -> CacheResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    Ok(out)
}

/// Interpret stored bytes as UTF-8 text.
pub fn utf8(bytes: Vec<u8>) -> CacheResult<String> {
    String::from_utf8(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
}
