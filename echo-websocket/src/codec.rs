//! Wire codec for JSON text frames.
//!
//! [`MessageCodec`] is object-safe so a session can hold any backend behind an
//! `Arc<dyn MessageCodec>`. The typed generic API lives on [`MessageCodecExt`],
//! which every codec gets for free.

use echo_core::error::{SerializationError, WebSocketError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// JSON backend used to encode and decode text payloads.
pub trait MessageCodec: Send + Sync + std::fmt::Debug {
    /// Encodes a JSON value to text.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Serialization` if the value cannot be encoded.
    fn serialize_value(&self, value: &Value) -> Result<String, WebSocketError>;

    /// Encodes a JSON value to UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Serialization` if the value cannot be encoded.
    fn serialize_value_to_bytes(&self, value: &Value) -> Result<Vec<u8>, WebSocketError> {
        self.serialize_value(value).map(String::into_bytes)
    }

    /// Parses text into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a `SerializationError` carrying the offending payload.
    fn deserialize_value(&self, payload: &str) -> Result<Value, SerializationError>;
}

/// Typed encode/decode built on top of [`MessageCodec`].
pub trait MessageCodecExt: MessageCodec {
    /// Serializes `value` to JSON text.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Serialization` if the value cannot be encoded.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, WebSocketError> {
        let value = serde_json::to_value(value).map_err(|e| WebSocketError::Serialization {
            reason: format!("Failed to serialize message: {e}"),
            payload: None,
        })?;
        self.serialize_value(&value)
    }

    /// Serializes `value` to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Serialization` if the value cannot be encoded.
    fn serialize_to_bytes<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, WebSocketError> {
        self.serialize(value).map(String::into_bytes)
    }

    /// Deserializes `payload`, failing with a `WebSocketError::Serialization`
    /// that carries the original payload.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Serialization` on malformed or mistyped input.
    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T, WebSocketError> {
        self.deserialize_safe(payload).map_err(Into::into)
    }

    /// Deserializes `payload` into the narrow `SerializationError` result.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` on malformed or mistyped input.
    fn deserialize_safe<T: DeserializeOwned>(&self, payload: &str) -> Result<T, SerializationError> {
        let value = self.deserialize_value(payload)?;
        serde_json::from_value(value).map_err(|e| {
            SerializationError::new(
                format!("Failed to deserialize message: {e}"),
                Some(payload.to_string()),
            )
        })
    }
}

impl<C: MessageCodec + ?Sized> MessageCodecExt for C {}

/// `serde_json` implementation of [`MessageCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    /// Whether to use pretty printing for JSON.
    pub pretty: bool,
}

impl JsonCodec {
    /// Creates a compact JSON codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with pretty printing enabled.
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl MessageCodec for JsonCodec {
    fn serialize_value(&self, value: &Value) -> Result<String, WebSocketError> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| WebSocketError::Serialization {
            reason: format!("Failed to serialize to JSON: {e}"),
            payload: None,
        })
    }

    fn deserialize_value(&self, payload: &str) -> Result<Value, SerializationError> {
        serde_json::from_str(payload).map_err(|e| {
            SerializationError::new(
                format!("Failed to parse JSON: {e}"),
                Some(payload.to_string()),
            )
        })
    }
}
