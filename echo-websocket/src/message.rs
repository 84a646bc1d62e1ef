//! Application message envelope.

use serde_json::{Map, Value};

/// A message exchanged with the server.
///
/// Text frames carry JSON documents; binary frames carry raw bytes. Values are
/// created at the send/receive boundary and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WebSocketMessage {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl WebSocketMessage {
    /// Creates a text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Creates a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary(data.into())
    }

    /// Returns true if this is a text message.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns true if this is a binary message.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Returns the text content if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Returns the binary content if this is a binary message.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            Self::Text(_) => None,
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the frame kind, used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// Parses a text payload as a JSON object.
    ///
    /// Returns `None` for binary frames, malformed JSON, or JSON that is not an object.
    #[must_use]
    pub fn json_object(&self) -> Option<Map<String, Value>> {
        match serde_json::from_str(self.as_text()?).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the top-level `"type"` field of a JSON text payload.
    ///
    /// ```
    /// use echo_websocket::WebSocketMessage;
    ///
    /// let msg = WebSocketMessage::text(r#"{"type":"chat","data":{"body":"hi"}}"#);
    /// assert_eq!(msg.message_type().as_deref(), Some("chat"));
    /// assert_eq!(WebSocketMessage::text("plain").message_type(), None);
    /// ```
    #[must_use]
    pub fn message_type(&self) -> Option<String> {
        match self.json_object()?.remove("type")? {
            Value::String(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns the top-level `"data"` field re-serialized as JSON text.
    #[must_use]
    pub fn data(&self) -> Option<String> {
        let data = self.json_object()?.remove("data")?;
        serde_json::to_string(&data).ok()
    }

    /// Consumes the message and returns its raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Binary(b) => b,
        }
    }
}

impl From<String> for WebSocketMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for WebSocketMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for WebSocketMessage {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}
