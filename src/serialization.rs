//! Pluggable serialization of interaction documents

use serde_json::Value as Json;

use crate::error::SerializationError;

/// Trait for turning encoded interaction documents into bytes and back
pub trait DocumentSerializer {
    /// Serialize a document to bytes
    fn serialize(&self, document: &Json) -> Result<Vec<u8>, SerializationError>;

    /// Deserialize a document from bytes
    fn deserialize(&self, bytes: &[u8]) -> Result<Json, SerializationError>;

    /// Get the name of this serialization method
    fn name(&self) -> &str;

    /// Get the version of this serialization method
    fn version(&self) -> &str;
}

/// JSON serialization backend
///
/// Mapping keys are always written in sorted order, so the same recording
/// produces the same bytes.
#[derive(Debug, Clone)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Pretty-printed output with two-space indentation
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line output
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn with_pretty(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSerializer for JsonSerializer {
    fn serialize(&self, document: &Json) -> Result<Vec<u8>, SerializationError> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(document)
        } else {
            serde_json::to_vec(document)
        };

        result.map_err(|e| SerializationError::SerializationFailed {
            reason: format!("JSON serialization failed: {}", e),
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Json, SerializationError> {
        serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("JSON deserialization failed: {}", e),
        })
    }

    fn name(&self) -> &str {
        "json"
    }

    fn version(&self) -> &str {
        "1.0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Json {
        json!({
            "__type__": "RecordingMock",
            "recorded_attribute_accesses": {"b": [1, 2], "a": {"__repeat__": "x"}}
        })
    }

    #[test]
    fn test_json_serializer_round_trip() {
        let serializer = JsonSerializer::compact();

        let bytes = serializer.serialize(&document()).unwrap();
        let restored = serializer.deserialize(&bytes).unwrap();

        assert_eq!(restored, document());
    }

    #[test]
    fn test_json_pretty_serializer() {
        let serializer = JsonSerializer::default();
        let text = String::from_utf8(serializer.serialize(&document()).unwrap()).unwrap();

        // Pretty printed JSON should contain newlines
        assert!(text.contains("\n  \""));
        assert!(serializer.is_pretty());
    }

    #[test]
    fn test_keys_are_sorted() {
        let text = String::from_utf8(JsonSerializer::compact().serialize(&document()).unwrap()).unwrap();
        let a = text.find("\"a\"").unwrap();
        let b = text.find("\"b\"").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_invalid_bytes() {
        let err = JsonSerializer::new().deserialize(b"{not json").unwrap_err();
        assert!(matches!(err, SerializationError::DeserializationFailed { .. }));
    }

    #[test]
    fn test_serializer_name_and_version() {
        let json = JsonSerializer::new();
        assert_eq!(json.name(), "json");
        assert_eq!(json.version(), "1.0");
    }
}
