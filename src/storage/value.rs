//! Values held by the structured store.

use serde::{Deserialize, Serialize};

/// MIME type the optimization pass encodes images into.
pub const OPTIMIZED_MIME: &str = "image/jpeg";
/// Data URL prefix of an optimized image stored as text.
pub const OPTIMIZED_DATA_URL_PREFIX: &str = "data:image/jpeg";

const PREVIEW_CHARS: usize = 50;

/// A payload in the structured store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StoredValue {
    /// Raw string, typically a base64 data URL.
    Text(String),
    /// Structured value stored as-is.
    Json(serde_json::Value),
    /// Binary payload with its declared content type.
    Blob {
        #[serde(with = "blob_bytes")]
        bytes: Vec<u8>,
        content_type: String,
    },
}

impl StoredValue {
    pub fn text(s: impl Into<String>) -> Self {
        StoredValue::Text(s.into())
    }

    pub fn blob(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        StoredValue::Blob {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Size in bytes as accounted by the scanner.
    pub fn size(&self) -> u64 {
        match self {
            StoredValue::Text(s) => s.len() as u64,
            StoredValue::Blob { bytes, .. } => bytes.len() as u64,
            StoredValue::Json(v) => serde_json::to_string(v)
                .map(|s| s.len() as u64)
                .unwrap_or(0),
        }
    }

    /// Whether the value is already in the optimized image encoding.
    pub fn is_optimized(&self) -> bool {
        match self {
            StoredValue::Text(s) => s.starts_with(OPTIMIZED_DATA_URL_PREFIX),
            StoredValue::Blob { content_type, .. } => content_type == OPTIMIZED_MIME,
            StoredValue::Json(_) => false,
        }
    }

    /// Whether the value is a base64 data URL.
    pub fn is_base64_text(&self) -> bool {
        match self {
            StoredValue::Text(s) => s.starts_with("data:") && s.contains(";base64,"),
            _ => false,
        }
    }

    /// Short human-readable preview for item listings.
    pub fn preview(&self) -> String {
        match self {
            StoredValue::Text(s) => truncate_chars(s, PREVIEW_CHARS),
            StoredValue::Blob { content_type, .. } => format!("[Blob {}]", content_type),
            StoredValue::Json(v) => truncate_chars(&v.to_string(), PREVIEW_CHARS),
        }
    }

    /// The value as text, if it has a textual form.
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            StoredValue::Text(s) => Some(std::borrow::Cow::Borrowed(s)),
            StoredValue::Json(v) => Some(std::borrow::Cow::Owned(v.to_string())),
            StoredValue::Blob { bytes, .. } => {
                std::str::from_utf8(bytes).ok().map(std::borrow::Cow::Borrowed)
            }
        }
    }
}

/// Truncates to at most `max` characters, appending an ellipsis when cut.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Blob bytes serialize as base64 so JSON round trips stay compact.
mod blob_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(StoredValue::text("hello").size(), 5);
        assert_eq!(StoredValue::blob(vec![0; 42], "image/png").size(), 42);
        let json = StoredValue::Json(serde_json::json!({"a": 1}));
        assert_eq!(json.size(), r#"{"a":1}"#.len() as u64);
    }

    #[test]
    fn test_optimized_detection() {
        assert!(StoredValue::text("data:image/jpeg;base64,AAAA").is_optimized());
        assert!(!StoredValue::text("data:image/png;base64,AAAA").is_optimized());
        assert!(StoredValue::blob(vec![1], "image/jpeg").is_optimized());
        assert!(!StoredValue::blob(vec![1], "image/png").is_optimized());
    }

    #[test]
    fn test_preview() {
        let long = "x".repeat(80);
        assert_eq!(StoredValue::text(long).preview(), format!("{}...", "x".repeat(50)));
        assert_eq!(StoredValue::blob(vec![], "audio/mpeg").preview(), "[Blob audio/mpeg]");
    }

    #[test]
    fn test_json_round_trip_of_blob() {
        let value = StoredValue::blob(vec![1, 2, 3, 250], "image/png");
        let json = serde_json::to_string(&value).unwrap();
        let back: StoredValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
