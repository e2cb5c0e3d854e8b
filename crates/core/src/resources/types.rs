//! Types for the handle store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a media handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(String);

impl HandleId {
    /// Generate a fresh handle id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HandleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Role of a handle within a job's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    /// Input bytes, created at submission for preview and as the run source.
    Input,
    /// Output bytes, created at successful completion for download.
    Output,
}

/// An in-memory byte buffer exposed to callers for preview or download.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    /// Handle identifier.
    pub id: HandleId,
    /// Role of this handle.
    pub kind: HandleKind,
    /// File name presented to the caller.
    pub file_name: String,
    /// MIME type of the buffer.
    pub content_type: String,
    /// The bytes themselves; cloning is cheap.
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_id_uniqueness() {
        let a = HandleId::generate();
        let b = HandleId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_handle_id_display() {
        let id = HandleId::from("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_handle_kind_serialization() {
        assert_eq!(serde_json::to_string(&HandleKind::Input).unwrap(), "\"input\"");
        assert_eq!(
            serde_json::to_string(&HandleKind::Output).unwrap(),
            "\"output\""
        );
    }
}
