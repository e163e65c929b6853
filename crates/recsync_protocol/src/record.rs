//! Synchronized records and their media attachments.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Client-and-server-stable identifier of a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Server-assigned revision token, e.g. `"1-zxy321"`.
///
/// Revisions are compared for equality only. The format belongs to the
/// server and carries no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Creates a revision token.
    pub fn new(revision: impl Into<String>) -> Self {
        Self(revision.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(revision: &str) -> Self {
        Self::new(revision)
    }
}

/// Identifier of a media attachment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Creates a media id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of media attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A photo.
    Photo,
    /// An audio recording.
    Audio,
}

/// Reference from a record to one of its attachments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    /// Attachment id.
    pub id: MediaId,
    /// Attachment kind.
    pub kind: MediaKind,
}

impl MediaRef {
    /// Creates a photo reference.
    pub fn photo(id: impl Into<String>) -> Self {
        Self {
            id: MediaId::new(id),
            kind: MediaKind::Photo,
        }
    }

    /// Creates an audio reference.
    pub fn audio(id: impl Into<String>) -> Self {
        Self {
            id: MediaId::new(id),
            kind: MediaKind::Audio,
        }
    }
}

/// A downloaded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    /// What this attachment is.
    pub reference: MediaRef,
    /// Raw attachment bytes.
    pub data: Vec<u8>,
}

impl Media {
    /// Creates a downloaded attachment.
    pub fn new(reference: MediaRef, data: Vec<u8>) -> Self {
        Self { reference, data }
    }
}

/// A synchronized record.
///
/// The body is an opaque JSON object carried through unmodified. Only the
/// id, revision and media references are interpreted by recsync.
///
/// # Wire format
///
/// ```json
/// {"_id": "abcd1234", "_rev": "1-zxy321", "media": [{"id": "p1", "kind": "photo"}], "name": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record id.
    #[serde(rename = "_id")]
    pub id: RecordId,
    /// Revision confirmed by the remote, absent for never-synced records.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Revision>,
    /// Attachments referenced by this record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaRef>,
    /// Opaque record body.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record with no revision.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            revision: None,
            media: Vec::new(),
            fields: Map::new(),
        }
    }

    /// Sets the revision.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(Revision::new(revision));
        self
    }

    /// Sets a body field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Adds a media reference.
    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media.push(media);
        self
    }

    /// Returns a body field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns true if the remote has never confirmed this record.
    pub fn is_new(&self) -> bool {
        self.revision.is_none()
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let record: Self = serde_json::from_slice(bytes)?;
        if record.id.as_str().is_empty() {
            return Err(ProtocolError::invalid_structure("record id is empty"));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_builder() {
        let record = Record::new("abcd1234")
            .with_revision("1-zxy321")
            .with_field("name", "Ana")
            .with_media(MediaRef::photo("p1"));

        assert_eq!(record.id.as_str(), "abcd1234");
        assert_eq!(record.revision, Some(Revision::new("1-zxy321")));
        assert_eq!(record.field("name"), Some(&json!("Ana")));
        assert_eq!(record.media.len(), 1);
        assert!(!record.is_new());
        assert!(Record::new("x").is_new());
    }

    #[test]
    fn record_wire_shape() {
        let record = Record::new("abcd1234")
            .with_revision("1-zxy321")
            .with_field("age", 9)
            .with_media(MediaRef::audio("a1"));

        let value: Value = serde_json::from_slice(&record.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "_id": "abcd1234",
                "_rev": "1-zxy321",
                "media": [{"id": "a1", "kind": "audio"}],
                "age": 9
            })
        );
    }

    #[test]
    fn record_without_revision_omits_rev() {
        let value: Value = serde_json::from_slice(&Record::new("n1").encode().unwrap()).unwrap();
        assert_eq!(value, json!({"_id": "n1"}));
    }

    #[test]
    fn decode_keeps_unknown_fields() {
        let record =
            Record::decode(br#"{"_id":"x","_rev":"2-a","gender":"f","photo_keys":[]}"#).unwrap();
        assert_eq!(record.revision.as_ref().map(Revision::as_str), Some("2-a"));
        assert_eq!(record.field("gender"), Some(&json!("f")));
        assert!(record.field("photo_keys").is_some());
    }

    #[test]
    fn decode_rejects_empty_id() {
        let err = Record::decode(br#"{"_id":""}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidStructure { .. }));
    }

    #[test]
    fn decode_rejects_missing_id() {
        assert!(matches!(
            Record::decode(br#"{"name":"x"}"#),
            Err(ProtocolError::Json(_))
        ));
    }
}
