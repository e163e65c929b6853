//! JSON documents exchanged with the remote store.

use crate::diff::IdRevisionMap;
use crate::error::{ProtocolError, ProtocolResult};
use crate::record::{RecordId, Revision};
use serde::{Deserialize, Serialize};

/// One entry of the remote index listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIndexEntry {
    /// Record id.
    #[serde(rename = "_id")]
    pub id: RecordId,
    /// Current remote revision.
    #[serde(rename = "_rev")]
    pub revision: Revision,
}

/// The remote's listing of every record id with its current revision.
///
/// Wire format: `[{"_id": "...", "_rev": "..."}, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteIndex {
    /// Listed entries, in server order.
    pub entries: Vec<RemoteIndexEntry>,
}

impl RemoteIndex {
    /// Builds an index from an id/revision map.
    pub fn from_map(map: &IdRevisionMap) -> Self {
        Self {
            entries: map
                .iter()
                .map(|(id, revision)| RemoteIndexEntry {
                    id: id.clone(),
                    revision: revision.clone(),
                })
                .collect(),
        }
    }

    /// Converts the listing into an id/revision map.
    ///
    /// Fails if the server listed the same id twice.
    pub fn into_map(self) -> ProtocolResult<IdRevisionMap> {
        let mut map = IdRevisionMap::new();
        for entry in self.entries {
            let id = entry.id.clone();
            if map.insert(entry.id, entry.revision).is_some() {
                return Err(ProtocolError::invalid_structure(format!(
                    "duplicate id in remote index: {id}"
                )));
            }
        }
        Ok(map)
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Revocation status of a device.
///
/// Wire format: `{"blacklisted": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistStatus {
    /// Whether the device has been revoked.
    pub blacklisted: bool,
}

impl BlacklistStatus {
    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// One field of a published form section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Field name, used as the key in record bodies.
    pub name: String,
    /// Field type as published by the server (e.g. `text_field`).
    #[serde(rename = "type")]
    pub field_type: String,
}

/// A published form section describing part of the record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSection {
    /// Section name.
    pub name: String,
    /// Display order.
    #[serde(default)]
    pub order: u32,
    /// Whether the section is shown.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Fields in display order.
    #[serde(default)]
    pub fields: Vec<FormField>,
}

fn default_enabled() -> bool {
    true
}

impl FormSection {
    /// Decodes a list of sections from JSON, sorted by display order.
    pub fn decode_list(bytes: &[u8]) -> ProtocolResult<Vec<Self>> {
        let mut sections: Vec<Self> = serde_json::from_slice(bytes)?;
        sections.sort_by_key(|s| s.order);
        Ok(sections)
    }

    /// Encodes a list of sections to JSON.
    pub fn encode_list(sections: &[Self]) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(sections)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_index_decodes_into_map() {
        let index = RemoteIndex::decode(
            br#"[{"_id":"qwerty0987","_rev":"1-a"},{"_id":"abcd1234","_rev":"2-b"}]"#,
        )
        .unwrap();
        assert_eq!(index.entries.len(), 2);

        let map = index.into_map().unwrap();
        assert_eq!(map.get(&"abcd1234".into()), Some(&Revision::new("2-b")));
    }

    #[test]
    fn remote_index_rejects_duplicates() {
        let index =
            RemoteIndex::decode(br#"[{"_id":"a","_rev":"1"},{"_id":"a","_rev":"2"}]"#).unwrap();
        assert!(matches!(
            index.into_map(),
            Err(ProtocolError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn remote_index_from_map_is_sorted() {
        let map: IdRevisionMap = [("b", "1"), ("a", "2")]
            .into_iter()
            .map(|(id, rev)| (RecordId::new(id), Revision::new(rev)))
            .collect();
        let index = RemoteIndex::from_map(&map);
        assert_eq!(index.entries[0].id.as_str(), "a");
        assert_eq!(
            String::from_utf8(index.encode().unwrap()).unwrap(),
            r#"[{"_id":"a","_rev":"2"},{"_id":"b","_rev":"1"}]"#
        );
    }

    #[test]
    fn blacklist_status() {
        assert!(BlacklistStatus::decode(br#"{"blacklisted":true}"#).unwrap().blacklisted);
        assert!(BlacklistStatus::decode(br#"{"blacklisted":"yes"}"#).is_err());
    }

    #[test]
    fn form_sections_sorted_with_defaults() {
        let sections = FormSection::decode_list(
            br#"[
                {"name":"Family details","order":2,"fields":[{"name":"mother","type":"text_field"}]},
                {"name":"Basic identity","order":1}
            ]"#,
        )
        .unwrap();
        assert_eq!(sections[0].name, "Basic identity");
        assert!(sections[0].enabled);
        assert!(sections[0].fields.is_empty());
        assert_eq!(sections[1].fields[0].field_type, "text_field");
    }
}
