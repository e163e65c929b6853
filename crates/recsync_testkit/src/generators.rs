//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random records, revision maps and
//! sync scenarios.

use proptest::prelude::*;
use recsync_protocol::{IdRevisionMap, MediaRef, Record, RecordId, Revision, SyncUser};

/// Strategy for generating record identifiers.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    prop::string::string_regex("[a-z0-9]{4,12}")
        .expect("Invalid regex")
        .prop_map(RecordId::new)
}

/// Strategy for generating revisions in `<generation>-<hash>` form.
pub fn revision_strategy() -> impl Strategy<Value = Revision> {
    (
        1u32..20,
        prop::string::string_regex("[a-f0-9]{6}").expect("Invalid regex"),
    )
        .prop_map(|(generation, hash)| Revision::new(format!("{generation}-{hash}")))
}

/// Strategy for generating a record with a few string fields.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (
        record_id_strategy(),
        prop::option::of(revision_strategy()),
        prop::collection::vec(
            (
                prop::string::string_regex("[a-z]{1,10}").expect("Invalid regex"),
                prop::string::string_regex("[A-Za-z ]{0,20}").expect("Invalid regex"),
            ),
            0..5,
        ),
        prop::collection::vec(
            prop::string::string_regex("[a-z0-9]{4}").expect("Invalid regex"),
            0..3,
        ),
    )
        .prop_map(|(id, revision, fields, photos)| {
            let mut record = Record::new(id);
            record.revision = revision;
            for (name, value) in fields {
                // Reserved wire names would collide with the envelope.
                if name != "media" {
                    record = record.with_field(name, value);
                }
            }
            for photo in photos {
                record = record.with_media(MediaRef::photo(photo));
            }
            record
        })
}

/// Strategy for generating an id → revision map.
pub fn id_revision_map_strategy(max_len: usize) -> impl Strategy<Value = IdRevisionMap> {
    prop::collection::vec((record_id_strategy(), revision_strategy()), 0..max_len)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Strategy for generating a local map and a remote map that overlap.
///
/// Some remote entries share the local revision, some carry a different
/// one and some are remote-only.
pub fn overlapping_maps_strategy(
    max_len: usize,
) -> impl Strategy<Value = (IdRevisionMap, IdRevisionMap)> {
    prop::collection::vec(
        (record_id_strategy(), revision_strategy(), 0u8..3),
        0..max_len,
    )
    .prop_map(|entries| {
        let mut local = IdRevisionMap::new();
        let mut remote = IdRevisionMap::new();
        for (id, revision, relation) in entries {
            match relation {
                0 => {
                    local.insert(id.clone(), revision.clone());
                    remote.insert(id, revision);
                }
                1 => {
                    local.insert(id.clone(), Revision::new(format!("0-{}", revision.as_str())));
                    remote.insert(id, revision);
                }
                _ => {
                    remote.insert(id, revision);
                }
            }
        }
        (local, remote)
    })
}

/// Strategy for generating sync users.
pub fn sync_user_strategy() -> impl Strategy<Value = SyncUser> {
    (
        prop::string::string_regex("[a-z]{3,12}").expect("Invalid regex"),
        prop::option::of(prop::string::string_regex("[A-Z]{2,6}").expect("Invalid regex")),
    )
        .prop_map(|(name, organisation)| {
            let user = SyncUser::new(name);
            match organisation {
                Some(organisation) => user.with_organisation(organisation),
                None => user,
            }
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn revisions_have_generation_prefix(revision in revision_strategy()) {
            let (generation, hash) = revision.as_str().split_once('-').unwrap();
            prop_assert!(generation.parse::<u32>().is_ok());
            prop_assert_eq!(hash.len(), 6);
        }

        #[test]
        fn generated_records_round_trip(record in record_strategy()) {
            let decoded = Record::decode(&record.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, record);
        }

        #[test]
        fn overlapping_maps_keep_local_within_remote((local, remote) in overlapping_maps_strategy(20)) {
            for (id, _) in local.iter() {
                prop_assert!(remote.contains(id));
            }
        }
    }
}
