//! Property tests over randomized sync scenarios.

use proptest::prelude::*;
use recsync_engine::{CancellationSignal, StoreCall, SyncOutcome};
use recsync_protocol::{Record, RecordId};
use recsync_testkit::{record_id_strategy, worker, PropTestConfig, SyncWorld};
use std::collections::BTreeSet;

fn distinct_ids(max: usize) -> impl Strategy<Value = Vec<RecordId>> {
    prop::collection::btree_set(record_id_strategy(), 0..max)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn pending_records_are_uploaded_in_order(pending in distinct_ids(12)) {
        let world = SyncWorld::new();
        for id in &pending {
            world.store.save_local(Record::new(id.clone()));
        }

        let outcome = world.orchestrator().run(&worker()).unwrap();

        prop_assert_eq!(world.remote.uploaded_ids(), pending.clone());
        prop_assert_eq!(outcome.summary().uploaded, pending.len());
    }

    #[test]
    fn existence_decides_update_or_create(
        local in distinct_ids(10),
        remote in distinct_ids(10),
    ) {
        let world = SyncWorld::new();
        for id in &local {
            world.store.insert_synced(Record::new(id.clone()).with_revision("1-local"));
        }
        for id in &remote {
            world.remote.add_downloadable(Record::new(id.clone()).with_revision("2-remote"));
        }

        let outcome = world.orchestrator().run(&worker()).unwrap();

        let local: BTreeSet<_> = local.into_iter().collect();
        let calls = world.store.calls();
        for id in &remote {
            let updated = calls.contains(&StoreCall::Update(id.clone()));
            let created = calls.contains(&StoreCall::CreateOrUpdate(id.clone()));
            prop_assert_eq!(updated, local.contains(id));
            prop_assert_eq!(created, !local.contains(id));
        }
        prop_assert_eq!(outcome.summary().downloaded, remote.len());
    }

    #[test]
    fn revoked_device_with_pending_work_is_never_wiped(pending in distinct_ids(6)) {
        prop_assume!(!pending.is_empty());
        let world = SyncWorld::revoked();
        for id in &pending {
            world.store.save_local(Record::new(id.clone()));
        }

        let outcome = world.orchestrator().run(&worker()).unwrap();

        prop_assert_eq!(world.revocation.wipe_count(), 0);
        prop_assert_eq!(world.store.pending_count(), pending.len());
        let deferred = matches!(outcome, SyncOutcome::WipeDeferred { .. });
        prop_assert!(deferred);
    }

    #[test]
    fn cancel_during_fetch_stops_after_that_record(
        remote in distinct_ids(10),
        at in 1usize..12,
    ) {
        let world = SyncWorld::new();
        let signal = CancellationSignal::new();
        for id in &remote {
            world.remote.add_downloadable(Record::new(id.clone()));
        }
        world.remote.cancel_on_fetch(at, signal.clone());

        let outcome = world.orchestrator_with(signal).run(&worker()).unwrap();

        let expected = at.min(remote.len());
        prop_assert_eq!(outcome.summary().downloaded, expected);
        prop_assert_eq!(world.remote.fetched_ids().len(), expected);
        // Cancelling on the last fetch leaves no checkpoint to observe it.
        prop_assert_eq!(outcome.is_cancelled(), at < remote.len());
    }
}
