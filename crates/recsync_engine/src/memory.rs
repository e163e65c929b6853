//! In-memory collaborators for tests and simulations.
//!
//! Every double records the calls it receives so tests can assert on call
//! order and counts.

use crate::cancel::CancellationSignal;
use crate::error::{SyncError, SyncResult};
use crate::ports::{
    FormMetadataSource, LocalWipe, ProgressSink, RecordStore, RemoteSyncClient, RevocationService,
};
use crate::progress::SyncEvent;
use parking_lot::{Mutex, RwLock};
use recsync_protocol::{IdRevisionMap, Media, MediaId, Record, RecordId, SyncUser};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A call received by `MemoryRecordStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `pending_changes`
    PendingChanges,
    /// `exists`
    Exists(RecordId),
    /// `update`
    Update(RecordId),
    /// `create_or_update`
    CreateOrUpdate(RecordId),
    /// `local_identifiers_and_revisions`
    LocalIdentifiers,
    /// `attach_media`, with the number of attachments.
    AttachMedia(RecordId, usize),
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: Record,
    pending: bool,
    media: Vec<Media>,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: BTreeMap<RecordId, StoredRecord>,
    /// Ids in the order they were first saved locally.
    pending_order: Vec<RecordId>,
}

impl StoreInner {
    fn clear_pending(&mut self, id: &RecordId) {
        self.pending_order.retain(|p| p != id);
    }
}

/// A record store held in memory.
///
/// Local edits go through `save_local` and are pending until the remote
/// copy is written back through `update` or `create_or_update`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    inner: RwLock<StoreInner>,
    calls: Mutex<Vec<StoreCall>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves a local edit, marking the record pending.
    pub fn save_local(&self, record: Record) {
        let mut inner = self.inner.write();
        let id = record.id.clone();
        let media = inner
            .records
            .remove(&id)
            .map(|stored| stored.media)
            .unwrap_or_default();
        inner.records.insert(
            id.clone(),
            StoredRecord {
                record,
                pending: true,
                media,
            },
        );
        if !inner.pending_order.contains(&id) {
            inner.pending_order.push(id);
        }
    }

    /// Seeds a record already in sync with the remote.
    pub fn insert_synced(&self, record: Record) {
        let mut inner = self.inner.write();
        let id = record.id.clone();
        inner.clear_pending(&id);
        inner.records.insert(
            id,
            StoredRecord {
                record,
                pending: false,
                media: Vec::new(),
            },
        );
    }

    /// Gets a record.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.inner.read().records.get(id).map(|s| s.record.clone())
    }

    /// Returns true if the record is pending.
    pub fn is_pending(&self, id: &RecordId) -> bool {
        self.inner
            .read()
            .records
            .get(id)
            .is_some_and(|s| s.pending)
    }

    /// Attachments stored for a record.
    pub fn media_for(&self, id: &RecordId) -> Vec<Media> {
        self.inner
            .read()
            .records
            .get(id)
            .map(|s| s.media.clone())
            .unwrap_or_default()
    }

    /// Every record, sorted by id.
    pub fn records(&self) -> Vec<Record> {
        self.inner
            .read()
            .records
            .values()
            .map(|s| s.record.clone())
            .collect()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Number of pending records.
    pub fn pending_count(&self) -> usize {
        self.inner.read().pending_order.len()
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    fn record_call(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }

    fn write_remote(&self, record: Record) {
        let mut inner = self.inner.write();
        let id = record.id.clone();
        inner.clear_pending(&id);
        let media = inner
            .records
            .remove(&id)
            .map(|stored| stored.media)
            .unwrap_or_default();
        inner.records.insert(
            id,
            StoredRecord {
                record,
                pending: false,
                media,
            },
        );
    }
}

impl RecordStore for MemoryRecordStore {
    fn pending_changes(&self) -> SyncResult<Vec<Record>> {
        self.record_call(StoreCall::PendingChanges);
        let inner = self.inner.read();
        Ok(inner
            .pending_order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .map(|s| s.record.clone())
            .collect())
    }

    fn exists(&self, id: &RecordId) -> SyncResult<bool> {
        self.record_call(StoreCall::Exists(id.clone()));
        Ok(self.inner.read().records.contains_key(id))
    }

    fn update(&self, record: Record) -> SyncResult<()> {
        self.record_call(StoreCall::Update(record.id.clone()));
        if !self.inner.read().records.contains_key(&record.id) {
            return Err(SyncError::store(format!(
                "cannot update missing record {}",
                record.id
            )));
        }
        self.write_remote(record);
        Ok(())
    }

    fn create_or_update(&self, record: Record) -> SyncResult<()> {
        self.record_call(StoreCall::CreateOrUpdate(record.id.clone()));
        self.write_remote(record);
        Ok(())
    }

    fn local_identifiers_and_revisions(&self) -> SyncResult<IdRevisionMap> {
        self.record_call(StoreCall::LocalIdentifiers);
        Ok(self
            .inner
            .read()
            .records
            .values()
            .filter_map(|s| {
                s.record
                    .revision
                    .clone()
                    .map(|rev| (s.record.id.clone(), rev))
            })
            .collect())
    }

    fn attach_media(&self, id: &RecordId, media: Vec<Media>) -> SyncResult<()> {
        self.record_call(StoreCall::AttachMedia(id.clone(), media.len()));
        let mut inner = self.inner.write();
        let stored = inner
            .records
            .get_mut(id)
            .ok_or_else(|| SyncError::store(format!("cannot attach media to missing record {id}")))?;
        for item in media {
            stored
                .media
                .retain(|existing| existing.reference.id != item.reference.id);
            stored.media.push(item);
        }
        Ok(())
    }
}

impl LocalWipe for MemoryRecordStore {
    fn wipe_local_data(&self) -> SyncResult<()> {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.pending_order.clear();
        Ok(())
    }
}

/// A failure a mock collaborator can be told to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// `SyncError::AuthExpired`
    AuthExpired,
    /// `SyncError::Transport`
    Transport {
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// `SyncError::NotFound`
    NotFound,
}

impl MockFailure {
    fn to_error(&self, id: &RecordId) -> SyncError {
        match self {
            MockFailure::AuthExpired => SyncError::AuthExpired("401 Unauthorized".into()),
            MockFailure::Transport { retryable: true } => {
                SyncError::transport_retryable(format!("connection reset while syncing {id}"))
            }
            MockFailure::Transport { retryable: false } => {
                SyncError::transport_fatal(format!("request for {id} rejected"))
            }
            MockFailure::NotFound => SyncError::NotFound(id.clone()),
        }
    }
}

/// A call received by `MockRemoteClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `upload`, with the user name.
    Upload(RecordId, String),
    /// `remote_identifiers_to_download`
    ListDownloadable,
    /// `fetch_record`, with the requested id.
    Fetch(RecordId),
    /// `fetch_media`
    FetchMedia(RecordId),
}

#[derive(Debug, Default)]
struct RemoteInner {
    /// Records served by `fetch_record`, keyed by the id that is requested.
    records: HashMap<RecordId, Record>,
    downloadable: Vec<RecordId>,
    media: HashMap<MediaId, Vec<u8>>,
    uploaded: Vec<Record>,
    upload_failures: HashMap<RecordId, MockFailure>,
    fetch_failures: HashMap<RecordId, MockFailure>,
    listing_failure: Option<MockFailure>,
    cancel_on_upload: Option<(usize, CancellationSignal)>,
    cancel_on_fetch: Option<(usize, CancellationSignal)>,
}

/// A scriptable remote for testing.
#[derive(Debug, Default)]
pub struct MockRemoteClient {
    inner: Mutex<RemoteInner>,
    calls: Mutex<Vec<RemoteCall>>,
    uploads: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockRemoteClient {
    /// Creates a remote with nothing to download.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a record under its own id and lists it for download.
    pub fn add_downloadable(&self, record: Record) {
        let id = record.id.clone();
        self.add_downloadable_as(id, record);
    }

    /// Serves a record under `requested` and lists `requested` for download.
    ///
    /// The served record keeps its own id, which models a remote that
    /// canonicalizes ids on fetch.
    pub fn add_downloadable_as(&self, requested: impl Into<RecordId>, record: Record) {
        let requested = requested.into();
        let mut inner = self.inner.lock();
        inner.records.insert(requested.clone(), record);
        inner.downloadable.push(requested);
    }

    /// Replaces the download listing.
    pub fn set_downloadable(&self, ids: Vec<RecordId>) {
        self.inner.lock().downloadable = ids;
    }

    /// Serves attachment bytes.
    pub fn add_media(&self, id: impl Into<String>, data: Vec<u8>) {
        self.inner.lock().media.insert(MediaId::new(id), data);
    }

    /// Makes the upload of a record fail.
    pub fn fail_upload_of(&self, id: impl Into<RecordId>, failure: MockFailure) {
        self.inner.lock().upload_failures.insert(id.into(), failure);
    }

    /// Makes the fetch of a record fail.
    pub fn fail_fetch_of(&self, id: impl Into<RecordId>, failure: MockFailure) {
        self.inner.lock().fetch_failures.insert(id.into(), failure);
    }

    /// Makes the download listing fail.
    pub fn fail_listing(&self, failure: MockFailure) {
        self.inner.lock().listing_failure = Some(failure);
    }

    /// Cancels `signal` while serving the `nth` upload (1-based).
    pub fn cancel_on_upload(&self, nth: usize, signal: CancellationSignal) {
        self.inner.lock().cancel_on_upload = Some((nth, signal));
    }

    /// Cancels `signal` while serving the `nth` fetch (1-based).
    pub fn cancel_on_fetch(&self, nth: usize, signal: CancellationSignal) {
        self.inner.lock().cancel_on_fetch = Some((nth, signal));
    }

    /// Records uploaded successfully, in order.
    pub fn uploaded(&self) -> Vec<Record> {
        self.inner.lock().uploaded.clone()
    }

    /// Ids uploaded successfully, in order.
    pub fn uploaded_ids(&self) -> Vec<RecordId> {
        self.uploaded().into_iter().map(|r| r.id).collect()
    }

    /// Ids requested through `fetch_record`, in order.
    pub fn fetched_ids(&self) -> Vec<RecordId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Fetch(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    fn record_call(&self, call: RemoteCall) {
        self.calls.lock().push(call);
    }
}

fn maybe_cancel(hook: &Option<(usize, CancellationSignal)>, count: usize) {
    if let Some((nth, signal)) = hook {
        if *nth == count {
            signal.cancel();
        }
    }
}

impl RemoteSyncClient for MockRemoteClient {
    fn upload(&self, record: &Record, user: &SyncUser) -> SyncResult<()> {
        self.record_call(RemoteCall::Upload(record.id.clone(), user.user_name.clone()));
        let count = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let mut inner = self.inner.lock();
        maybe_cancel(&inner.cancel_on_upload, count);
        if let Some(failure) = inner.upload_failures.get(&record.id) {
            return Err(failure.to_error(&record.id));
        }
        inner.uploaded.push(record.clone());
        Ok(())
    }

    fn remote_identifiers_to_download(&self) -> SyncResult<Vec<RecordId>> {
        self.record_call(RemoteCall::ListDownloadable);
        let inner = self.inner.lock();
        if let Some(failure) = &inner.listing_failure {
            return Err(failure.to_error(&RecordId::new("*")));
        }
        Ok(inner.downloadable.clone())
    }

    fn fetch_record(&self, id: &RecordId) -> SyncResult<Record> {
        self.record_call(RemoteCall::Fetch(id.clone()));
        let count = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.lock();
        maybe_cancel(&inner.cancel_on_fetch, count);
        if let Some(failure) = inner.fetch_failures.get(id) {
            return Err(failure.to_error(id));
        }
        inner
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.clone()))
    }

    fn fetch_media(&self, record: &Record) -> SyncResult<Vec<Media>> {
        self.record_call(RemoteCall::FetchMedia(record.id.clone()));
        let inner = self.inner.lock();
        record
            .media
            .iter()
            .map(|reference| {
                inner
                    .media
                    .get(&reference.id)
                    .map(|data| Media::new(reference.clone(), data.clone()))
                    .ok_or_else(|| SyncError::NotFound(record.id.clone()))
            })
            .collect()
    }
}

/// A revocation service with a fixed answer.
pub struct MockRevocationService {
    revoked: bool,
    checks: AtomicUsize,
    wipes: AtomicUsize,
    target: Option<Arc<dyn LocalWipe>>,
}

impl MockRevocationService {
    /// Creates a service that always answers `revoked`.
    pub fn new(revoked: bool) -> Self {
        Self {
            revoked,
            checks: AtomicUsize::new(0),
            wipes: AtomicUsize::new(0),
            target: None,
        }
    }

    /// Wipes `target` when `wipe` is called.
    pub fn wiping(mut self, target: Arc<dyn LocalWipe>) -> Self {
        self.target = Some(target);
        self
    }

    /// Number of `is_revoked` calls.
    pub fn revoked_checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// Number of `wipe` calls.
    pub fn wipe_count(&self) -> usize {
        self.wipes.load(Ordering::SeqCst)
    }
}

impl RevocationService for MockRevocationService {
    fn is_revoked(&self) -> SyncResult<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.revoked)
    }

    fn wipe(&self) -> SyncResult<()> {
        self.wipes.fetch_add(1, Ordering::SeqCst);
        match &self.target {
            Some(target) => target.wipe_local_data(),
            None => Ok(()),
        }
    }
}

/// A form source that always installs the same number of sections.
#[derive(Debug, Default)]
pub struct StaticFormSource {
    sections: usize,
    fetches: AtomicUsize,
}

impl StaticFormSource {
    /// Creates a source reporting `sections` sections.
    pub fn new(sections: usize) -> Self {
        Self {
            sections,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetches so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl FormMetadataSource for StaticFormSource {
    fn fetch_published_forms(&self) -> SyncResult<usize> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.sections)
    }
}

/// A progress sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingProgressSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn on_event(&self, event: SyncEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recsync_protocol::MediaRef;

    #[test]
    fn pending_follows_local_save_order() {
        let store = MemoryRecordStore::new();
        store.save_local(Record::new("b"));
        store.save_local(Record::new("a"));
        store.save_local(Record::new("b").with_field("name", "edited"));

        let pending: Vec<_> = store
            .pending_changes()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(pending, vec![RecordId::new("b"), RecordId::new("a")]);
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn remote_writes_clear_pending() {
        let store = MemoryRecordStore::new();
        store.save_local(Record::new("a"));
        store
            .update(Record::new("a").with_revision("1-x"))
            .unwrap();
        assert!(!store.is_pending(&"a".into()));
        assert!(store.pending_changes().unwrap().is_empty());
    }

    #[test]
    fn update_of_missing_record_fails() {
        let store = MemoryRecordStore::new();
        let err = store.update(Record::new("ghost")).unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
    }

    #[test]
    fn identifiers_skip_unconfirmed_records() {
        let store = MemoryRecordStore::new();
        store.save_local(Record::new("new"));
        store.insert_synced(Record::new("old").with_revision("3-cdsf76"));

        let map = store.local_identifiers_and_revisions().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"old".into()).unwrap().as_str(), "3-cdsf76");
    }

    #[test]
    fn attached_media_replaces_same_id() {
        let store = MemoryRecordStore::new();
        store.insert_synced(Record::new("a"));
        let photo = MediaRef::photo("p1");
        store
            .attach_media(&"a".into(), vec![Media::new(photo.clone(), vec![1])])
            .unwrap();
        store
            .attach_media(&"a".into(), vec![Media::new(photo, vec![2])])
            .unwrap();

        let media = store.media_for(&"a".into());
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].data, vec![2]);
    }

    #[test]
    fn wipe_clears_everything() {
        let store = MemoryRecordStore::new();
        store.save_local(Record::new("a"));
        store.insert_synced(Record::new("b"));
        store.wipe_local_data().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn mock_remote_unknown_record_is_not_found() {
        let remote = MockRemoteClient::new();
        let err = remote.fetch_record(&"nope".into()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn mock_revocation_wipes_target() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert_synced(Record::new("a"));
        let service = MockRevocationService::new(true).wiping(store.clone());

        assert!(service.is_revoked().unwrap());
        service.wipe().unwrap();
        assert_eq!(service.wipe_count(), 1);
        assert!(store.is_empty());
    }
}
