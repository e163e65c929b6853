//! Collaborator interfaces the orchestrator is driven through.
//!
//! Every collaborator is injected into the orchestrator; none is looked up
//! globally. Implementations must be `Send + Sync` so a run can be moved to a
//! background thread while the caller keeps a handle for cancellation.

use crate::error::SyncResult;
use crate::progress::SyncEvent;
use recsync_protocol::{IdRevisionMap, Media, Record, RecordId, SyncUser};

/// Local record storage.
///
/// The orchestrator serializes all calls, so implementations need not
/// support concurrent writers on its behalf.
pub trait RecordStore: Send + Sync {
    /// Records changed locally and not yet confirmed by the remote.
    ///
    /// Order is store-defined and stable for the duration of the call.
    fn pending_changes(&self) -> SyncResult<Vec<Record>>;

    /// Returns true if a record with this id is held locally.
    fn exists(&self, id: &RecordId) -> SyncResult<bool>;

    /// Replaces an existing local record with the remote copy.
    fn update(&self, record: Record) -> SyncResult<()>;

    /// Inserts a remote record, replacing any local copy.
    fn create_or_update(&self, record: Record) -> SyncResult<()>;

    /// Every local id with its current revision.
    ///
    /// Records never confirmed by the remote have no revision and are left
    /// out.
    fn local_identifiers_and_revisions(&self) -> SyncResult<IdRevisionMap>;

    /// Stores downloaded attachments against a local record.
    fn attach_media(&self, id: &RecordId, media: Vec<Media>) -> SyncResult<()>;
}

/// The remote authoritative store.
pub trait RemoteSyncClient: Send + Sync {
    /// Uploads one pending record on behalf of a user.
    ///
    /// Fails with `AuthExpired` or `Transport`.
    fn upload(&self, record: &Record, user: &SyncUser) -> SyncResult<()>;

    /// Ids the remote considers worth downloading for this client.
    fn remote_identifiers_to_download(&self) -> SyncResult<Vec<RecordId>>;

    /// Fetches one remote record.
    ///
    /// Fails with `NotFound` if the record vanished after being listed. The
    /// returned record may carry a canonical id different from `id`.
    fn fetch_record(&self, id: &RecordId) -> SyncResult<Record>;

    /// Fetches the attachments referenced by a record.
    fn fetch_media(&self, record: &Record) -> SyncResult<Vec<Media>>;
}

/// Remote revocation ("blacklist") of this device.
pub trait RevocationService: Send + Sync {
    /// Asks the remote whether this device has been revoked.
    fn is_revoked(&self) -> SyncResult<bool>;

    /// Irreversibly deletes all local data.
    fn wipe(&self) -> SyncResult<()>;
}

/// Source of the published form schema.
pub trait FormMetadataSource: Send + Sync {
    /// Fetches and installs the published form sections.
    ///
    /// Returns how many sections were installed.
    fn fetch_published_forms(&self) -> SyncResult<usize>;
}

/// Receiver of lifecycle notifications.
///
/// Fire and forget: the orchestrator never waits on or reads back from the
/// sink. Implementations that need a particular thread must hop there
/// themselves.
pub trait ProgressSink: Send + Sync {
    /// Handles one lifecycle event.
    fn on_event(&self, event: SyncEvent);
}

/// Something that can erase all local data.
///
/// Used by revocation adapters that learn about revocation remotely but
/// wipe locally.
pub trait LocalWipe: Send + Sync {
    /// Deletes every local record and attachment.
    fn wipe_local_data(&self) -> SyncResult<()>;
}
