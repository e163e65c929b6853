//! Test fixtures and orchestrator helpers.
//!
//! Provides sample records and ready-wired collaborator sets for common
//! sync scenarios.

use crate::server::MemoryServer;
use recsync_engine::{
    CancellationSignal, Collaborators, HttpFormSource, HttpRevocationService, HttpSyncClient,
    LoopbackClient, MemoryRecordStore, MockRemoteClient, MockRevocationService,
    RecordingProgressSink, StaticFormSource, SyncConfig, SyncOrchestrator,
};
use recsync_protocol::{IdRevisionMap, Record, Revision, SyncUser};
use std::sync::Arc;

/// Server URL used by fixtures.
pub const TEST_SERVER_URL: &str = "http://sync.test";

/// Device id used by fixtures.
pub const TEST_DEVICE_ID: &str = "device-under-test";

/// Session token used by fixtures.
pub const TEST_TOKEN: &str = "session-token";

/// A signed-in field worker.
pub fn worker() -> SyncUser {
    SyncUser::new("field-worker").with_organisation("UNICEF")
}

/// A child record with a name field and no revision.
pub fn child_record(id: &str, name: &str) -> Record {
    Record::new(id).with_field("name", name)
}

/// The remote index used across download scenarios.
pub fn sample_remote_index() -> IdRevisionMap {
    [
        ("abcd1234", "1-zxy321"),
        ("abcd5678", "2-zxy765"),
        ("abcd7654", "3-zxy987"),
    ]
    .into_iter()
    .map(|(id, rev)| (id.into(), Revision::new(rev)))
    .collect()
}

/// Config pointing at the fixture server with a token.
pub fn test_config() -> SyncConfig {
    SyncConfig::new(TEST_SERVER_URL, TEST_DEVICE_ID).with_auth_token(TEST_TOKEN)
}

/// In-memory collaborators with handles kept for assertions.
pub struct SyncWorld {
    /// Local store.
    pub store: Arc<MemoryRecordStore>,
    /// Scripted remote.
    pub remote: Arc<MockRemoteClient>,
    /// Revocation service wiping `store`.
    pub revocation: Arc<MockRevocationService>,
    /// Form schema source.
    pub forms: Arc<StaticFormSource>,
    /// Event recorder.
    pub progress: Arc<RecordingProgressSink>,
    /// Config passed to orchestrators.
    pub config: SyncConfig,
}

impl SyncWorld {
    /// Creates a world whose device is not revoked.
    pub fn new() -> Self {
        Self::with_revocation(false)
    }

    /// Creates a world whose device is revoked.
    pub fn revoked() -> Self {
        Self::with_revocation(true)
    }

    fn with_revocation(revoked: bool) -> Self {
        let store = Arc::new(MemoryRecordStore::new());
        let revocation = MockRevocationService::new(revoked).wiping(store.clone());
        Self {
            store,
            remote: Arc::new(MockRemoteClient::new()),
            revocation: Arc::new(revocation),
            forms: Arc::new(StaticFormSource::new(3)),
            progress: Arc::new(RecordingProgressSink::new()),
            config: test_config(),
        }
    }

    /// Collaborators sharing this world's handles.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            remote: self.remote.clone(),
            revocation: self.revocation.clone(),
            forms: self.forms.clone(),
            progress: self.progress.clone(),
        }
    }

    /// A fresh orchestrator over this world.
    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.config.clone(), self.collaborators())
    }

    /// A fresh orchestrator observing `signal`.
    pub fn orchestrator_with(&self, signal: CancellationSignal) -> SyncOrchestrator {
        self.orchestrator().with_cancellation(signal)
    }
}

impl Default for SyncWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP adapters over a loopback [`MemoryServer`].
pub struct HttpWorld {
    /// The server.
    pub server: Arc<MemoryServer>,
    /// Local store.
    pub store: Arc<MemoryRecordStore>,
    /// Event recorder.
    pub progress: Arc<RecordingProgressSink>,
    /// Config passed to adapters and orchestrators.
    pub config: SyncConfig,
}

impl HttpWorld {
    /// Creates a world around an empty server accepting [`TEST_TOKEN`].
    pub fn new() -> Self {
        Self::with_server(MemoryServer::new().requiring_token(TEST_TOKEN))
    }

    /// Creates a world around the given server.
    pub fn with_server(server: MemoryServer) -> Self {
        Self {
            server: Arc::new(server),
            store: Arc::new(MemoryRecordStore::new()),
            progress: Arc::new(RecordingProgressSink::new()),
            config: test_config(),
        }
    }

    /// Collaborators talking to the server over loopback HTTP.
    pub fn collaborators(&self) -> Collaborators {
        let client = LoopbackClient::new(self.server.clone());
        Collaborators {
            store: self.store.clone(),
            remote: Arc::new(HttpSyncClient::new(
                &self.config,
                client.clone(),
                self.store.clone(),
            )),
            revocation: Arc::new(HttpRevocationService::new(
                &self.config,
                client.clone(),
                self.store.clone(),
            )),
            forms: Arc::new(HttpFormSource::new(&self.config, client)),
            progress: self.progress.clone(),
        }
    }

    /// A fresh orchestrator over loopback HTTP.
    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.config.clone(), self.collaborators())
    }
}

impl Default for HttpWorld {
    fn default() -> Self {
        Self::new()
    }
}
