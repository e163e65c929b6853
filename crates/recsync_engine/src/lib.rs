//! # Recsync Engine
//!
//! Two-phase record synchronization between a device and a central server.
//!
//! This crate provides:
//! - The sync orchestrator (upload → revocation policy → download)
//! - Cooperative cancellation through a shared signal
//! - Error taxonomy mapped to session-expiry, recoverable and fatal failures
//! - Retry with exponential backoff for whole runs
//! - HTTP adapters over an abstract client
//! - In-memory collaborators for tests and simulation
//!
//! ## Architecture
//!
//! A run is **upload-then-download**:
//! 1. Fetch the published form schema
//! 2. Upload every locally pending record
//! 3. Ask the server whether this device is revoked; wipe only once nothing
//!    is left pending
//! 4. Download and reconcile every id the remote lists
//!
//! Collaborators are traits such as [`RecordStore`] injected through
//! [`Collaborators`], never looked up globally.
//!
//! ## Key Invariants
//!
//! - Uploads happen before downloads
//! - Local data is never wiped while changes are pending
//! - Download reconciles on the fetched record's own identifier
//! - Records committed before a cancellation or failure stay committed
//! - Cancellation is an outcome, not an error

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod error;
mod http;
mod memory;
mod orchestrator;
mod ports;
mod progress;
mod retry;

pub use cancel::CancellationSignal;
pub use config::{RetryConfig, SyncConfig};
pub use error::{FailureKind, SyncError, SyncResult, SESSION_TIMEOUT_MESSAGE};
pub use http::{
    HttpClient, HttpFormSource, HttpMethod, HttpRequest, HttpResponse, HttpRevocationService,
    HttpSyncClient, LoopbackClient, LoopbackServer, USER_HEADER,
};
pub use memory::{
    MemoryRecordStore, MockFailure, MockRemoteClient, MockRevocationService,
    RecordingProgressSink, RemoteCall, StaticFormSource, StoreCall,
};
pub use orchestrator::{Collaborators, RunState, SyncOrchestrator, SyncOutcome};
pub use ports::{
    FormMetadataSource, LocalWipe, ProgressSink, RecordStore, RemoteSyncClient, RevocationService,
};
pub use progress::{
    NoopProgressSink, SyncEvent, SyncPhase, SyncProgress, SyncSummary, TracingProgressSink,
};
pub use retry::run_with_retry;
