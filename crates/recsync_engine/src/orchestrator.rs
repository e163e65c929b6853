//! Two-phase sync orchestrator.
//!
//! A run uploads pending local records, applies the revocation policy, then
//! downloads and reconciles remote records. Cancellation is cooperative and
//! only observed at checkpoints:
//!
//! | Checkpoint        | When                                   |
//! |-------------------|----------------------------------------|
//! | entry             | right after the `Started` event        |
//! | before upload     | after the form schema is fetched       |
//! | before download   | after the revocation decision          |
//! | per download item | before each remote fetch               |
//!
//! Uploads are not interrupted once the upload phase has started.

use crate::cancel::CancellationSignal;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::ports::{FormMetadataSource, ProgressSink, RecordStore, RemoteSyncClient, RevocationService};
use crate::progress::{SyncEvent, SyncPhase, SyncProgress, SyncSummary};
use parking_lot::RwLock;
use recsync_protocol::{Record, SyncUser};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Lifecycle state of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, `run` not yet called.
    Idle,
    /// A run is in progress.
    Running,
    /// Cancellation was requested and will apply at the next checkpoint.
    Cancelling,
    /// The run stopped at a checkpoint.
    Cancelled,
    /// The run finished, including revocation outcomes.
    Completed,
    /// The run aborted with an error.
    Failed,
}

impl RunState {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Cancelled | RunState::Completed | RunState::Failed
        )
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Both phases ran to the end.
    Completed(SyncSummary),
    /// The device is revoked and had nothing pending; local data was wiped.
    Wiped(SyncSummary),
    /// The device is revoked but records are still pending; nothing was
    /// wiped and no download ran.
    WipeDeferred {
        /// Records still pending after the upload phase.
        pending: usize,
        /// Counts for the run.
        summary: SyncSummary,
    },
    /// The run stopped at a cancellation checkpoint.
    Cancelled(SyncSummary),
}

impl SyncOutcome {
    /// Counts for the run.
    pub fn summary(&self) -> &SyncSummary {
        match self {
            SyncOutcome::Completed(summary)
            | SyncOutcome::Wiped(summary)
            | SyncOutcome::Cancelled(summary) => summary,
            SyncOutcome::WipeDeferred { summary, .. } => summary,
        }
    }

    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncOutcome::Cancelled(_))
    }
}

/// The collaborators a run is driven through.
#[derive(Clone)]
pub struct Collaborators {
    /// Local record storage.
    pub store: Arc<dyn RecordStore>,
    /// Remote authoritative store.
    pub remote: Arc<dyn RemoteSyncClient>,
    /// Remote revocation and local wipe.
    pub revocation: Arc<dyn RevocationService>,
    /// Published form schema.
    pub forms: Arc<dyn FormMetadataSource>,
    /// Lifecycle notifications.
    pub progress: Arc<dyn ProgressSink>,
}

#[derive(Debug, Clone, Copy)]
enum Checkpoint {
    Entry,
    BeforeUpload,
    BeforeDownload,
    DownloadItem,
}

enum Termination {
    Completed,
    Wiped,
    WipeDeferred { pending: usize },
    Cancelled,
}

/// State of a single run. Dropped when the run ends.
struct SyncSession {
    id: Uuid,
    started: Instant,
    cancel: CancellationSignal,
    summary: SyncSummary,
}

impl SyncSession {
    fn new(cancel: CancellationSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
            cancel,
            summary: SyncSummary::default(),
        }
    }

    /// Returns true if the run must stop here.
    fn cancelled_at(&self, checkpoint: Checkpoint) -> bool {
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            info!(?checkpoint, "cancellation observed");
        }
        cancelled
    }

    fn complete(&mut self, phase: SyncPhase) {
        debug!(?phase, "phase complete");
        self.summary.phases.push(phase);
    }
}

/// Drives one sync run between a local store and the remote.
///
/// An orchestrator runs at most once. Build a new one for every run.
pub struct SyncOrchestrator {
    config: SyncConfig,
    store: Arc<dyn RecordStore>,
    remote: Arc<dyn RemoteSyncClient>,
    revocation: Arc<dyn RevocationService>,
    forms: Arc<dyn FormMetadataSource>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationSignal,
    state: RwLock<RunState>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with a fresh cancellation signal.
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            store: collaborators.store,
            remote: collaborators.remote,
            revocation: collaborators.revocation,
            forms: collaborators.forms,
            progress: collaborators.progress,
            cancel: CancellationSignal::new(),
            state: RwLock::new(RunState::Idle),
        }
    }

    /// Uses an externally owned cancellation signal.
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancel = signal;
        self
    }

    /// Returns a handle that cancels this run from another thread.
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    /// Requests cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Gets the current state.
    pub fn state(&self) -> RunState {
        match *self.state.read() {
            RunState::Idle | RunState::Running if self.cancel.is_cancelled() => {
                RunState::Cancelling
            }
            state => state,
        }
    }

    /// Performs the run.
    ///
    /// Cancellation and revocation outcomes are `Ok`. Any transport, auth,
    /// store or revocation failure aborts the run and is returned as `Err`;
    /// records already written locally stay written.
    pub fn run(&self, user: &SyncUser) -> SyncResult<SyncOutcome> {
        self.begin()?;

        let mut session = SyncSession::new(self.cancel.clone());
        let span = info_span!("sync_run", session = %session.id, user = %user.user_name);
        let _enter = span.enter();

        self.progress.on_event(SyncEvent::Started);

        let result = self.drive(&mut session, user);
        session.summary.duration = session.started.elapsed();

        match result {
            Ok(termination) => {
                let summary = session.summary;
                let (state, outcome) = match termination {
                    Termination::Completed => (RunState::Completed, SyncOutcome::Completed(summary)),
                    Termination::Wiped => (RunState::Completed, SyncOutcome::Wiped(summary)),
                    Termination::WipeDeferred { pending } => (
                        RunState::Completed,
                        SyncOutcome::WipeDeferred { pending, summary },
                    ),
                    Termination::Cancelled => (RunState::Cancelled, SyncOutcome::Cancelled(summary)),
                };
                self.set_state(state);

                let event = match &outcome {
                    SyncOutcome::Cancelled(summary) => SyncEvent::Cancelled(summary.clone()),
                    other => SyncEvent::Completed(other.summary().clone()),
                };
                self.progress.on_event(event);
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), "sync aborted");
                self.set_state(RunState::Failed);
                self.progress.on_event(SyncEvent::Failed {
                    kind: err.kind(),
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    fn begin(&self) -> SyncResult<()> {
        let mut state = self.state.write();
        if *state != RunState::Idle {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{:?}", *state),
                to: "Running".into(),
            });
        }
        *state = RunState::Running;
        Ok(())
    }

    fn set_state(&self, state: RunState) {
        *self.state.write() = state;
    }

    fn drive(&self, session: &mut SyncSession, user: &SyncUser) -> SyncResult<Termination> {
        if session.cancelled_at(Checkpoint::Entry) {
            return Ok(Termination::Cancelled);
        }

        self.fetch_forms(session)?;

        if session.cancelled_at(Checkpoint::BeforeUpload) {
            return Ok(Termination::Cancelled);
        }

        self.upload_pending(session, user)?;

        if let Some(termination) = self.apply_revocation_policy(session)? {
            return Ok(termination);
        }

        if session.cancelled_at(Checkpoint::BeforeDownload) {
            return Ok(Termination::Cancelled);
        }

        if !self.download_remote(session)? {
            return Ok(Termination::Cancelled);
        }

        Ok(Termination::Completed)
    }

    fn fetch_forms(&self, session: &mut SyncSession) -> SyncResult<()> {
        let sections = self.forms.fetch_published_forms()?;
        debug!(sections, "form schema refreshed");
        session.summary.form_sections = sections;
        session.complete(SyncPhase::Forms);
        Ok(())
    }

    /// Uploads every pending record. Not interruptible once started.
    fn upload_pending(&self, session: &mut SyncSession, user: &SyncUser) -> SyncResult<()> {
        let pending = self.store.pending_changes()?;
        let total = pending.len();
        info!(pending = total, "upload phase");

        for (index, record) in pending.iter().enumerate() {
            debug!(id = %record.id, "uploading record");
            self.remote.upload(record, user)?;
            session.summary.uploaded += 1;
            self.report(session, SyncPhase::Upload, index + 1, total);
        }

        session.complete(SyncPhase::Upload);
        Ok(())
    }

    /// Returns `Some` when revocation ends the run.
    ///
    /// A revoked device is wiped only when nothing is left pending, so
    /// unsynced local work is never destroyed.
    fn apply_revocation_policy(&self, session: &mut SyncSession) -> SyncResult<Option<Termination>> {
        if !self.revocation.is_revoked()? {
            session.complete(SyncPhase::Revocation);
            return Ok(None);
        }

        let pending = self.store.pending_changes()?.len();
        let termination = if pending == 0 {
            warn!("device revoked, wiping local data");
            self.revocation.wipe()?;
            Termination::Wiped
        } else {
            warn!(pending, "device revoked with pending records, wipe deferred");
            Termination::WipeDeferred { pending }
        };

        session.complete(SyncPhase::Revocation);
        Ok(Some(termination))
    }

    /// Returns `false` if cancelled before every candidate was reconciled.
    fn download_remote(&self, session: &mut SyncSession) -> SyncResult<bool> {
        let candidates = self.remote.remote_identifiers_to_download()?;
        let total = candidates.len();
        info!(candidates = total, "download phase");

        for (index, id) in candidates.iter().enumerate() {
            if session.cancelled_at(Checkpoint::DownloadItem) {
                return Ok(false);
            }

            match self.remote.fetch_record(id) {
                Ok(record) => self.reconcile(session, record)?,
                Err(err) if err.is_not_found() => {
                    warn!(%id, "listed record no longer exists remotely, skipping");
                    session.summary.skipped += 1;
                }
                Err(err) => return Err(err),
            }

            self.report(session, SyncPhase::Download, index + 1, total);
        }

        session.complete(SyncPhase::Download);
        Ok(true)
    }

    /// Writes a fetched record locally, remote copy wins.
    ///
    /// Existence is keyed by the fetched record's own id, which may differ
    /// from the id that was requested.
    fn reconcile(&self, session: &mut SyncSession, record: Record) -> SyncResult<()> {
        let id = record.id.clone();
        let media_source = self.config.download_media.then(|| record.clone());

        if self.store.exists(&id)? {
            debug!(%id, "updating local record");
            self.store.update(record)?;
            session.summary.updated += 1;
        } else {
            debug!(%id, "creating local record");
            self.store.create_or_update(record)?;
            session.summary.created += 1;
        }
        session.summary.downloaded += 1;

        if let Some(record) = media_source {
            self.attach_media(session, &record)?;
        }
        Ok(())
    }

    fn attach_media(&self, session: &mut SyncSession, record: &Record) -> SyncResult<()> {
        match self.remote.fetch_media(record) {
            Ok(media) => {
                let count = media.len();
                if count > 0 {
                    self.store.attach_media(&record.id, media)?;
                }
                session.summary.media_attached += count;
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                warn!(id = %record.id, "media missing remotely, skipping");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Progress is suppressed once cancellation has been requested.
    fn report(&self, session: &SyncSession, phase: SyncPhase, completed: usize, total: usize) {
        if session.cancel.is_cancelled() {
            return;
        }
        self.progress.on_event(SyncEvent::Progress(SyncProgress {
            phase,
            completed,
            total,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        MemoryRecordStore, MockFailure, MockRemoteClient, MockRevocationService,
        RecordingProgressSink, RemoteCall, StaticFormSource, StoreCall,
    };
    use recsync_protocol::{MediaRef, RecordId};

    struct Harness {
        store: Arc<MemoryRecordStore>,
        remote: Arc<MockRemoteClient>,
        revocation: Arc<MockRevocationService>,
        forms: Arc<StaticFormSource>,
        progress: Arc<RecordingProgressSink>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryRecordStore::new()),
                remote: Arc::new(MockRemoteClient::new()),
                revocation: Arc::new(MockRevocationService::new(false)),
                forms: Arc::new(StaticFormSource::new(3)),
                progress: Arc::new(RecordingProgressSink::new()),
            }
        }

        fn orchestrator(&self) -> SyncOrchestrator {
            self.orchestrator_with(SyncConfig::default())
        }

        fn orchestrator_with(&self, config: SyncConfig) -> SyncOrchestrator {
            SyncOrchestrator::new(
                config,
                Collaborators {
                    store: self.store.clone(),
                    remote: self.remote.clone(),
                    revocation: self.revocation.clone(),
                    forms: self.forms.clone(),
                    progress: self.progress.clone(),
                },
            )
        }
    }

    fn user() -> SyncUser {
        SyncUser::new("field-worker")
    }

    fn ids(ids: &[&str]) -> Vec<RecordId> {
        ids.iter().map(|id| RecordId::new(*id)).collect()
    }

    #[test]
    fn run_state_checks() {
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Cancelling.is_terminal());
    }

    #[test]
    fn syncs_forms_and_pending_records() {
        let h = Harness::new();
        h.store.save_local(Record::new("a"));
        h.store.save_local(Record::new("b"));

        let orchestrator = h.orchestrator();
        let outcome = orchestrator.run(&user()).unwrap();

        assert!(matches!(outcome, SyncOutcome::Completed(_)));
        assert_eq!(h.forms.fetch_count(), 1);
        assert_eq!(h.remote.uploaded_ids(), ids(&["a", "b"]));
        assert_eq!(outcome.summary().uploaded, 2);
        assert_eq!(outcome.summary().form_sections, 3);
        assert_eq!(
            outcome.summary().phases,
            vec![
                SyncPhase::Forms,
                SyncPhase::Upload,
                SyncPhase::Revocation,
                SyncPhase::Download
            ]
        );
        assert_eq!(orchestrator.state(), RunState::Completed);
    }

    #[test]
    fn cancelled_before_run_touches_only_the_progress_sink() {
        let h = Harness::new();
        h.store.save_local(Record::new("a"));
        let orchestrator = h.orchestrator();

        orchestrator.cancel();
        assert_eq!(orchestrator.state(), RunState::Cancelling);

        let outcome = orchestrator.run(&user()).unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.summary().records_synced(), 0);
        assert_eq!(h.forms.fetch_count(), 0);
        assert!(h.store.calls().is_empty());
        assert!(h.remote.calls().is_empty());
        assert_eq!(h.revocation.revoked_checks(), 0);
        assert_eq!(
            h.progress.events(),
            vec![
                SyncEvent::Started,
                SyncEvent::Cancelled(outcome.summary().clone())
            ]
        );
        assert_eq!(orchestrator.state(), RunState::Cancelled);
    }

    #[test]
    fn existing_records_are_updated_and_new_ones_created() {
        let h = Harness::new();
        h.store.insert_synced(Record::new("x").with_revision("1-old"));
        h.remote.add_downloadable(Record::new("x").with_revision("2-new"));
        h.remote.add_downloadable(Record::new("y").with_revision("1-a"));

        let outcome = h.orchestrator().run(&user()).unwrap();

        let calls = h.store.calls();
        assert!(calls.contains(&StoreCall::Update("x".into())));
        assert!(!calls.contains(&StoreCall::CreateOrUpdate("x".into())));
        assert!(calls.contains(&StoreCall::CreateOrUpdate("y".into())));
        assert!(!calls.contains(&StoreCall::Update("y".into())));
        assert_eq!(outcome.summary().updated, 1);
        assert_eq!(outcome.summary().created, 1);
        assert_eq!(
            h.store.get(&"x".into()).unwrap().revision.unwrap().as_str(),
            "2-new"
        );
    }

    #[test]
    fn existence_is_keyed_by_fetched_id() {
        let h = Harness::new();
        h.store.insert_synced(Record::new("1234"));
        h.remote.add_downloadable_as("qwerty0987", Record::new("1234"));
        h.remote.add_downloadable_as("abcd1234", Record::new("5678"));

        h.orchestrator().run(&user()).unwrap();

        let calls = h.store.calls();
        assert!(calls.contains(&StoreCall::Exists("1234".into())));
        assert!(calls.contains(&StoreCall::Update("1234".into())));
        assert!(calls.contains(&StoreCall::CreateOrUpdate("5678".into())));
        assert!(!calls.contains(&StoreCall::Exists("qwerty0987".into())));
    }

    #[test]
    fn revoked_without_pending_wipes_and_skips_download() {
        let h = Harness {
            revocation: Arc::new(MockRevocationService::new(true)),
            ..Harness::new()
        };
        h.remote.add_downloadable(Record::new("x"));

        let outcome = h.orchestrator().run(&user()).unwrap();

        assert!(matches!(outcome, SyncOutcome::Wiped(_)));
        assert_eq!(h.revocation.wipe_count(), 1);
        assert!(!h.remote.calls().contains(&RemoteCall::ListDownloadable));
    }

    #[test]
    fn revoked_with_pending_never_wipes() {
        let h = Harness {
            revocation: Arc::new(MockRevocationService::new(true)),
            ..Harness::new()
        };
        h.store.save_local(Record::new("c"));

        let outcome = h.orchestrator().run(&user()).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::WipeDeferred {
                pending: 1,
                summary: outcome.summary().clone()
            }
        );
        assert_eq!(h.remote.uploaded_ids(), ids(&["c"]));
        assert_eq!(h.revocation.wipe_count(), 0);
        assert!(!h.remote.calls().contains(&RemoteCall::ListDownloadable));
        let pending_queries = h
            .store
            .calls()
            .iter()
            .filter(|c| **c == StoreCall::PendingChanges)
            .count();
        assert_eq!(pending_queries, 2);
    }

    #[test]
    fn cancel_during_upload_still_finishes_uploads() {
        let h = Harness::new();
        h.store.save_local(Record::new("a"));
        h.store.save_local(Record::new("b"));
        h.store.save_local(Record::new("c"));
        h.remote.add_downloadable(Record::new("x"));

        let orchestrator = h.orchestrator();
        h.remote.cancel_on_upload(2, orchestrator.cancellation());

        let outcome = orchestrator.run(&user()).unwrap();

        assert!(outcome.is_cancelled());
        assert_eq!(h.remote.uploaded_ids().len(), 3);
        assert!(!h.remote.calls().contains(&RemoteCall::ListDownloadable));
        // Only the first upload reported progress.
        assert_eq!(
            h.progress
                .events()
                .iter()
                .filter(|e| matches!(e, SyncEvent::Progress(_)))
                .count(),
            1
        );
    }

    #[test]
    fn cancel_mid_download_stops_before_next_fetch() {
        let h = Harness::new();
        h.remote.add_downloadable(Record::new("x"));
        h.remote.add_downloadable(Record::new("y"));
        h.remote.add_downloadable(Record::new("z"));

        let orchestrator = h.orchestrator();
        h.remote.cancel_on_fetch(1, orchestrator.cancellation());

        let outcome = orchestrator.run(&user()).unwrap();

        assert!(outcome.is_cancelled());
        assert_eq!(h.remote.fetched_ids(), ids(&["x"]));
        assert_eq!(outcome.summary().downloaded, 1);
        assert_eq!(h.store.len(), 1);
        let cancelled_events = h
            .progress
            .events()
            .iter()
            .filter(|e| matches!(e, SyncEvent::Cancelled(_)))
            .count();
        assert_eq!(cancelled_events, 1);
    }

    #[test]
    fn missing_remote_record_is_skipped() {
        let h = Harness::new();
        h.remote.set_downloadable(vec!["gone".into()]);
        h.remote.add_downloadable(Record::new("y"));

        let outcome = h.orchestrator().run(&user()).unwrap();

        assert_eq!(outcome.summary().skipped, 1);
        assert_eq!(outcome.summary().created, 1);
        assert!(matches!(outcome, SyncOutcome::Completed(_)));
    }

    #[test]
    fn auth_expiry_aborts_with_distinct_failure() {
        let h = Harness::new();
        h.store.save_local(Record::new("a"));
        h.store.save_local(Record::new("b"));
        h.remote.fail_upload_of("a", MockFailure::AuthExpired);

        let orchestrator = h.orchestrator();
        let err = orchestrator.run(&user()).unwrap_err();

        assert!(matches!(err, SyncError::AuthExpired(_)));
        assert_eq!(orchestrator.state(), RunState::Failed);
        assert!(h.remote.uploaded_ids().is_empty());
        assert_eq!(h.revocation.revoked_checks(), 0);
        assert!(h.progress.events().contains(&SyncEvent::Failed {
            kind: crate::FailureKind::SessionExpired,
            message: "Your session is timed out".into(),
        }));
    }

    #[test]
    fn transport_failure_mid_download_keeps_committed_records() {
        let h = Harness::new();
        h.remote.add_downloadable(Record::new("x"));
        h.remote.add_downloadable(Record::new("y"));
        h.remote
            .fail_fetch_of("y", MockFailure::Transport { retryable: true });

        let err = h.orchestrator().run(&user()).unwrap_err();

        assert!(err.is_retryable());
        assert!(h.store.get(&"x".into()).is_some());
        assert!(h.store.get(&"y".into()).is_none());
    }

    #[test]
    fn media_is_fetched_and_attached() {
        let h = Harness::new();
        h.remote
            .add_downloadable(Record::new("x").with_media(MediaRef::photo("p1")));
        h.remote.add_media("p1", vec![1, 2, 3]);

        let outcome = h.orchestrator().run(&user()).unwrap();

        assert_eq!(outcome.summary().media_attached, 1);
        assert_eq!(h.store.media_for(&"x".into()).len(), 1);
    }

    #[test]
    fn media_is_requested_for_records_without_references() {
        let h = Harness::new();
        h.remote.add_downloadable(Record::new("x"));

        let outcome = h.orchestrator().run(&user()).unwrap();

        let media_calls: Vec<_> = h
            .remote
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RemoteCall::FetchMedia(_)))
            .collect();
        assert_eq!(media_calls, vec![RemoteCall::FetchMedia("x".into())]);
        assert!(!h
            .store
            .calls()
            .iter()
            .any(|c| matches!(c, StoreCall::AttachMedia(..))));
        assert_eq!(outcome.summary().media_attached, 0);
    }

    #[test]
    fn media_download_can_be_disabled() {
        let h = Harness::new();
        h.remote
            .add_downloadable(Record::new("x").with_media(MediaRef::photo("p1")));
        h.remote.add_media("p1", vec![1]);

        let config = SyncConfig::default().with_media_download(false);
        h.orchestrator_with(config).run(&user()).unwrap();

        assert!(!h
            .remote
            .calls()
            .iter()
            .any(|c| matches!(c, RemoteCall::FetchMedia(_))));
    }

    #[test]
    fn second_run_is_rejected() {
        let h = Harness::new();
        let orchestrator = h.orchestrator();
        orchestrator.run(&user()).unwrap();

        let err = orchestrator.run(&user()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
        assert_eq!(orchestrator.state(), RunState::Completed);
    }
}
