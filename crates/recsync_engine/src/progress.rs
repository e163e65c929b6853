//! Lifecycle events and run summaries reported to a `ProgressSink`.

use crate::error::FailureKind;
use crate::ports::ProgressSink;
use std::time::Duration;

/// A phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Fetching the published form schema.
    Forms,
    /// Uploading pending local records.
    Upload,
    /// Checking revocation and possibly wiping.
    Revocation,
    /// Downloading and reconciling remote records.
    Download,
}

/// Progress within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    /// Current phase.
    pub phase: SyncPhase,
    /// Items finished so far in this phase.
    pub completed: usize,
    /// Items in this phase.
    pub total: usize,
}

/// Counts accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Form sections installed.
    pub form_sections: usize,
    /// Records uploaded.
    pub uploaded: usize,
    /// Records fetched and written locally.
    pub downloaded: usize,
    /// Downloaded records that were new locally.
    pub created: usize,
    /// Downloaded records that replaced a local copy.
    pub updated: usize,
    /// Listed records that had vanished remotely.
    pub skipped: usize,
    /// Attachments stored locally.
    pub media_attached: usize,
    /// Phases finished, in order.
    pub phases: Vec<SyncPhase>,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncSummary {
    /// Total records moved in either direction.
    pub fn records_synced(&self) -> usize {
        self.uploaded + self.downloaded
    }
}

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The run is about to start.
    Started,
    /// An item of a phase finished.
    Progress(SyncProgress),
    /// The run stopped at a cancellation checkpoint.
    Cancelled(SyncSummary),
    /// The run finished without error.
    Completed(SyncSummary),
    /// The run aborted.
    Failed {
        /// Classification of the failure.
        kind: FailureKind,
        /// Message suitable for the user.
        message: String,
    },
}

/// A sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_event(&self, _event: SyncEvent) {}
}

/// A sink that reports events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::Started => tracing::info!("sync started"),
            SyncEvent::Progress(p) => {
                tracing::debug!(phase = ?p.phase, completed = p.completed, total = p.total, "sync progress")
            }
            SyncEvent::Cancelled(summary) => {
                tracing::info!(synced = summary.records_synced(), "sync cancelled")
            }
            SyncEvent::Completed(summary) => tracing::info!(
                uploaded = summary.uploaded,
                downloaded = summary.downloaded,
                skipped = summary.skipped,
                "sync completed"
            ),
            SyncEvent::Failed { kind, message } => {
                tracing::error!(?kind, %message, "sync failed")
            }
        }
    }
}
