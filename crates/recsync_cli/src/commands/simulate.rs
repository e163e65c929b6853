//! Simulate command implementation.
//!
//! A scenario file seeds the in-memory collaborators:
//!
//! ```json
//! {
//!   "user": "field-worker",
//!   "revoked": false,
//!   "download_media": true,
//!   "local": [{"_id": "x", "_rev": "1-a"}],
//!   "pending": [{"_id": "A", "name": "Amina"}],
//!   "remote": [{"_id": "x", "_rev": "2-b", "media": [{"id": "p1", "kind": "photo"}]}],
//!   "media": {"p1": [255, 216]},
//!   "failures": [{"operation": "fetch", "id": "x", "error": "transport"}]
//! }
//! ```

use super::OutputFormat;
use recsync_engine::{
    run_with_retry, CancellationSignal, Collaborators, MemoryRecordStore, MockFailure,
    MockRemoteClient, MockRevocationService, RetryConfig, StaticFormSource,
    SyncConfig, SyncError, SyncOrchestrator, SyncOutcome, TracingProgressSink,
};
use recsync_protocol::{Record, SyncUser};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors loading a scenario file.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The file could not be read.
    #[error("cannot read scenario {path}: {source}")]
    Read {
        /// Scenario path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not a valid scenario.
    #[error("invalid scenario {path}: {source}")]
    Parse {
        /// Scenario path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Remote operation a failure is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedOperation {
    /// Uploading the record `id`.
    Upload,
    /// Fetching the record `id`.
    Fetch,
    /// Listing downloadable ids; `id` is ignored.
    Listing,
}

/// Error an injected failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectedError {
    /// Session expired.
    AuthExpired,
    /// Retryable network error.
    Transport,
    /// Non-retryable rejection.
    Fatal,
    /// Record missing remotely.
    NotFound,
}

impl From<InjectedError> for MockFailure {
    fn from(error: InjectedError) -> Self {
        match error {
            InjectedError::AuthExpired => MockFailure::AuthExpired,
            InjectedError::Transport => MockFailure::Transport { retryable: true },
            InjectedError::Fatal => MockFailure::Transport { retryable: false },
            InjectedError::NotFound => MockFailure::NotFound,
        }
    }
}

/// A failure to inject into the simulated remote.
#[derive(Debug, Clone, Deserialize)]
pub struct FailureSpec {
    /// Operation that fails.
    pub operation: FailedOperation,
    /// Record the failure applies to.
    #[serde(default)]
    pub id: String,
    /// Error produced.
    pub error: InjectedError,
}

fn default_user() -> String {
    "field-worker".to_string()
}

fn default_true() -> bool {
    true
}

/// A simulation scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Signed-in user name.
    #[serde(default = "default_user")]
    pub user: String,
    /// Whether the device is revoked.
    #[serde(default)]
    pub revoked: bool,
    /// Whether attachments are downloaded.
    #[serde(default = "default_true")]
    pub download_media: bool,
    /// Records already synced to this device.
    #[serde(default)]
    pub local: Vec<Record>,
    /// Records edited locally and not yet uploaded.
    #[serde(default)]
    pub pending: Vec<Record>,
    /// Records the remote offers for download.
    #[serde(default)]
    pub remote: Vec<Record>,
    /// Attachment bytes by media id.
    #[serde(default)]
    pub media: BTreeMap<String, Vec<u8>>,
    /// Failures injected into the remote.
    #[serde(default)]
    pub failures: Vec<FailureSpec>,
}

impl Scenario {
    /// Loads a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let bytes = std::fs::read(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Counts reported for a run.
#[derive(Debug, Default, Serialize)]
pub struct SummaryReport {
    /// Form sections installed.
    pub form_sections: usize,
    /// Records uploaded.
    pub uploaded: usize,
    /// Records downloaded.
    pub downloaded: usize,
    /// Downloaded records new locally.
    pub created: usize,
    /// Downloaded records replacing a local copy.
    pub updated: usize,
    /// Listed records missing remotely.
    pub skipped: usize,
    /// Attachments stored.
    pub media_attached: usize,
    /// Run time in milliseconds.
    pub duration_ms: u128,
}

/// A record left in the local store after the run.
#[derive(Debug, Serialize)]
pub struct LocalRecordReport {
    /// Record id.
    pub id: String,
    /// Local revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Whether it still awaits upload.
    pub pending: bool,
    /// Attachments stored.
    pub media: usize,
}

/// Result of a simulation.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// `completed`, `wiped`, `wipe_deferred`, `cancelled` or `failed`.
    pub outcome: &'static str,
    /// Records pending when a wipe was deferred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<usize>,
    /// Message for a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempts made.
    pub attempts: u32,
    /// Counts for the last attempt.
    pub summary: SummaryReport,
    /// Local store after the run.
    pub local: Vec<LocalRecordReport>,
}

/// Runs a scenario and reports the result.
///
/// Failed runs are reported, not returned as `Err`.
pub fn simulate(scenario: &Scenario, cancel_before_run: bool, retries: u32) -> SimulationReport {
    let store = Arc::new(MemoryRecordStore::new());
    for record in &scenario.local {
        store.insert_synced(record.clone());
    }
    for record in &scenario.pending {
        store.save_local(record.clone());
    }

    let remote = Arc::new(MockRemoteClient::new());
    for record in &scenario.remote {
        remote.add_downloadable(record.clone());
    }
    for (id, data) in &scenario.media {
        remote.add_media(id.as_str(), data.clone());
    }
    for failure in &scenario.failures {
        let error = MockFailure::from(failure.error);
        match failure.operation {
            FailedOperation::Upload => remote.fail_upload_of(failure.id.as_str(), error),
            FailedOperation::Fetch => remote.fail_fetch_of(failure.id.as_str(), error),
            FailedOperation::Listing => remote.fail_listing(error),
        }
    }

    let collaborators = Collaborators {
        store: store.clone(),
        remote,
        revocation: Arc::new(MockRevocationService::new(scenario.revoked).wiping(store.clone())),
        forms: Arc::new(StaticFormSource::new(0)),
        progress: Arc::new(TracingProgressSink),
    };
    let retry = RetryConfig::new(retries.saturating_add(1))
        .with_initial_delay(Duration::from_millis(10))
        .without_jitter();
    let config = SyncConfig::new("memory://", "simulated-device")
        .with_media_download(scenario.download_media)
        .with_retry(retry.clone());
    let user = SyncUser::new(scenario.user.as_str());

    let cancel = CancellationSignal::new();
    if cancel_before_run {
        cancel.cancel();
    }

    let mut attempts = 0;
    let result = run_with_retry(&retry, &cancel, |_| {
        attempts += 1;
        SyncOrchestrator::new(config.clone(), collaborators.clone())
            .with_cancellation(cancel.clone())
            .run(&user)
    });

    report(result, attempts, &store)
}

fn report(
    result: Result<SyncOutcome, SyncError>,
    attempts: u32,
    store: &MemoryRecordStore,
) -> SimulationReport {
    let (outcome, pending, error, summary) = match result {
        Ok(outcome) => {
            let summary = outcome.summary();
            let summary = SummaryReport {
                form_sections: summary.form_sections,
                uploaded: summary.uploaded,
                downloaded: summary.downloaded,
                created: summary.created,
                updated: summary.updated,
                skipped: summary.skipped,
                media_attached: summary.media_attached,
                duration_ms: summary.duration.as_millis(),
            };
            match outcome {
                SyncOutcome::Completed(_) => ("completed", None, None, summary),
                SyncOutcome::Wiped(_) => ("wiped", None, None, summary),
                SyncOutcome::WipeDeferred { pending, .. } => {
                    ("wipe_deferred", Some(pending), None, summary)
                }
                SyncOutcome::Cancelled(_) => ("cancelled", None, None, summary),
            }
        }
        Err(err) => (
            "failed",
            None,
            Some(err.user_message()),
            SummaryReport::default(),
        ),
    };

    let local = store
        .records()
        .into_iter()
        .map(|record| LocalRecordReport {
            pending: store.is_pending(&record.id),
            media: store.media_for(&record.id).len(),
            revision: record.revision.map(|rev| rev.as_str().to_string()),
            id: record.id.as_str().to_string(),
        })
        .collect();

    SimulationReport {
        outcome,
        pending,
        error,
        attempts,
        summary,
        local,
    }
}

fn print_text_output(report: &SimulationReport) {
    println!("Outcome: {}", report.outcome);
    if let Some(pending) = report.pending {
        println!("  {pending} records pending, wipe deferred");
    }
    if let Some(error) = &report.error {
        println!("  {error}");
    }
    println!("Attempts: {}", report.attempts);
    println!();

    let s = &report.summary;
    println!("=== Summary ===");
    println!("Form sections:  {}", s.form_sections);
    println!("Uploaded:       {}", s.uploaded);
    println!(
        "Downloaded:     {} ({} created, {} updated)",
        s.downloaded, s.created, s.updated
    );
    println!("Skipped:        {}", s.skipped);
    println!("Media attached: {}", s.media_attached);
    println!("Duration:       {} ms", s.duration_ms);
    println!();

    println!("=== Local store ({} records) ===", report.local.len());
    for record in &report.local {
        println!(
            "  {:<16} {:<12} {}{}",
            record.id,
            record.revision.as_deref().unwrap_or("-"),
            if record.pending { "pending" } else { "synced" },
            if record.media > 0 {
                format!(", {} media", record.media)
            } else {
                String::new()
            }
        );
    }
}

/// Runs the simulate command.
pub fn run(
    path: &Path,
    cancel_before_run: bool,
    retries: u32,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(path)?;
    let report = simulate(&scenario, cancel_before_run, retries);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text_output(&report),
    }

    match report.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
