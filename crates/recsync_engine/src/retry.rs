//! Retrying whole runs on recoverable failures.

use crate::cancel::CancellationSignal;
use crate::config::RetryConfig;
use crate::error::SyncResult;
use tracing::{info, warn};

/// Runs `attempt` until it succeeds, fails non-retryably, or attempts run out.
///
/// Each call receives the 0-based attempt number and should build a fresh
/// orchestrator, since one orchestrator runs only once. Backoff between
/// attempts follows [`RetryConfig::delay_for_attempt`]. A cancellation
/// observed between attempts stops retrying and returns the last error.
///
/// The first attempt always runs, even with `max_attempts == 0`.
pub fn run_with_retry<T, F>(
    retry: &RetryConfig,
    cancel: &CancellationSignal,
    mut attempt: F,
) -> SyncResult<T>
where
    F: FnMut(u32) -> SyncResult<T>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut number = 0;

    loop {
        match attempt(number) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && number + 1 < max_attempts => {
                number += 1;
                let delay = retry.delay_for_attempt(number);
                warn!(error = %e, attempt = number, ?delay, "sync failed, retrying");
                std::thread::sleep(delay);

                if cancel.is_cancelled() {
                    info!("cancelled while waiting to retry");
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::time::Duration;

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts)
            .with_initial_delay(Duration::from_millis(1))
            .without_jitter()
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut seen = Vec::new();
        let result = run_with_retry(&quick(3), &CancellationSignal::new(), |n| {
            seen.push(n);
            if n < 2 {
                Err(SyncError::transport_retryable("503"))
            } else {
                Ok(n)
            }
        });

        assert_eq!(result.unwrap(), 2);
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: SyncResult<()> = run_with_retry(&quick(2), &CancellationSignal::new(), |_| {
            calls += 1;
            Err(SyncError::transport_retryable("timeout"))
        });

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls, 2);
    }

    #[test]
    fn session_expiry_is_not_retried() {
        let mut calls = 0;
        let result: SyncResult<()> = run_with_retry(&quick(5), &CancellationSignal::new(), |_| {
            calls += 1;
            Err(SyncError::AuthExpired("401".into()))
        });

        assert!(matches!(result, Err(SyncError::AuthExpired(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn cancellation_stops_retrying() {
        let cancel = CancellationSignal::new();
        let mut calls = 0;
        let result: SyncResult<()> = run_with_retry(&quick(5), &cancel, |_| {
            calls += 1;
            cancel.cancel();
            Err(SyncError::transport_retryable("reset"))
        });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let result = run_with_retry(&RetryConfig::new(0), &CancellationSignal::new(), |_| {
            calls += 1;
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }
}
