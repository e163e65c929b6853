//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server URL, e.g. `https://records.example.org`.
    pub server_url: String,
    /// Device id reported to the revocation endpoint.
    pub device_id: String,
    /// Session token sent with every request, if signed in.
    pub auth_token: Option<String>,
    /// Whether media attachments are fetched during download.
    pub download_media: bool,
    /// Request timeout handed to HTTP client implementations.
    pub timeout: Duration,
    /// Caller-level retry configuration.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(server_url: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            device_id: device_id.into(),
            auth_token: None,
            download_media: true,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::no_retry(),
        }
    }

    /// Sets the session token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Enables or disables media download.
    pub fn with_media_download(mut self, enabled: bool) -> Self {
        self.download_media = enabled;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Share of the computed delay that jitter may add on top.
const JITTER_FRACTION: f64 = 0.25;

/// Policy for re-running a failed sync.
///
/// A retry is a fresh run from the forms phase onwards, never a resumed one.
/// Only failures for which [`SyncError::is_retryable`](crate::SyncError::is_retryable)
/// holds are retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Sync runs allowed in total, the first one included.
    pub max_attempts: u32,
    /// Wait before the second run.
    pub initial_delay: Duration,
    /// Ceiling on the wait between runs.
    pub max_delay: Duration,
    /// Growth factor applied to the wait after each failed run.
    pub backoff_multiplier: f64,
    /// Spreads out devices that regain connectivity at the same moment.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Allows `max_attempts` runs, starting at half a second apart and
    /// doubling up to a minute.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A single run; the first failure is returned to the caller.
    ///
    /// This is what [`SyncConfig::new`] uses.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the wait before the second run.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Caps the wait between runs.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets how fast the wait grows.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Makes waits deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Wait before re-running after `attempt` failed runs.
    ///
    /// Zero for the first run. After that the wait starts at `initial_delay`
    /// and grows by `backoff_multiplier` per failure, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let failures_before = attempt.saturating_sub(1) as i32;
        let grown = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(failures_before);
        let capped = grown.min(self.max_delay.as_secs_f64());

        let jitter = if self.add_jitter {
            capped * JITTER_FRACTION * clock_jitter()
        } else {
            0.0
        };
        Duration::from_secs_f64(capped + jitter)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Pseudo-random value in `[0, 1)` taken from the clock's sub-second nanos.
fn clock_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://records.example.org", "device-7")
            .with_auth_token("tok")
            .with_media_download(false)
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.server_url, "https://records.example.org");
        assert_eq!(config.device_id, "device-7");
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
        assert!(!config.download_media);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn defaults_download_media() {
        assert!(SyncConfig::default().download_media);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
    }

    #[test]
    fn waits_double_between_runs_without_jitter() {
        let config = RetryConfig::new(4)
            .with_initial_delay(Duration::from_secs(1))
            .without_jitter();

        let waits: Vec<_> = (0..4).map(|n| config.delay_for_attempt(n)).collect();
        assert_eq!(
            waits,
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .without_jitter();

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }
}
