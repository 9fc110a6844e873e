// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{future::Future, sync::Arc, time::Duration};

use rand::Rng;
use tokio::time::sleep;
use tracing::{warn, Level};

use crate::modules::{
    error::{MailBrokerError, MailBrokerResult},
    logger::{redact, LOG_RATE_LIMITER},
    metrics::MAILBROKER_GMAIL_RETRY_TOTAL,
    settings::cli::SETTINGS,
};

pub type RetryObserver = Arc<dyn Fn(&MailBrokerError, u32, Duration) + Send + Sync>;

/// Retry policy for a single Gmail API call. Every field can be overridden
/// per call site; the defaults match the per-account cooldown constants so
/// the two layers degrade in step.
#[derive(Clone)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Upstream statuses treated as transient. Everything else, including
    /// errors with no status at all, fails immediately.
    pub retryable_status_codes: Vec<u16>,
    /// Invoked before each sleep with the failure, the 1-based number of
    /// the upcoming retry, and the jittered delay.
    pub on_retry: Option<RetryObserver>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptions {
            max_retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(32000),
            backoff_multiplier: 2.0,
            retryable_status_codes: vec![429, 500, 502, 503, 504],
            on_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<observer>"))
            .finish()
    }
}

impl RetryOptions {
    pub fn from_settings() -> Self {
        RetryOptions {
            max_retries: SETTINGS.mailbroker_retry_max,
            initial_delay: Duration::from_millis(SETTINGS.mailbroker_retry_initial_delay_ms),
            max_delay: Duration::from_millis(SETTINGS.mailbroker_retry_max_delay_ms),
            ..Default::default()
        }
    }

    fn is_retryable(&self, error: &MailBrokerError) -> bool {
        error
            .status_code()
            .is_some_and(|status| self.retryable_status_codes.contains(&status))
    }

    /// Exponential delay for a zero-based attempt index, capped at
    /// `max_delay`, with symmetric ±25% jitter so simultaneous failers do
    /// not retry in lockstep.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(63) as i32))
        .min(self.max_delay.as_millis() as f64);
        let jitter: f64 = rand::rng().random_range(-1.0..=1.0);
        Duration::from_millis((base * (1.0 + 0.25 * jitter)).round().max(0.0) as u64)
    }
}

/// Run `operation`, retrying transient upstream failures with exponential
/// backoff until success, exhaustion, or a non-retryable failure.
///
/// The last error is propagated verbatim; this layer never wraps or
/// reclassifies, so callers can still inspect the original failure.
pub async fn with_retry<T, F, Fut>(options: &RetryOptions, mut operation: F) -> MailBrokerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MailBrokerResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= options.max_retries || !options.is_retryable(&error) {
                    return Err(error);
                }

                let delay = options.delay_for(attempt);
                let status = error.status_code().unwrap_or_default();
                MAILBROKER_GMAIL_RETRY_TOTAL
                    .with_label_values(&[status.to_string().as_str()])
                    .inc();
                if let Some(observer) = &options.on_retry {
                    observer(&error, attempt + 1, delay);
                }
                if LOG_RATE_LIMITER.should_log(Level::WARN) {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = options.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        status,
                        error = %redact::sanitize(&error.to_string()),
                        "transient gmail api failure, retrying"
                    );
                }
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::modules::error::code::ErrorCode;
    use crate::{raise_error, raise_upstream};

    fn quick_options(max_retries: u32) -> RetryOptions {
        RetryOptions {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_invokes_initial_plus_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: MailBrokerResult<()> = with_retry(&quick_options(3), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(raise_upstream!(
                    "service unavailable".into(),
                    503,
                    ErrorCode::GmailApiCallFailed
                ))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4, "1 initial + 3 retries");
        let error = result.unwrap_err();
        assert_eq!(error.status_code(), Some(503));
        assert_eq!(error.to_string(), "service unavailable (upstream status 503)");
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_fails_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: MailBrokerResult<()> = with_retry(&quick_options(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(raise_upstream!(
                    "bad request".into(),
                    400,
                    ErrorCode::InvalidParameter
                ))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().status_code(), Some(400));
    }

    #[tokio::test(start_paused = true)]
    async fn statusless_error_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: MailBrokerResult<()> = with_retry(&quick_options(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(raise_error!("no shape".into(), ErrorCode::InternalError))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&quick_options(5), || {
            let counter = counter.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(raise_upstream!(
                        "quota".into(),
                        429,
                        ErrorCode::GmailQuotaExceeded
                    ))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_each_retry() {
        let seen: Arc<Mutex<Vec<(u32, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut options = quick_options(2);
        options.on_retry = Some(Arc::new(move |_error, attempt, delay| {
            sink.lock().unwrap().push((attempt, delay));
        }));

        let _: MailBrokerResult<()> = with_retry(&options, || async {
            Err(raise_upstream!(
                "flaky".into(),
                500,
                ErrorCode::GmailApiCallFailed
            ))
        })
        .await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[1].0, 2);
    }

    #[test]
    fn delay_grows_exponentially_within_jitter_envelope() {
        let options = RetryOptions::default();

        for (attempt, expected_ms) in [(0u32, 1000.0f64), (1, 2000.0), (2, 4000.0)] {
            for _ in 0..50 {
                let delay = options.delay_for(attempt).as_millis() as f64;
                assert!(
                    delay >= expected_ms * 0.75 - 1.0 && delay <= expected_ms * 1.25 + 1.0,
                    "attempt {} delay {}ms outside ±25% of {}ms",
                    attempt,
                    delay,
                    expected_ms
                );
            }
        }

        // Far past the cap the envelope is anchored on max_delay
        for _ in 0..50 {
            let delay = options.delay_for(30).as_millis() as f64;
            assert!((24000.0..=40000.0).contains(&delay));
        }
    }

    #[test]
    fn default_retryable_set_matches_transient_statuses() {
        let options = RetryOptions::default();
        for status in [429u16, 500, 502, 503, 504] {
            assert!(options.retryable_status_codes.contains(&status));
        }
        assert!(!options.retryable_status_codes.contains(&404));
    }
}
