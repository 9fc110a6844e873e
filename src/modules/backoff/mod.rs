// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::modules::settings::cli::SETTINGS;
use crate::utc_now;

/// Cooldown state for one account. Created lazily on first touch; state
/// for distinct accounts is fully isolated.
#[derive(Debug, Clone, Default)]
pub struct AccountBackoffState {
    /// Epoch millis of the most recent recorded failure. Diagnostic only.
    pub last_error: Option<i64>,
    pub consecutive_errors: u32,
    pub backoff_until: Option<Instant>,
}

/// Longer-horizon "is this account currently cooling down" signal, separate
/// from per-call retry. The dispatcher consults it to skip calls for an
/// account that has been failing repeatedly instead of retrying every call
/// from scratch. Purely observational: it never throws and never suppresses
/// a call by itself.
pub struct BackoffTracker {
    states: DashMap<String, AccountBackoffState>,
    initial_delay: Duration,
    max_delay: Duration,
}

impl BackoffTracker {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        BackoffTracker {
            states: DashMap::new(),
            initial_delay,
            max_delay,
        }
    }

    pub fn from_settings() -> Self {
        Self::new(
            Duration::from_millis(SETTINGS.mailbroker_backoff_initial_delay_ms),
            Duration::from_millis(SETTINGS.mailbroker_backoff_max_delay_ms),
        )
    }

    /// Record a failed call: bump the consecutive-failure counter and push
    /// the cooldown window out to `initial_delay × 2^failures`, capped at
    /// `max_delay`. Returns the applied cooldown.
    pub fn record_failure(&self, account_id: &str) -> Duration {
        let mut state = self.states.entry(account_id.to_string()).or_default();
        state.consecutive_errors += 1;
        state.last_error = Some(utc_now!());

        let exponent = 2f64.powi(state.consecutive_errors.min(32) as i32);
        let delay_ms =
            (self.initial_delay.as_millis() as f64 * exponent).min(self.max_delay.as_millis() as f64);
        let delay = Duration::from_millis(delay_ms as u64);
        state.backoff_until = Some(Instant::now() + delay);

        debug!(
            account_id,
            consecutive_errors = state.consecutive_errors,
            cooldown_ms = delay.as_millis() as u64,
            "recorded account failure"
        );
        delay
    }

    /// Record a successful call: the failure streak ends and the cooldown
    /// window is cleared.
    pub fn record_success(&self, account_id: &str) {
        let mut state = self.states.entry(account_id.to_string()).or_default();
        state.consecutive_errors = 0;
        state.backoff_until = None;
    }

    pub fn is_in_backoff(&self, account_id: &str) -> bool {
        self.states
            .get(account_id)
            .map(|state| {
                state
                    .backoff_until
                    .is_some_and(|until| until > Instant::now())
            })
            .unwrap_or(false)
    }

    /// Time left in the account's cooldown window, zero when not cooling
    /// down.
    pub fn remaining_backoff(&self, account_id: &str) -> Duration {
        self.states
            .get(account_id)
            .and_then(|state| state.backoff_until)
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Snapshot of one account's state, lazily initialized on first
    /// reference.
    pub fn get(&self, account_id: &str) -> AccountBackoffState {
        self.states
            .entry(account_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop every tracked account (process-level reset, e.g. explicit
    /// account reconnection).
    pub fn clear_all(&self) {
        self.states.clear();
    }
}
