// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::modules::account::AccountRegistry;
use crate::modules::backoff::BackoffTracker;
use crate::modules::cache::{key::make_key, CachedResult, ResponseCache};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBrokerResult;
use crate::modules::logger::redact;
use crate::modules::metrics::MAILBROKER_BACKOFF_TRIP_TOTAL;
use crate::modules::retry::{with_retry, RetryOptions};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::throttle::AccountRateLimiter;
use crate::{raise_error, utc_now};

pub mod status;
#[cfg(test)]
mod tests;

/// Explicit bundle of the per-account reliability components: the token
/// bucket, the cooldown tracker, the response cache and the retry policy,
/// plus the connected-account registry.
///
/// The tool host instantiates exactly one of these at startup and passes
/// it by handle to every call site. Nothing here is ambient global state,
/// so each test builds a fresh context and cannot leak into another.
pub struct BrokerContext {
    started_at: i64,
    pub accounts: AccountRegistry,
    pub throttle: AccountRateLimiter,
    pub backoff: BackoffTracker,
    pub cache: ResponseCache,
    retry: RetryOptions,
}

impl BrokerContext {
    pub fn new() -> Self {
        Self::with_components(
            AccountRateLimiter::new(
                SETTINGS.mailbroker_rate_per_second,
                SETTINGS.mailbroker_rate_burst,
            ),
            BackoffTracker::from_settings(),
            ResponseCache::from_settings(),
            RetryOptions::from_settings(),
        )
    }

    pub fn with_components(
        throttle: AccountRateLimiter,
        backoff: BackoffTracker,
        cache: ResponseCache,
        retry: RetryOptions,
    ) -> Self {
        BrokerContext {
            started_at: utc_now!(),
            accounts: AccountRegistry::new(),
            throttle,
            backoff,
            cache,
            retry,
        }
    }

    pub fn uptime_ms(&self) -> i64 {
        utc_now!() - self.started_at
    }

    /// Cached read path for one outbound Gmail call.
    ///
    /// Sequence: cooldown short-circuit, cache read (a hit consumes no
    /// token), token acquisition, retry-wrapped invocation, outcome
    /// recording, cache write.
    pub async fn execute<F, Fut>(
        &self,
        account_id: &str,
        operation: &str,
        params: Option<&Value>,
        call: F,
    ) -> MailBrokerResult<CachedResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MailBrokerResult<Value>>,
    {
        self.check_cooldown(account_id)?;

        let key = make_key(account_id, operation, params);
        if let Some((value, remaining)) = self.cache.get_with_metadata(&key).await {
            return Ok(CachedResult {
                value,
                cache_hit: true,
                ttl_remaining: Some(remaining),
            });
        }

        let value = Arc::new(self.call_upstream(account_id, operation, params, call).await?);
        self.cache.set(&key, value.clone(), None).await;
        Ok(CachedResult {
            value,
            cache_hit: false,
            ttl_remaining: None,
        })
    }

    /// Uncached path for mutations (send, modify, trash). The caller is
    /// expected to follow up with the matching invalidation helper.
    pub async fn execute_uncached<F, Fut>(
        &self,
        account_id: &str,
        operation: &str,
        params: Option<&Value>,
        call: F,
    ) -> MailBrokerResult<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MailBrokerResult<Value>>,
    {
        self.check_cooldown(account_id)?;
        self.call_upstream(account_id, operation, params, call).await
    }

    /// A modified message can change search result sets, label listings and
    /// its thread's aggregate state; drop those namespaces for the account.
    pub async fn message_modified(&self, account_id: &str, message_id: Option<&str>) -> usize {
        self.cache
            .invalidate_message_modification(account_id, message_id)
            .await
    }

    pub async fn drafts_modified(&self, account_id: &str) -> usize {
        self.cache.invalidate_drafts(account_id).await
    }

    /// Tear down everything held for one account: registry entry, cached
    /// responses, bucket state and failure streak.
    pub async fn disconnect_account(&self, account_id: &str) -> bool {
        let removed = self.accounts.remove(account_id);
        self.cache.invalidate_account(account_id).await;
        self.throttle.reset(account_id);
        self.backoff.record_success(account_id);
        removed
    }

    async fn call_upstream<F, Fut>(
        &self,
        account_id: &str,
        operation: &str,
        params: Option<&Value>,
        call: F,
    ) -> MailBrokerResult<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MailBrokerResult<Value>>,
    {
        self.throttle.wait_and_consume(account_id, 1.0).await;

        let result = with_retry(&self.retry, call).await;
        match &result {
            Ok(_) => {
                self.backoff.record_success(account_id);
                self.accounts.touch(account_id);
            }
            Err(error) => {
                let cooldown = self.backoff.record_failure(account_id);
                warn!(
                    account_id,
                    operation,
                    params = %redact::display_params(params),
                    cooldown_ms = cooldown.as_millis() as u64,
                    error = %redact::sanitize(&error.to_string()),
                    "gmail call failed"
                );
            }
        }
        result
    }

    fn check_cooldown(&self, account_id: &str) -> MailBrokerResult<()> {
        if self.backoff.is_in_backoff(account_id) {
            let remaining = self.backoff.remaining_backoff(account_id);
            MAILBROKER_BACKOFF_TRIP_TOTAL.inc();
            return Err(raise_error!(
                format!(
                    "Account '{}' is rate limited, retry after {} ms",
                    account_id,
                    remaining.as_millis()
                ),
                ErrorCode::TooManyRequest
            ));
        }
        Ok(())
    }
}

impl Default for BrokerContext {
    fn default() -> Self {
        Self::new()
    }
}
