// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::modules::error::MailBrokerResult;
use crate::modules::metrics::{
    HIT, MAILBROKER_CACHE_EVICTION_TOTAL, MAILBROKER_CACHE_LOOKUP_TOTAL, MISS,
};
use crate::modules::settings::cli::SETTINGS;
use crate::utc_now;

pub mod key;

#[derive(Clone)]
struct CacheEntry {
    value: Arc<Value>,
    expires_at: Instant,
    /// Epoch millis at insertion. Diagnostic only.
    created_at: i64,
}

/// Result of a cached read, surfacing data freshness so tool responses can
/// report it alongside the payload.
#[derive(Debug, Clone)]
pub struct CachedResult {
    pub value: Arc<Value>,
    pub cache_hit: bool,
    pub ttl_remaining: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub hit_rate: f64,
}

/// TTL-bounded LRU cache over Gmail operation results.
///
/// Keys follow the `account:operation:params` namespace convention built by
/// [`key::make_key`], which is what makes regex-over-keys invalidation
/// sufficient: the relationship between a mutation and the reads it can
/// affect is shallow and enumerable, so clearing whole namespaces replaces
/// a dependency graph. Expiry is lazy (checked on read, no background
/// sweep); eviction is strict LRU by access recency, where a `set` of an
/// existing key counts as an access.
pub struct ResponseCache {
    store: RwLock<LruCache<String, CacheEntry>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        ResponseCache {
            store: RwLock::new(LruCache::new(
                NonZeroUsize::new(max_entries).expect("cache capacity must be non-zero"),
            )),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn from_settings() -> Self {
        Self::new(
            SETTINGS.mailbroker_cache_max_entries,
            Duration::from_secs(SETTINGS.mailbroker_cache_ttl_seconds),
        )
    }

    /// Fetch a live entry, bumping it to most-recently-used. An expired
    /// entry is removed on the spot and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.get_with_metadata(key).await.map(|(value, _)| value)
    }

    /// Same lookup as [`get`](Self::get), additionally surfacing the
    /// remaining time-to-live.
    pub async fn get_with_metadata(&self, key: &str) -> Option<(Arc<Value>, Duration)> {
        let mut store = self.store.write().await;
        let now = Instant::now();

        let found = store.get(key).map(|entry| {
            (
                now > entry.expires_at,
                entry.value.clone(),
                entry.expires_at.duration_since(now),
                entry.created_at,
            )
        });
        let Some((expired, value, remaining, created_at)) = found else {
            drop(store);
            self.record_miss();
            return None;
        };

        if expired {
            store.pop(key);
            drop(store);
            debug!(key, age_ms = utc_now!() - created_at, "cache entry expired");
            self.record_miss();
            return None;
        }

        drop(store);
        self.record_hit();
        Some((value, remaining))
    }

    /// Insert or replace an entry. Replacing re-inserts at the MRU
    /// position; inserting above capacity evicts the least-recently-used
    /// entry first.
    pub async fn set(&self, key: &str, value: Arc<Value>, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
            created_at: utc_now!(),
        };

        let mut store = self.store.write().await;
        if store.contains(key) {
            store.pop(key);
        }
        if store.push(key.to_string(), entry).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            MAILBROKER_CACHE_EVICTION_TOTAL.inc();
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.pop(key).is_some()
    }

    /// Delete every key matching `pattern`; returns the number removed.
    /// The building block for all higher-level invalidation.
    pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut store = self.store.write().await;
        let matched: Vec<String> = store
            .iter()
            .filter(|(key, _)| pattern.is_match(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matched {
            store.pop(key);
        }
        drop(store);

        if !matched.is_empty() {
            debug!(
                pattern = %pattern,
                removed = matched.len(),
                "invalidated cached responses"
            );
        }
        matched.len()
    }

    /// Drop every cached response belonging to one account.
    pub async fn invalidate_account(&self, account_id: &str) -> usize {
        let pattern = Regex::new(&format!("^{}:", regex::escape(account_id))).unwrap();
        self.invalidate_pattern(&pattern).await
    }

    /// Invalidation after a message-level mutation. A label or read-state
    /// change can alter search result sets and label listings, so those
    /// namespaces always go; when the modified message is known, keys
    /// referencing it and the account's thread views go too.
    pub async fn invalidate_message_modification(
        &self,
        account_id: &str,
        message_id: Option<&str>,
    ) -> usize {
        let account = regex::escape(account_id);
        let mut removed = self
            .invalidate_pattern(&Regex::new(&format!("^{account}:(search|labels):")).unwrap())
            .await;

        if let Some(message_id) = message_id {
            let message = regex::escape(message_id);
            removed += self
                .invalidate_pattern(&Regex::new(&format!("^{account}:.*{message}")).unwrap())
                .await;
            removed += self
                .invalidate_pattern(&Regex::new(&format!("^{account}:thread:")).unwrap())
                .await;
        }
        removed
    }

    /// Drop the account's cached draft listings and draft bodies.
    pub async fn invalidate_drafts(&self, account_id: &str) -> usize {
        let pattern = Regex::new(&format!("^{}:draft", regex::escape(account_id))).unwrap();
        self.invalidate_pattern(&pattern).await
    }

    /// Read-through convenience: return the cached value when present,
    /// otherwise run `operation`, store its result at `ttl`, and return it.
    pub async fn with_cache<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        operation: F,
    ) -> MailBrokerResult<CachedResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MailBrokerResult<Value>>,
    {
        if let Some((value, remaining)) = self.get_with_metadata(key).await {
            return Ok(CachedResult {
                value,
                cache_hit: true,
                ttl_remaining: Some(remaining),
            });
        }

        let value = Arc::new(operation().await?);
        self.set(key, value.clone(), ttl).await;
        Ok(CachedResult {
            value,
            cache_hit: false,
            ttl_remaining: None,
        })
    }

    pub async fn size(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.size().await,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        MAILBROKER_CACHE_LOOKUP_TOTAL.with_label_values(&[HIT]).inc();
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        MAILBROKER_CACHE_LOOKUP_TOTAL
            .with_label_values(&[MISS])
            .inc();
    }
}
