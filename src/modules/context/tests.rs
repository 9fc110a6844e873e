use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::{advance, Instant};

use super::BrokerContext;
use crate::modules::backoff::BackoffTracker;
use crate::modules::cache::ResponseCache;
use crate::modules::error::code::ErrorCode;
use crate::modules::retry::RetryOptions;
use crate::modules::throttle::AccountRateLimiter;
use crate::raise_upstream;

fn context() -> BrokerContext {
    BrokerContext::with_components(
        AccountRateLimiter::new(100.0, 100.0),
        BackoffTracker::new(Duration::from_millis(1000), Duration::from_millis(32000)),
        ResponseCache::new(64, Duration::from_secs(60)),
        RetryOptions {
            max_retries: 0,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            ..Default::default()
        },
    )
}

#[tokio::test(start_paused = true)]
async fn read_path_serves_repeats_from_cache() {
    let ctx = context();
    let calls = Arc::new(AtomicU32::new(0));
    let params = json!({"q": "from:alice", "max": 10});

    for round in 0..2 {
        let counter = calls.clone();
        let result = ctx
            .execute("work", "search", Some(&params), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"messages": ["m1", "m2"]}))
                }
            })
            .await
            .unwrap();

        assert_eq!(*result.value, json!({"messages": ["m1", "m2"]}));
        assert_eq!(result.cache_hit, round == 1);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1, "upstream called once");
}

#[tokio::test(start_paused = true)]
async fn failing_account_is_short_circuited_until_cooldown_ends() {
    let ctx = context();
    let calls = Arc::new(AtomicU32::new(0));

    let counter = calls.clone();
    let first = ctx
        .execute("work", "search", None, || {
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
    assert_eq!(first.unwrap_err().status_code(), Some(503));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Within the cooldown window the upstream is never touched and the
    // caller gets a distinguishable rate-limited failure.
    let counter = calls.clone();
    let blocked = ctx
        .execute("work", "search", None, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({}))
            }
        })
        .await;
    let error = blocked.unwrap_err();
    assert_eq!(error.code(), ErrorCode::TooManyRequest);
    assert!(error.to_string().contains("retry after"));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "call skipped during cooldown");

    // One failure puts the account on a 2s cooldown
    advance(Duration::from_millis(2100)).await;

    let counter = calls.clone();
    let recovered = ctx
        .execute("work", "search", None, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"messages": []}))
            }
        })
        .await;
    assert!(recovered.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.backoff.get("work").consecutive_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn other_accounts_keep_flowing_during_a_cooldown() {
    let ctx = context();

    let failed = ctx
        .execute("broken", "search", None, || async {
            Err(raise_upstream!(
                "oops".into(),
                500,
                ErrorCode::GmailApiCallFailed
            ))
        })
        .await;
    assert!(failed.is_err());
    assert!(ctx.backoff.is_in_backoff("broken"));

    let healthy = ctx
        .execute("healthy", "search", None, || async { Ok(json!({"ok": true})) })
        .await;
    assert!(healthy.is_ok());
}

#[tokio::test(start_paused = true)]
async fn message_mutation_forces_refetch() {
    let ctx = context();
    let calls = Arc::new(AtomicU32::new(0));
    let params = json!({"q": "is:unread"});

    for _ in 0..2 {
        let counter = calls.clone();
        ctx.execute("work", "search", Some(&params), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"messages": ["m1"]}))
            }
        })
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let removed = ctx.message_modified("work", Some("m1")).await;
    assert!(removed >= 1);

    let counter = calls.clone();
    let result = ctx
        .execute("work", "search", Some(&params), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"messages": []}))
            }
        })
        .await
        .unwrap();
    assert!(!result.cache_hit);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn uncached_path_bypasses_the_cache() {
    let ctx = context();

    let value = ctx
        .execute_uncached("work", "messages:send", None, || async {
            Ok(json!({"id": "sent-1"}))
        })
        .await
        .unwrap();

    assert_eq!(value, json!({"id": "sent-1"}));
    assert_eq!(ctx.cache.size().await, 0);
}

#[tokio::test(start_paused = true)]
async fn throttle_paces_uncached_calls() {
    let ctx = BrokerContext::with_components(
        AccountRateLimiter::new(10.0, 2.0),
        BackoffTracker::new(Duration::from_millis(1000), Duration::from_millis(32000)),
        ResponseCache::new(64, Duration::from_secs(60)),
        RetryOptions {
            max_retries: 0,
            ..Default::default()
        },
    );

    let start = Instant::now();
    for _ in 0..2 {
        ctx.execute_uncached("work", "messages:send", None, || async { Ok(json!({})) })
            .await
            .unwrap();
    }
    assert_eq!(start.elapsed(), Duration::ZERO, "burst fits the bucket");

    ctx.execute_uncached("work", "messages:send", None, || async { Ok(json!({})) })
        .await
        .unwrap();
    assert!(
        start.elapsed() >= Duration::from_millis(100),
        "third call must wait for a token"
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_tears_down_account_state() {
    let ctx = context();
    ctx.accounts
        .register("work", "work@example.com", None)
        .unwrap();

    ctx.execute("work", "labels:list", None, || async { Ok(json!(["INBOX"])) })
        .await
        .unwrap();
    assert_eq!(ctx.cache.size().await, 1);

    assert!(ctx.disconnect_account("work").await);
    assert!(!ctx.accounts.is_connected("work"));
    assert_eq!(ctx.cache.size().await, 0);
    assert!(!ctx.backoff.is_in_backoff("work"));
}

#[tokio::test(start_paused = true)]
async fn status_snapshot_reflects_accounts_and_cache() {
    let ctx = context();
    ctx.accounts
        .register("work", "work@example.com", None)
        .unwrap();
    ctx.accounts
        .register("personal", "me@example.com", None)
        .unwrap();

    ctx.execute("work", "labels:list", None, || async { Ok(json!(["INBOX"])) })
        .await
        .unwrap();
    ctx.execute("work", "labels:list", None, || async { Ok(json!(["INBOX"])) })
        .await
        .unwrap();

    let status = ctx.status().await;
    assert!(!status.version.is_empty());
    assert!(status.uptime_ms >= 0);
    assert_eq!(status.accounts.len(), 2);
    assert_eq!(status.cache.size, 1);
    assert_eq!(status.cache.hits, 1);
    assert!(status.cache.hit_rate > 0.0);
}
