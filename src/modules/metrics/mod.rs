use std::sync::LazyLock;

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

pub const HIT: &str = "hit";
pub const MISS: &str = "miss";

// Metric name constants
pub const METRIC_GMAIL_RETRY_TOTAL: &str = "mailbroker_gmail_retry_total";
pub const METRIC_BACKOFF_TRIP_TOTAL: &str = "mailbroker_backoff_trip_total";
pub const METRIC_CACHE_LOOKUP_TOTAL: &str = "mailbroker_cache_lookup_total";
pub const METRIC_CACHE_EVICTION_TOTAL: &str = "mailbroker_cache_eviction_total";
pub const METRIC_THROTTLE_WAIT_SECONDS: &str = "mailbroker_throttle_wait_seconds";

pub static MAILBROKER_GMAIL_RETRY_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        METRIC_GMAIL_RETRY_TOTAL,
        "Total number of retried Gmail API calls, grouped by upstream status code",
        &["status"]
    )
    .expect("Failed to register mailbroker_gmail_retry_total")
});

pub static MAILBROKER_BACKOFF_TRIP_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        METRIC_BACKOFF_TRIP_TOTAL,
        "Total number of calls short-circuited because the account was in cooldown"
    )
    .expect("Failed to register mailbroker_backoff_trip_total")
});

pub static MAILBROKER_CACHE_LOOKUP_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        METRIC_CACHE_LOOKUP_TOTAL,
        "Total number of response cache lookups, grouped by outcome",
        &["outcome"]
    )
    .expect("Failed to register mailbroker_cache_lookup_total")
});

pub static MAILBROKER_CACHE_EVICTION_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        METRIC_CACHE_EVICTION_TOTAL,
        "Total number of response cache entries evicted by the LRU policy"
    )
    .expect("Failed to register mailbroker_cache_eviction_total")
});

pub static MAILBROKER_THROTTLE_WAIT_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        METRIC_THROTTLE_WAIT_SECONDS,
        "Distribution of time spent waiting on the per-account token bucket, in seconds"
    )
    .expect("Failed to register mailbroker_throttle_wait_seconds")
});
