// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use clap::Parser;
use std::{path::PathBuf, sync::LazyLock};

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "mailbroker",
    about = "A broker exposing multiple Gmail accounts to AI agent clients as callable tools,
    with per-account throttling, retry, cooldown tracking and response caching.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// mailbroker log level (default: "info")
    #[clap(
        long,
        default_value = "info",
        env,
        help = "Set the log level for mailbroker"
    )]
    pub mailbroker_log_level: String,

    /// Enable ANSI logs (default: true)
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub mailbroker_ansi_logs: bool,

    /// Enable log file output (default: false)
    /// If false, logs will be printed to stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub mailbroker_log_to_file: bool,

    /// Directory for rolling log files when file logging is enabled
    #[clap(
        long,
        default_value = "./logs",
        env,
        help = "Set the directory for rolling log files"
    )]
    pub mailbroker_log_dir: PathBuf,

    #[clap(
        long,
        default_value = "7",
        env,
        help = "Maximum number of rolled server log files to keep"
    )]
    pub mailbroker_max_server_log_files: usize,

    /// Redact email addresses and message content in diagnostic output (default: true).
    /// Credential material (bearer tokens, refresh tokens) is always redacted
    /// regardless of this flag.
    #[clap(
        long,
        default_value = "true",
        env,
        help = "Redact email addresses and message content in diagnostic output"
    )]
    pub mailbroker_redact_logs: bool,

    /// Token regeneration rate of the per-account bucket, in tokens per second
    #[clap(
        long,
        default_value = "10.0",
        env,
        help = "Set the per-account token regeneration rate (tokens per second)"
    )]
    pub mailbroker_rate_per_second: f64,

    /// Maximum burst size of the per-account bucket
    #[clap(
        long,
        default_value = "10.0",
        env,
        help = "Set the per-account burst capacity of the token bucket"
    )]
    pub mailbroker_rate_burst: f64,

    #[clap(
        long,
        default_value = "1000",
        env,
        help = "Maximum number of live entries in the response cache"
    )]
    pub mailbroker_cache_max_entries: usize,

    #[clap(
        long,
        default_value = "60",
        env,
        help = "Default time-to-live of cached responses, in seconds"
    )]
    pub mailbroker_cache_ttl_seconds: u64,

    #[clap(
        long,
        default_value = "5",
        env,
        help = "Maximum number of retries per Gmail API call"
    )]
    pub mailbroker_retry_max: u32,

    #[clap(
        long,
        default_value = "1000",
        env,
        help = "Initial retry delay in milliseconds"
    )]
    pub mailbroker_retry_initial_delay_ms: u64,

    #[clap(
        long,
        default_value = "32000",
        env,
        help = "Maximum retry delay in milliseconds"
    )]
    pub mailbroker_retry_max_delay_ms: u64,

    #[clap(
        long,
        default_value = "1000",
        env,
        help = "Initial per-account cooldown delay in milliseconds"
    )]
    pub mailbroker_backoff_initial_delay_ms: u64,

    #[clap(
        long,
        default_value = "32000",
        env,
        help = "Maximum per-account cooldown delay in milliseconds"
    )]
    pub mailbroker_backoff_max_delay_ms: u64,
}

impl Settings {
    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            mailbroker_log_level: "info".to_string(),
            mailbroker_ansi_logs: false,
            mailbroker_log_to_file: false,
            mailbroker_log_dir: "./logs".into(),
            mailbroker_max_server_log_files: 5,
            mailbroker_redact_logs: true,
            mailbroker_rate_per_second: 10.0,
            mailbroker_rate_burst: 10.0,
            mailbroker_cache_max_entries: 1000,
            mailbroker_cache_ttl_seconds: 60,
            mailbroker_retry_max: 5,
            mailbroker_retry_initial_delay_ms: 1000,
            mailbroker_retry_max_delay_ms: 32000,
            mailbroker_backoff_initial_delay_ms: 1000,
            mailbroker_backoff_max_delay_ms: 32000,
        }
    }
}
