use crate::modules::logger::file::setup_file_logger;
use crate::modules::settings::cli::SETTINGS;
use chrono::Local;
use governor::{
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::InMemoryState,
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::process;
use std::sync::{Arc, LazyLock};
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

mod file;
pub mod redact;

pub type GovRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    InMemoryState,
    QuantaClock,
    NoOpMiddleware<QuantaInstant>,
>;

pub static LOG_RATE_LIMITER: LazyLock<LogRateLimiter> = LazyLock::new(LogRateLimiter::new);

/// Budgeted gate in front of high-frequency diagnostic lines (retry and
/// cooldown warnings), so a retry storm cannot flood the log output.
pub struct LogRateLimiter {
    limiter: Arc<GovRateLimiter>,
}

impl LogRateLimiter {
    pub fn new() -> Self {
        let quota = Quota::per_second(NonZeroU32::new(10).unwrap());
        let limiter = RateLimiter::direct(quota);
        Self {
            limiter: Arc::new(limiter),
        }
    }

    pub fn should_log(&self, level: Level) -> bool {
        let cost = if level == Level::ERROR {
            NonZeroU32::new(1).unwrap()
        } else if level == Level::WARN {
            NonZeroU32::new(3).unwrap()
        } else {
            NonZeroU32::new(5).unwrap()
        };

        matches!(self.limiter.check_n(cost), Ok(Ok(())))
    }
}

impl Default for LogRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

pub fn initialize_logging() {
    if SETTINGS.mailbroker_log_to_file {
        setup_file_logger().unwrap();
    } else {
        setup_stdout_logger().unwrap();
    }
}

fn setup_stdout_logger() -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
    validate_log_level(&SETTINGS.mailbroker_log_level);
    let level = SETTINGS.mailbroker_log_level.parse::<Level>().unwrap();
    let with_ansi = SETTINGS.mailbroker_ansi_logs;

    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(true)
        .with_timer(LocalTimer);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(with_ansi)
        .with_writer(std::io::stdout)
        .event_format(format)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

fn validate_log_level(value: &String) {
    if value.parse::<Level>().is_err() {
        eprintln!(
            "Invalid log level specified. Use one of: error, warn, info, debug, trace.
        The log level you currently specified is 'mailbroker_log_level'='{}'",
            value
        );
        process::exit(1);
    }
}
