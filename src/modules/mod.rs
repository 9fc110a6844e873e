// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod account;
pub mod backoff;
pub mod cache;
pub mod context;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod retry;
pub mod settings;
pub mod throttle;
pub mod utils;
