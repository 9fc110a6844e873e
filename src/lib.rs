// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Per-account request reliability and caching layer for brokering Gmail
//! access to AI agent clients: token-bucket throttling, retry with
//! exponential backoff, per-account cooldown tracking, and a TTL-bounded
//! LRU response cache with pattern-based invalidation.
//!
//! The crate has no wire protocol of its own; the tool host links it
//! in-process, instantiates one [`modules::context::BrokerContext`] at
//! startup, and routes every outbound Gmail call through it.

pub mod modules;
