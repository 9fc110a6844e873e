// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use serde::Serialize;

use crate::mailbroker_version;
use crate::modules::account::ConnectedAccount;
use crate::modules::cache::CacheStats;
use crate::modules::context::BrokerContext;

/// Read-only snapshot served to the debugging/inspection resource:
/// aggregate cache statistics and the connected-account listing. Never a
/// mutation surface.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerStatus {
    pub version: &'static str,
    pub uptime_ms: i64,
    pub accounts: Vec<ConnectedAccount>,
    pub cache: CacheStats,
}

impl BrokerContext {
    pub async fn status(&self) -> BrokerStatus {
        BrokerStatus {
            version: mailbroker_version!(),
            uptime_ms: self.uptime_ms(),
            accounts: self.accounts.list(),
            cache: self.cache.stats().await,
        }
    }
}
