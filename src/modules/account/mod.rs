// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailBrokerResult;
use crate::{raise_error, utc_now, validate_email, validate_identifier};

/// One connected Google identity. The `account_id` is the partition key
/// for throttle, cooldown and cache state, and the prefix of every cache
/// key belonging to the account.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedAccount {
    pub account_id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Epoch millis when the account was registered.
    pub connected_at: i64,
    /// Epoch millis of the last successful brokered call.
    pub last_used_at: i64,
}

/// In-memory registry of connected accounts. The listing is the read-only
/// introspection surface consumed by the debugging/inspection resource;
/// token storage and OAuth flows live outside this crate.
pub struct AccountRegistry {
    accounts: DashMap<String, ConnectedAccount>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        AccountRegistry {
            accounts: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        account_id: &str,
        email: &str,
        display_name: Option<String>,
    ) -> MailBrokerResult<()> {
        validate_identifier!(account_id, "account_id")?;
        validate_email!(email)?;

        if self.accounts.contains_key(account_id) {
            return Err(raise_error!(
                format!("Account '{}' is already connected.", account_id),
                ErrorCode::AlreadyExists
            ));
        }

        let now = utc_now!();
        self.accounts.insert(
            account_id.to_string(),
            ConnectedAccount {
                account_id: account_id.to_string(),
                email: email.to_string(),
                display_name,
                connected_at: now,
                last_used_at: now,
            },
        );
        info!(account_id, "account connected");
        Ok(())
    }

    pub fn remove(&self, account_id: &str) -> bool {
        let removed = self.accounts.remove(account_id).is_some();
        if removed {
            info!(account_id, "account disconnected");
        }
        removed
    }

    /// Stamp the account as used now.
    pub fn touch(&self, account_id: &str) {
        if let Some(mut account) = self.accounts.get_mut(account_id) {
            account.last_used_at = utc_now!();
        }
    }

    pub fn get(&self, account_id: &str) -> Option<ConnectedAccount> {
        self.accounts
            .get(account_id)
            .map(|account| account.value().clone())
    }

    pub fn is_connected(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    pub fn list(&self) -> Vec<ConnectedAccount> {
        let mut accounts: Vec<ConnectedAccount> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        accounts
    }
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}
