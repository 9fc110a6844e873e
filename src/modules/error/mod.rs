// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use code::ErrorCode;
use snafu::{Location, Snafu};

pub mod code;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MailBrokerError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
    /// A failure reported by the Gmail API itself, carrying the upstream
    /// HTTP status. The retry layer classifies on this status alone.
    #[snafu(display("{message} (upstream status {status})"))]
    Upstream {
        message: String,
        status: u16,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type MailBrokerResult<T, E = MailBrokerError> = std::result::Result<T, E>;

impl MailBrokerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MailBrokerError::Generic { code, .. } => *code,
            MailBrokerError::Upstream { code, .. } => *code,
        }
    }

    /// Upstream HTTP status, when this error carries one. Errors without a
    /// status are never retried.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            MailBrokerError::Generic { .. } => None,
            MailBrokerError::Upstream { status, .. } => Some(*status),
        }
    }
}
