// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use http::StatusCode;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Client-side errors (10000–10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10010,
    ExceedsLimitation = 10020,

    // Authentication and authorization errors (20000–20999)
    PermissionDenied = 20000,
    AccountDisabled = 20010,
    MissingRefreshToken = 20020,
    ConsentRequired = 20030,

    // Resource errors (30000–30999)
    ResourceNotFound = 30000,
    AlreadyExists = 30010,
    TooManyRequest = 30020,

    // Network connection errors (40000–40999)
    NetworkError = 40000,
    ConnectionTimeout = 40010,
    HttpResponseError = 40020,

    // Gmail service errors (50000–50999)
    GmailApiCallFailed = 50000,
    GmailQuotaExceeded = 50010,

    // Internal system errors (70000–70999)
    InternalError = 70000,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidParameter
            | ErrorCode::MissingConfiguration
            | ErrorCode::ExceedsLimitation => StatusCode::BAD_REQUEST,
            ErrorCode::PermissionDenied | ErrorCode::ConsentRequired => StatusCode::UNAUTHORIZED,
            ErrorCode::AccountDisabled => StatusCode::FORBIDDEN,
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::TooManyRequest | ErrorCode::GmailQuotaExceeded => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ErrorCode::NetworkError
            | ErrorCode::ConnectionTimeout
            | ErrorCode::HttpResponseError
            | ErrorCode::GmailApiCallFailed
            | ErrorCode::MissingRefreshToken
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
