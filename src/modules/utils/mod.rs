// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::raise_error;

use super::error::code::ErrorCode;

#[macro_export]
macro_rules! mailbroker_version {
    () => {
        env!("CARGO_PKG_VERSION")
    };
}

#[macro_export]
macro_rules! utc_now {
    () => {{
        use chrono::Utc;
        Utc::now().timestamp_millis()
    }};
}

#[macro_export]
macro_rules! raise_error {
    ($msg:expr, $code:expr) => {
        $crate::modules::error::MailBrokerError::Generic {
            message: $msg,
            location: snafu::Location::default(),
            code: $code,
        }
    };
}

#[macro_export]
macro_rules! raise_upstream {
    ($msg:expr, $status:expr, $code:expr) => {
        $crate::modules::error::MailBrokerError::Upstream {
            message: $msg,
            status: $status,
            location: snafu::Location::default(),
            code: $code,
        }
    };
}

#[macro_export]
macro_rules! validate_identifier {
    ($input:expr, $param_name:expr) => {{
        match $crate::modules::utils::validate_id($input, $param_name) {
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        }
    }};
}

pub fn validate_id(input: &str, param_name: &str) -> crate::modules::error::MailBrokerResult<()> {
    if input.is_empty() {
        return Err(raise_error!(
            format!("'{}' cannot be empty.", param_name),
            ErrorCode::InvalidParameter
        ));
    }

    if input.len() > 64 {
        return Err(raise_error!(
            format!("'{}' cannot be longer than 64 characters.", param_name),
            ErrorCode::InvalidParameter
        ));
    }

    // Must start with a letter and can contain letters, numbers, underscores, or dashes
    let re = regex::Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap();
    if re.is_match(input) {
        Ok(())
    } else {
        Err(raise_error!(
            format!("'{}' must start with a letter and can only contain letters, numbers, underscores, or dashes.", param_name),
            ErrorCode::InvalidParameter
        ))
    }
}

#[macro_export]
macro_rules! validate_email {
    ($email:expr) => {{
        $crate::modules::utils::validate_email($email)
    }};
}

pub fn validate_email(email: &str) -> crate::modules::error::MailBrokerResult<()> {
    use std::str::FromStr;
    let email_address = email_address::EmailAddress::from_str(email).map_err(|_| {
        raise_error!(
            format!("Invalid email format : {}", email),
            ErrorCode::InvalidParameter
        )
    })?;
    if email != email_address.email() {
        return Err(raise_error!(
            format!("Invalid email format: {}", email),
            ErrorCode::InvalidParameter
        ));
    }
    Ok(())
}
