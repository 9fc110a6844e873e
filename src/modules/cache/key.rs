// Copyright © 2025 mailbroker.com
// Licensed under MailBroker License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use serde_json::Value;

/// Build the composite cache key `account:operation[:params]`.
///
/// Parameter objects are rendered with keys sorted lexicographically at
/// every nesting level, so semantically identical calls collide to the same
/// key no matter the order the agent supplied parameters in.
pub fn make_key(account_id: &str, operation: &str, params: Option<&Value>) -> String {
    match params {
        None => format!("{}:{}", account_id, operation),
        Some(params) => {
            let mut rendered = String::new();
            write_canonical(params, &mut rendered);
            format!("{}:{}:{}", account_id, operation, rendered)
        }
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
