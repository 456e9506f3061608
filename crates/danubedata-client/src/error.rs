//! Mapping of remote failures onto provider errors

use danubedata_core::{ErrorKind, ProviderError};
use serde_json::Value;

/// Classify an HTTP status returned by the DanubeData API
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        400 | 422 => ErrorKind::Validation,
        408 | 425 | 429 | 500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Permanent,
    }
}

/// Build a provider error from a non-success response
pub fn api_error(status: u16, body: &Value) -> ProviderError {
    ProviderError::Api {
        status,
        kind: classify_status(status),
        message: error_message(body).unwrap_or_else(|| default_message(status).to_string()),
    }
}

/// Map a transport-level failure
pub fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        ProviderError::Network(err.to_string())
    } else if err.is_builder() {
        ProviderError::Config(err.to_string())
    } else {
        ProviderError::Api {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            kind: ErrorKind::Permanent,
            message: err.to_string(),
        }
    }
}

/// Pull a readable message out of an API error body
///
/// Understands `{"message": ...}`, `{"error": ...}` and field error maps
/// like `{"errors": {"name": ["has already been taken"]}}`.
fn error_message(body: &Value) -> Option<String> {
    let message = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let details = body.get("errors").map(|errors| match errors {
        Value::Object(fields) => fields
            .iter()
            .map(|(field, msgs)| format!("{}: {}", field, join_messages(msgs)))
            .collect::<Vec<_>>()
            .join("; "),
        other => join_messages(other),
    });

    match (message, details.filter(|d| !d.is_empty())) {
        (Some(m), Some(d)) => Some(format!("{} ({})", m, d)),
        (Some(m), None) => Some(m),
        (None, Some(d)) => Some(d),
        (None, None) => None,
    }
}

fn join_messages(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Object(_) => item
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        401 => "unauthorized: check the API token",
        402 => "payment required: quota exceeded",
        403 => "forbidden",
        404 => "not found",
        409 => "conflict",
        429 => "rate limited",
        500..=599 => "server error",
        _ => "request failed",
    }
}
