//! Pure classifiers for handshake responses.
//!
//! Every branching decision in the login and registration flows is taken
//! here, on plain JSON values, so the protocol rules stay testable without
//! any transport. One rule governs all of them: a malformed response is
//! never classified as success.

use serde_json::Value;

/// What the nonce endpoint said.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum NonceOutcome {
    /// Status was `ok` and a usable nonce string was present.
    Accepted { nonce: String },
    /// The server declined: status absent, non-string, or not `ok`.
    Rejected,
    /// Status was `ok` but no usable nonce could be extracted.
    Malformed,
}

/// What the cookie endpoint said.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CookieOutcome {
    Accepted,
    Rejected { code: Option<i64> },
}

/// Classifies a nonce response. Success requires the status field to hold
/// exactly the string `ok`; anything else, including a missing or
/// non-string status, is a rejection.
pub(crate) fn classify_nonce(body: &Value) -> NonceOutcome {
    if !status_is_ok(body) {
        return NonceOutcome::Rejected;
    }
    match body.get("nonce").and_then(Value::as_str) {
        Some(nonce) if !nonce.is_empty() => NonceOutcome::Accepted {
            nonce: nonce.to_string(),
        },
        _ => NonceOutcome::Malformed,
    }
}

/// Classifies a cookie response. On rejection the failure code is read
/// from the `code` field when one is present and numeric.
pub(crate) fn classify_cookie(body: &Value) -> CookieOutcome {
    if status_is_ok(body) {
        CookieOutcome::Accepted
    } else {
        CookieOutcome::Rejected {
            code: integer_field(body, "code"),
        }
    }
}

/// Numeric registration result; `-1` when the field is absent or unusable.
pub(crate) fn registration_code(body: &Value) -> i64 {
    integer_field(body, "code").unwrap_or(-1)
}

fn status_is_ok(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("ok")
}

/// Reads an integer that servers send either as a number or as a numeric
/// string.
fn integer_field(body: &Value, field: &str) -> Option<i64> {
    match body.get(field)? {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}
