//! Classification of the counterparty's synchronous acknowledgement.
//!
//! A healthy counterparty replies with `{"message":{"ack":{"status":"ACK"}}}` (or `"NACK"`), but
//! under load and implementation drift the reply degrades to a JSON-encoded string or a mangled
//! string fragment. The classifier prefers the structured reading; the string scan is a
//! narrowly-scoped fallback that must not leak into the primary path.

use log::trace;
use regex::Regex;
use serde_json::Value;

/// The counterparty's synchronous verdict on a dispatched action. `Unknown` must be treated as a
/// rejection by callers — silence is not permission to keep a caller waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckStatus {
    Accepted,
    Rejected,
    Unknown,
}

/// Classifies a synchronous reply of any shape.
pub fn classify_ack(reply: &Value) -> AckStatus {
    match reply {
        Value::Object(_) => classify_object(reply),
        Value::String(s) => classify_string(s),
        _ => AckStatus::Unknown,
    }
}

fn classify_object(reply: &Value) -> AckStatus {
    match reply.pointer("/message/ack/status").and_then(Value::as_str) {
        Some("ACK") => AckStatus::Accepted,
        Some("NACK") => AckStatus::Rejected,
        _ => AckStatus::Unknown,
    }
}

fn classify_string(reply: &str) -> AckStatus {
    if let Ok(parsed) = serde_json::from_str::<Value>(reply) {
        return classify_object(&parsed);
    }
    trace!("🔍️ Synchronous reply is not valid JSON. Falling back to a marker scan.");
    // Optional whitespace after the colon is the only tolerance the scan allows. NACK wins over
    // ACK when both markers appear: a mangled reply fails closed.
    let nack = Regex::new(r#""status"\s*:\s*"NACK""#).unwrap();
    let ack = Regex::new(r#""status"\s*:\s*"ACK""#).unwrap();
    if nack.is_match(reply) {
        AckStatus::Rejected
    } else if ack.is_match(reply) {
        AckStatus::Accepted
    } else {
        AckStatus::Unknown
    }
}
