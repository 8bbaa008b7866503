//! Parameter sanitization for audit records.
//!
//! Command parameters can carry large or sensitive payloads (page scripts,
//! typed text). Before a record is written, every string value longer than
//! [`MAX_STRING_LEN`] characters is truncated and suffixed with
//! [`TRUNCATION_MARKER`]. Objects and arrays are walked recursively;
//! non-string leaves pass through unchanged.

use serde_json::Value;

/// Longest string value stored verbatim in an audit record.
pub const MAX_STRING_LEN: usize = 200;

/// Suffix appended to truncated string values.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Return a copy of `value` with long strings truncated at every depth.
pub fn sanitize_params(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_STRING_LEN => {
            let head: String = s.chars().take(MAX_STRING_LEN).collect();
            Value::String(format!("{head}{TRUNCATION_MARKER}"))
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_params(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_params).collect()),
        other => other.clone(),
    }
}
