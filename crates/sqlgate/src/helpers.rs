//! Helper utilities for the gateway

use hdbconnect_async::HdbValue;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Convert `HdbValue` to `serde_json::Value`
pub fn hdb_value_to_json(value: &HdbValue) -> Value {
    match value {
        HdbValue::NULL => Value::Null,
        HdbValue::TINYINT(v) => serde_json::json!(v),
        HdbValue::SMALLINT(v) => serde_json::json!(v),
        HdbValue::INT(v) => serde_json::json!(v),
        HdbValue::BIGINT(v) => serde_json::json!(v),
        HdbValue::DECIMAL(v) => serde_json::json!(v.to_string()),
        HdbValue::REAL(v) => serde_json::json!(v),
        HdbValue::DOUBLE(v) => serde_json::json!(v),
        HdbValue::STRING(v) => serde_json::json!(v),
        HdbValue::BOOLEAN(v) => serde_json::json!(v),
        _ => serde_json::json!(format!("{value:?}")),
    }
}

/// Convert a JSON statement parameter to `HdbValue`.
///
/// Arrays and objects are bound as their JSON text.
pub fn json_to_hdb_value(value: &Value) -> HdbValue<'static> {
    match value {
        Value::Null => HdbValue::NULL,
        Value::Bool(b) => HdbValue::BOOLEAN(*b),
        Value::Number(n) => n.as_i64().map_or_else(
            || HdbValue::DOUBLE(n.as_f64().unwrap_or_default()),
            HdbValue::BIGINT,
        ),
        Value::String(s) => HdbValue::STRING(s.clone()),
        other => HdbValue::STRING(other.to_string()),
    }
}

/// Pretty-print JSON with a one-space indent, the console's output format
pub fn pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

/// Render a JSON value the way a log line or console would show it:
/// strings raw, everything else as compact JSON
pub fn display_json(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
