//! Request body and header validation

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::constants::MAX_CONNECTION_LIMIT;
use crate::downstream::TargetParams;

/// Malformed input detected before any downstream call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing query in the body")]
    MissingOperation,

    #[error("timeout must be a non-negative number")]
    InvalidTimeout,

    #[error("missing required fields in the body")]
    MissingFields,

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error("missing '{0}' header")]
    MissingHeader(&'static str),
}

impl ValidationError {
    pub(crate) fn body(&self) -> String {
        match self {
            Self::MissingOperation => "[INVALID BODY]\nMissing query in the body!".to_string(),
            Self::InvalidTimeout => {
                "[INVALID BODY]\nSpecified timeout must be a non-negative number!".to_string()
            }
            Self::MissingFields => {
                "[INVALID BODY]\nMissing required fields in the body!".to_string()
            }
            Self::MalformedBody(msg) => format!("[INVALID BODY]\n{msg}"),
            Self::MissingHeader(name) => format!("[INVALID HEADERS]\nMissing '{name}' header!"),
        }
    }
}

/// Parse a JSON request body. An empty body is treated as `{}`.
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::MalformedBody(
            "Body must be a JSON object!".into(),
        )),
        Err(e) => Err(ValidationError::MalformedBody(format!(
            "Body is not valid JSON: {e}"
        ))),
    }
}

/// Extract the operation text. Must be a non-empty string.
pub fn validate_operation(body: &Map<String, Value>) -> Result<String, ValidationError> {
    match body.get("sql") {
        Some(Value::String(sql)) if !sql.trim().is_empty() => Ok(sql.clone()),
        _ => Err(ValidationError::MissingOperation),
    }
}

/// Extract positional parameters. A lone scalar is treated as a single parameter.
pub fn validate_values(body: &Map<String, Value>) -> Vec<Value> {
    match body.get("values") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// Resolve the request deadline in milliseconds.
///
/// Absent means `default`; `0` disables the deadline (`None`).
pub fn validate_timeout(
    body: &Map<String, Value>,
    default: Duration,
) -> Result<Option<Duration>, ValidationError> {
    let millis = match body.get("timeout") {
        None => return Ok(non_zero(default)),
        Some(Value::Number(n)) => n.as_f64().ok_or(ValidationError::InvalidTimeout)?,
        Some(_) => return Err(ValidationError::InvalidTimeout),
    };

    if !millis.is_finite() || millis < 0.0 {
        return Err(ValidationError::InvalidTimeout);
    }

    let duration =
        Duration::try_from_secs_f64(millis / 1000.0).map_err(|_| ValidationError::InvalidTimeout)?;
    Ok(non_zero(duration))
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

/// Validate a sql-plane connect body into target parameters
pub fn validate_connect_body(body: &Map<String, Value>) -> Result<TargetParams, ValidationError> {
    let required = |key: &str| -> Result<String, ValidationError> {
        match body.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(ValidationError::MissingFields),
        }
    };

    let user = required("user")?;
    let password = required("password")?;
    let host = required("host")?;

    let port = match body.get("port") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(
            n.as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| ValidationError::MalformedBody("Invalid port!".into()))?,
        ),
        Some(Value::String(s)) => Some(
            s.parse::<u16>()
                .map_err(|_| ValidationError::MalformedBody("Invalid port!".into()))?,
        ),
        Some(_) => return Err(ValidationError::MalformedBody("Invalid port!".into())),
    };

    let database = body
        .get("database")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let connection_limit = match body.get("connectionLimit") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| (1..=MAX_CONNECTION_LIMIT).contains(n))
                .ok_or_else(|| {
                    ValidationError::MalformedBody(format!(
                        "connectionLimit must be an integer between 1 and {MAX_CONNECTION_LIMIT}!"
                    ))
                })?,
        ),
    };

    Ok(TargetParams {
        user,
        password,
        host,
        port,
        database,
        connection_limit,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parse_empty_body_is_empty_object() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_body(b"{not json").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedBody(_)));
        assert!(err.body().starts_with("[INVALID BODY]"));
    }

    #[test]
    fn test_parse_non_object_body() {
        let err = parse_body(b"[1,2]").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedBody(_)));
    }

    #[test]
    fn test_operation_required() {
        assert_eq!(
            validate_operation(&object(json!({}))),
            Err(ValidationError::MissingOperation)
        );
        assert_eq!(
            validate_operation(&object(json!({"sql": ""}))),
            Err(ValidationError::MissingOperation)
        );
        assert_eq!(
            validate_operation(&object(json!({"sql": 42}))),
            Err(ValidationError::MissingOperation)
        );
        assert_eq!(
            validate_operation(&object(json!({"sql": "SELECT 1"}))).unwrap(),
            "SELECT 1"
        );
    }

    #[test]
    fn test_values_normalization() {
        assert!(validate_values(&object(json!({}))).is_empty());
        assert_eq!(
            validate_values(&object(json!({"values": [1, "a"]}))),
            vec![json!(1), json!("a")]
        );
        assert_eq!(
            validate_values(&object(json!({"values": "solo"}))),
            vec![json!("solo")]
        );
    }

    #[test]
    fn test_timeout_default_applies() {
        let timeout = validate_timeout(&object(json!({})), Duration::from_secs(12)).unwrap();
        assert_eq!(timeout, Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_timeout_zero_disables_deadline() {
        let timeout =
            validate_timeout(&object(json!({"timeout": 0})), Duration::from_secs(12)).unwrap();
        assert_eq!(timeout, None);
    }

    #[test]
    fn test_timeout_millis() {
        let timeout =
            validate_timeout(&object(json!({"timeout": 250})), Duration::from_secs(12)).unwrap();
        assert_eq!(timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_timeout_negative_rejected() {
        assert_eq!(
            validate_timeout(&object(json!({"timeout": -1})), Duration::from_secs(12)),
            Err(ValidationError::InvalidTimeout)
        );
    }

    #[test]
    fn test_timeout_beyond_duration_range_rejected() {
        assert_eq!(
            validate_timeout(&object(json!({"timeout": 1e300})), Duration::from_secs(12)),
            Err(ValidationError::InvalidTimeout)
        );
    }

    #[test]
    fn test_timeout_non_number_rejected() {
        assert_eq!(
            validate_timeout(&object(json!({"timeout": "100"})), Duration::from_secs(12)),
            Err(ValidationError::InvalidTimeout)
        );
        assert_eq!(
            validate_timeout(&object(json!({"timeout": null})), Duration::from_secs(12)),
            Err(ValidationError::InvalidTimeout)
        );
    }

    #[test]
    fn test_connect_body_requires_user_password_host() {
        let err = validate_connect_body(&object(json!({"user": "u", "host": "h"}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingFields);

        let err = validate_connect_body(&object(json!({"user": "u", "password": "", "host": "h"})))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingFields);
    }

    #[test]
    fn test_connect_body_full() {
        let target = validate_connect_body(&object(json!({
            "user": "app",
            "password": "secret",
            "host": "db.internal",
            "port": 30041,
            "database": "TENANT1",
            "connectionLimit": 3
        })))
        .unwrap();

        assert_eq!(target.user, "app");
        assert_eq!(target.host, "db.internal");
        assert_eq!(target.port, Some(30041));
        assert_eq!(target.database.as_deref(), Some("TENANT1"));
        assert_eq!(target.connection_limit, Some(3));
    }

    #[test]
    fn test_connect_body_port_as_string() {
        let target = validate_connect_body(&object(json!({
            "user": "app", "password": "pw", "host": "h", "port": "30015"
        })))
        .unwrap();
        assert_eq!(target.port, Some(30015));
    }

    #[test]
    fn test_connect_body_bad_limit() {
        let err = validate_connect_body(&object(json!({
            "user": "app", "password": "pw", "host": "h", "connectionLimit": 0
        })))
        .unwrap_err();
        assert!(matches!(err, ValidationError::MalformedBody(_)));
    }

    #[test]
    fn test_connect_body_limit_upper_bound() {
        let body = |limit: Value| {
            object(json!({
                "user": "app", "password": "pw", "host": "h", "connectionLimit": limit
            }))
        };

        let target = validate_connect_body(&body(json!(MAX_CONNECTION_LIMIT))).unwrap();
        assert_eq!(target.connection_limit, Some(MAX_CONNECTION_LIMIT));

        let oversized = [
            json!(MAX_CONNECTION_LIMIT + 1),
            json!(1_000_000_000_u64),
            json!(1_u64 << 62),
        ];
        for limit in oversized {
            let err = validate_connect_body(&body(limit)).unwrap_err();
            assert!(matches!(err, ValidationError::MalformedBody(_)));
        }
    }

    #[test]
    fn test_missing_header_body() {
        let err = ValidationError::MissingHeader("username");
        assert_eq!(err.body(), "[INVALID HEADERS]\nMissing 'username' header!");
    }
}
