//! Response rendering and per-outcome access logging

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::error::Error;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Log one request outcome as `<code> - <reason> (<user>) @ <route>`
pub(crate) fn log_outcome(status: StatusCode, reason: &str, username: &str, route: &str) {
    let code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(status = code, username, route, "{code} - {reason} ({username}) @ {route}");
    } else if status.is_success() {
        tracing::info!(status = code, username, route, "{code} - {reason} ({username}) @ {route}");
    } else {
        tracing::warn!(status = code, username, route, "{code} - {reason} ({username}) @ {route}");
    }
}

/// Turn a failed request into its plain-text response and log it
pub(crate) fn reject(err: &Error, username: &str, route: &str) -> Response {
    log_outcome(err.status_code(), err.reason(), username, route);
    if err.is_internal() {
        tracing::error!(username, route, error = %err, "Request failed");
    }
    plain(err.status_code(), err.body())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        plain(self.status_code(), self.body())
    }
}

pub(crate) fn plain(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
        body,
    )
        .into_response()
}

fn wants_text(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| {
            accept
                .split(',')
                .any(|part| part.trim().to_ascii_lowercase().starts_with("text/plain"))
        })
}

/// Render a successful JSON payload honoring `accept: text/plain`
pub(crate) fn negotiate<T: Serialize>(headers: &HeaderMap, payload: &T) -> Response {
    if wants_text(headers) {
        match serde_json::to_string(payload) {
            Ok(text) => plain(StatusCode::OK, text),
            Err(e) => Error::internal(format!("Unserializable response: {e}")).into_response(),
        }
    } else {
        Json(payload).into_response()
    }
}
