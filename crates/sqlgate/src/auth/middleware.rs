//! Gate middleware for the HTTP transport

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use super::gate::{AuthGate, RequestCredentials};
use crate::error::Error;
use crate::session::classify_path;
use crate::transport::reject;
use crate::validation::ValidationError;

pub const USERNAME_HEADER: &str = "username";
pub const PASSWORD_HEADER: &str = "password";
pub const TOKEN_HEADER: &str = "token";

/// Identity of a caller that passed the gate, inserted as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub username: String,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Run the gate for the request's plane and access kind
pub async fn gate_middleware(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let route = request.uri().path().to_string();

    let Some((plane, kind)) = classify_path(&route) else {
        return next.run(request).await;
    };

    let headers = request.headers();
    let Some(username) = header_str(headers, USERNAME_HEADER).filter(|u| !u.is_empty()) else {
        return reject(
            &Error::from(ValidationError::MissingHeader(USERNAME_HEADER)),
            "",
            &route,
        );
    };

    let creds = RequestCredentials {
        password: header_str(headers, PASSWORD_HEADER),
        token: header_str(headers, TOKEN_HEADER),
        username,
    };

    if let Err(e) = gate.check(plane, kind, &creds).await {
        #[cfg(feature = "metrics")]
        crate::observability::record_auth_rejection(plane.as_str(), e.reason());

        if !e.is_rejection() {
            tracing::error!(username = %creds.username, error = %e, "Credential lookup failed");
        }
        return reject(&Error::from(e), &creds.username, &route);
    }

    request.extensions_mut().insert(Caller {
        username: creds.username,
    });
    next.run(request).await
}
