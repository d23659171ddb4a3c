//! HTTP surface
//!
//! Every plane route sits behind the auth gate middleware, so handlers only
//! see callers that already passed the credential or token check.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::post;
use axum::{Extension, Router};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::response::{log_outcome, negotiate, plain, reject};
use crate::auth::{Caller, gate_middleware};
use crate::constants::LOG_ACK;
use crate::proxy::{QueryOutcome, QueryRequest, ResponseShape};
use crate::server::Gateway;
use crate::session::Plane;
use crate::validation::parse_body;
use crate::{Error, Result};

pub const FULL_RESPONSE_HEADER: &str = "full-response";
pub const BLANK_HEADER: &str = "blank";

/// Build the gateway router
pub fn build_router(gateway: Arc<Gateway>) -> Router {
    let gate = gateway.gate().clone();

    #[allow(unused_mut)]
    let mut app = Router::new()
        .route("/sql/connect", post(sql_connect))
        .route("/sql/disconnect", post(sql_disconnect))
        .route("/sql", post(sql_query))
        .route("/log/connect", post(log_connect))
        .route("/log/disconnect", post(log_disconnect))
        .route("/log", post(log_message))
        .route_layer(middleware::from_fn_with_state(gate, gate_middleware));

    #[cfg(feature = "metrics")]
    {
        app = app
            .route("/metrics", axum::routing::get(metrics_handler))
            .layer(middleware::from_fn(track_requests));
    }

    app.layer(middleware::from_fn(head_ok))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Serve until `shutdown` is cancelled
pub async fn run_http(
    gateway: Arc<Gateway>,
    host: IpAddr,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::new(host, port);
    emit_bind_warnings(host);

    let app = build_router(gateway);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn emit_bind_warnings(host: IpAddr) {
    if host == IpAddr::V4(Ipv4Addr::UNSPECIFIED) || host == IpAddr::V6(Ipv6Addr::UNSPECIFIED) {
        tracing::warn!(
            "HTTP server binding to all interfaces. \
             Tokens and credentials travel in plain headers; terminate TLS in front of the gateway."
        );
    } else if !host.is_loopback() {
        tracing::warn!("HTTP server binding to non-loopback address ({host})");
    }
}

/// Any HEAD request is answered with an empty 200
async fn head_ok(request: Request, next: Next) -> Response {
    if request.method() == Method::HEAD {
        return Response::new(Body::empty());
    }
    next.run(request).await
}

#[cfg(feature = "metrics")]
async fn track_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let route = if path == "/metrics" || crate::session::classify_path(path).is_some() {
        path.to_string()
    } else {
        "other".to_string()
    };

    let started = std::time::Instant::now();
    let response = next.run(request).await;
    crate::observability::record_request(&route, response.status().as_u16(), started.elapsed());
    response
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> Response {
    plain(StatusCode::OK, crate::observability::render_metrics())
}

async fn sql_connect(
    State(gateway): State<Arc<Gateway>>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    connect(&gateway, Plane::Sql, &caller, &headers, &body).await
}

async fn log_connect(
    State(gateway): State<Arc<Gateway>>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    connect(&gateway, Plane::Log, &caller, &headers, &body).await
}

async fn sql_disconnect(
    State(gateway): State<Arc<Gateway>>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
) -> Response {
    disconnect(&gateway, Plane::Sql, &caller, &headers).await
}

async fn log_disconnect(
    State(gateway): State<Arc<Gateway>>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
) -> Response {
    disconnect(&gateway, Plane::Log, &caller, &headers).await
}

async fn connect(
    gateway: &Gateway,
    plane: Plane,
    caller: &Caller,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let route = format!("/{plane}/connect");
    let result = match parse_body(body) {
        Ok(body) => gateway.connect(plane, &caller.username, &body).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(response) => {
            log_outcome(StatusCode::OK, "Connected", &caller.username, &route);
            negotiate(headers, &response)
        }
        Err(e) => reject(&e, &caller.username, &route),
    }
}

async fn disconnect(gateway: &Gateway, plane: Plane, caller: &Caller, headers: &HeaderMap) -> Response {
    let route = format!("/{plane}/disconnect");
    match gateway.disconnect(plane, &caller.username).await {
        Ok(response) => {
            log_outcome(StatusCode::OK, "Disconnected", &caller.username, &route);
            negotiate(headers, &response)
        }
        Err(e) => reject(&e, &caller.username, &route),
    }
}

async fn sql_query(
    State(gateway): State<Arc<Gateway>>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    const ROUTE: &str = "/sql";

    let request = match parse_body(&body).and_then(|body| gateway.proxy().prepare(&body)) {
        Ok(request) => request,
        Err(e) => return reject(&Error::from(e), &caller.username, ROUTE),
    };

    let shape = ResponseShape::from_header(
        headers
            .get(FULL_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok()),
    );

    match run_with_deadline(gateway, caller.username.clone(), request).await {
        Ok(outcome) => {
            log_outcome(StatusCode::OK, outcome.label(), &caller.username, ROUTE);
            negotiate(&headers, &outcome.render(shape))
        }
        Err(e) => reject(&e, &caller.username, ROUTE),
    }
}

/// Race the statement against its deadline.
///
/// The statement runs on its own task. When the deadline wins, the task is
/// left to finish and its outcome is only logged; the session registry is
/// not touched on either path.
async fn run_with_deadline(
    gateway: Arc<Gateway>,
    username: String,
    request: QueryRequest,
) -> Result<QueryOutcome> {
    let deadline = request.timeout;
    let task_user = username.clone();
    let mut handle = tokio::spawn(async move { gateway.query(&task_user, &request).await });

    let Some(deadline) = deadline else {
        return joined(handle.await);
    };

    match tokio::time::timeout(deadline, &mut handle).await {
        Ok(result) => joined(result),
        Err(_) => {
            tokio::spawn(async move {
                match joined(handle.await) {
                    Ok(outcome) => tracing::debug!(
                        username = %username,
                        status = outcome.label(),
                        "Discarded query outcome that arrived after its deadline"
                    ),
                    Err(e) => tracing::debug!(
                        username = %username,
                        error = %e,
                        "Discarded query error that arrived after its deadline"
                    ),
                }
            });
            Err(Error::Timeout(deadline))
        }
    }
}

fn joined(result: std::result::Result<Result<QueryOutcome>, JoinError>) -> Result<QueryOutcome> {
    result.map_err(|e| Error::internal(format!("Query task failed: {e}")))?
}

async fn log_message(
    State(gateway): State<Arc<Gateway>>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    const ROUTE: &str = "/log";

    let blank = headers
        .get(BLANK_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

    let result = match parse_body(&body) {
        Ok(body) => gateway.log_message(&caller.username, &body, blank),
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => {
            log_outcome(StatusCode::OK, "Logged", &caller.username, ROUTE);
            plain(StatusCode::OK, LOG_ACK.to_string())
        }
        Err(e) => reject(&e, &caller.username, ROUTE),
    }
}
