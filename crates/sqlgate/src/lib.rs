//! Multi-tenant SQL gateway
//!
//! Callers authenticate against a credential store, open one pooled
//! downstream connection per username, and proxy statements through it with
//! a per-request deadline. A second plane hands out tokens for remote log
//! submission, and a local operator console shares the same session
//! registry.

pub mod auth;
pub mod config;
pub mod console;
mod constants;
pub mod downstream;
mod error;
mod helpers;
pub mod observability;
mod pool;
pub mod proxy;
pub mod server;
pub mod session;
pub mod targets;
pub mod transport;
pub mod types;
mod validation;

pub use auth::{AuthError, AuthGate, CredentialStore};
pub use config::{Config, ConfigBuilder, TelemetryConfig};
pub use console::Console;
pub use downstream::{Connector, DownstreamError, SqlConnection, TargetParams};
pub use error::{Error, Result};
pub use pool::{HanaConnector, HanaPool};
pub use proxy::{QueryOutcome, QueryProxy, QueryRequest, ResponseShape};
pub use server::Gateway;
pub use session::{Plane, SessionManager};
pub use targets::{PoolManager, TargetPolicy};
pub use transport::{build_router, run_http};
pub use types::*;
