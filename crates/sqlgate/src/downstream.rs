//! Contract with the downstream SQL engine
//!
//! The gateway only ever talks to a database through [`SqlConnection`]
//! (run a statement, close the pool) and [`Connector`] (open a pool for a
//! caller-supplied target). The HANA implementation lives in [`crate::pool`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::constants::DEFAULT_TARGET_PORT;

/// Failure reported by the downstream engine or its driver
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownstreamError {
    /// Structured failure reported by the database itself (constraint
    /// violation, syntax error, ...). Surfaced to callers as a query-level
    /// failure, never as a transport error.
    #[error("[{code}] - {message}")]
    Query {
        code: String,
        errno: i64,
        message: String,
    },

    #[error("Downstream driver error: {0}")]
    Driver(String),

    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),
}

impl DownstreamError {
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// Numeric error code for query-level failures
    #[must_use]
    pub const fn errno(&self) -> Option<i64> {
        match self {
            Self::Query { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

/// A live, pooled connection to a downstream database
#[async_trait]
pub trait SqlConnection: Send + Sync + fmt::Debug {
    /// Run one statement with positional parameters.
    ///
    /// Row-returning statements yield a JSON array of row objects; other
    /// statements yield `{"affectedRows": n}`.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Value, DownstreamError>;

    /// Close the pool. Subsequent queries fail.
    async fn close(&self) -> Result<(), DownstreamError>;
}

/// Opens pooled connections for caller-supplied targets
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn open(&self, target: &TargetParams) -> Result<Arc<dyn SqlConnection>, DownstreamError>;
}

/// Caller-supplied downstream target
#[derive(Clone, PartialEq, Eq)]
pub struct TargetParams {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub connection_limit: Option<usize>,
}

impl fmt::Debug for TargetParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetParams")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("connection_limit", &self.connection_limit)
            .finish()
    }
}

impl TargetParams {
    /// Build the `hdbsql://` connection URL for this target
    pub fn to_url(&self) -> Result<Url, DownstreamError> {
        let port = self.port.unwrap_or(DEFAULT_TARGET_PORT);
        let mut url = Url::parse(&format!("hdbsql://{}:{port}", self.host))
            .map_err(|e| DownstreamError::InvalidTarget(format!("{}: {e}", self.host)))?;

        url.set_username(&self.user)
            .map_err(|()| DownstreamError::InvalidTarget("cannot set user".into()))?;
        url.set_password(Some(&self.password))
            .map_err(|()| DownstreamError::InvalidTarget("cannot set password".into()))?;

        if let Some(ref db) = self.database {
            url.query_pairs_mut().append_pair("db", db);
        }

        Ok(url)
    }
}
