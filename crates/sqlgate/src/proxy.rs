//! Query proxy: run one statement against a session's connection and
//! normalize the outcome

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::constants::{SHORT_RESULT_OK, STATUS_FAIL, STATUS_OK};
use crate::downstream::{DownstreamError, SqlConnection};
use crate::types::{FullQueryResponse, ShortQueryResponse};
use crate::validation::{ValidationError, validate_operation, validate_timeout, validate_values};
use crate::{Error, Result};

/// A validated query body
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub values: Vec<Value>,
    /// `None` runs without a deadline
    pub timeout: Option<Duration>,
}

/// Which JSON shape the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    #[default]
    Full,
    Short,
}

impl ResponseShape {
    /// Resolve from the `full-response` header; only `false` selects the short shape
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("false") => Self::Short,
            _ => Self::Full,
        }
    }
}

/// Normalized result of one statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success(Value),
    /// Structured failure reported by the database
    Failed {
        code: String,
        errno: i64,
        message: String,
    },
}

impl QueryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => STATUS_OK,
            Self::Failed { .. } => STATUS_FAIL,
        }
    }

    /// Render into the requested response shape
    pub fn render(&self, shape: ResponseShape) -> Value {
        let rendered = match (self, shape) {
            (Self::Success(rows), ResponseShape::Full) => serde_json::to_value(FullQueryResponse {
                result: rows.clone(),
                status: STATUS_OK.to_string(),
            }),
            (Self::Failed { code, message, .. }, ResponseShape::Full) => {
                serde_json::to_value(FullQueryResponse {
                    result: Value::String(format!("[{code}] - {message}")),
                    status: STATUS_FAIL.to_string(),
                })
            }
            (Self::Success(_), ResponseShape::Short) => serde_json::to_value(ShortQueryResponse {
                result: SHORT_RESULT_OK,
            }),
            (Self::Failed { errno, .. }, ResponseShape::Short) => {
                serde_json::to_value(ShortQueryResponse { result: *errno })
            }
        };

        rendered.unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryProxy {
    default_timeout: Duration,
}

impl QueryProxy {
    #[must_use]
    pub const fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Validate a `/sql` body. Nothing reaches the database when this fails.
    pub fn prepare(
        &self,
        body: &Map<String, Value>,
    ) -> std::result::Result<QueryRequest, ValidationError> {
        let sql = validate_operation(body)?;
        let timeout = validate_timeout(body, self.default_timeout)?;

        Ok(QueryRequest {
            sql,
            values: validate_values(body),
            timeout,
        })
    }

    /// Run one statement. Query-level failures are an `Ok` outcome; a
    /// missing connection or a driver failure is an internal error.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        connection: Option<&Arc<dyn SqlConnection>>,
    ) -> Result<QueryOutcome> {
        let connection =
            connection.ok_or_else(|| Error::internal("No connection available for this user"))?;

        let outcome = match connection.query(sql, params).await {
            Ok(rows) => QueryOutcome::Success(rows),
            Err(DownstreamError::Query {
                code,
                errno,
                message,
            }) => QueryOutcome::Failed {
                code,
                errno,
                message,
            },
            Err(e) => return Err(e.into()),
        };

        #[cfg(feature = "metrics")]
        crate::observability::record_query(outcome.label());

        tracing::debug!(status = outcome.label(), "Query completed");
        Ok(outcome)
    }

    /// Run a statement and return its rows, treating a query-level failure
    /// as an error. Used by the operator console.
    pub async fn fetch(&self, sql: &str, connection: &Arc<dyn SqlConnection>) -> Result<Value> {
        match self.execute(sql, &[], Some(connection)).await? {
            QueryOutcome::Success(rows) => Ok(rows),
            QueryOutcome::Failed {
                code,
                errno,
                message,
            } => Err(DownstreamError::Query {
                code,
                errno,
                message,
            }
            .into()),
        }
    }
}
