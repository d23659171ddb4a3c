use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool::Runtime;
use deadpool::managed::{self, Metrics, RecycleResult};
use hdbconnect_async::{Connection, HdbError, HdbResponse, HdbReturnValue, HdbValue};
use serde_json::{Map, Value, json};

use crate::constants::MAX_CONNECTION_LIMIT;
use crate::downstream::{Connector, DownstreamError, SqlConnection, TargetParams};
use crate::helpers::{hdb_value_to_json, json_to_hdb_value};

pub type Pool = managed::Pool<ConnectionManager>;
pub type PooledConnection = managed::Object<ConnectionManager>;

#[derive(Debug)]
pub struct ConnectionManager {
    url: String,
}

impl ConnectionManager {
    pub const fn new(url: String) -> Self {
        Self { url }
    }
}

impl managed::Manager for ConnectionManager {
    type Type = Connection;
    type Error = HdbError;

    async fn create(&self) -> Result<Connection, HdbError> {
        Connection::new(self.url.clone()).await
    }

    async fn recycle(&self, _conn: &mut Connection, _: &Metrics) -> RecycleResult<Self::Error> {
        // Broken connections surface on the next statement.
        Ok(())
    }
}

pub fn create_pool(url: String, max_size: usize) -> Result<Pool, DownstreamError> {
    Pool::builder(ConnectionManager::new(url))
        .max_size(max_size.min(MAX_CONNECTION_LIMIT))
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(Duration::from_secs(10)))
        .create_timeout(Some(Duration::from_secs(30)))
        .recycle_timeout(Some(Duration::from_secs(5)))
        .build()
        .map_err(|e| DownstreamError::Driver(format!("Failed to create connection pool: {e}")))
}

impl From<HdbError> for DownstreamError {
    fn from(err: HdbError) -> Self {
        err.server_error().map_or_else(
            || Self::Driver(err.to_string()),
            |server| Self::Query {
                code: format!("HDB-{}", server.code()),
                errno: i64::from(server.code()),
                message: server.text().to_string(),
            },
        )
    }
}

/// Pooled HANA connection
#[derive(Debug)]
pub struct HanaPool {
    pool: Pool,
}

impl HanaPool {
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Connect lazily to `url`; connections are created on first use
    pub fn connect(url: String, max_size: usize) -> Result<Self, DownstreamError> {
        create_pool(url, max_size).map(Self::new)
    }

    async fn get(&self) -> Result<PooledConnection, DownstreamError> {
        Box::pin(self.pool.get())
            .await
            .map_err(|e| DownstreamError::Driver(format!("Failed to acquire connection: {e}")))
    }
}

#[async_trait]
impl SqlConnection for HanaPool {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Value, DownstreamError> {
        let conn = self.get().await?;

        let response = if params.is_empty() {
            conn.statement(sql).await?
        } else {
            let mut statement = conn.prepare(sql).await?;
            let row: Vec<HdbValue<'static>> = params.iter().map(json_to_hdb_value).collect();
            statement.execute_row(row).await?
        };

        response_to_json(response).await
    }

    async fn close(&self) -> Result<(), DownstreamError> {
        self.pool.close();
        Ok(())
    }
}

async fn response_to_json(response: HdbResponse) -> Result<Value, DownstreamError> {
    match response.into_single_retval()? {
        HdbReturnValue::ResultSet(result_set) => {
            let metadata = result_set.metadata().clone();
            let columns: Vec<String> = metadata
                .iter()
                .map(|col| col.columnname().to_string())
                .collect();

            let rows = result_set.into_rows().await?;
            let objects: Vec<Value> = rows
                .into_iter()
                .map(|row| {
                    let record: Map<String, Value> = columns
                        .iter()
                        .cloned()
                        .zip(row.into_iter().map(|v| hdb_value_to_json(&v)))
                        .collect();
                    Value::Object(record)
                })
                .collect();

            Ok(Value::Array(objects))
        }
        HdbReturnValue::AffectedRows(counts) => {
            Ok(json!({ "affectedRows": counts.iter().sum::<usize>() }))
        }
        _ => Ok(json!({ "affectedRows": 0 })),
    }
}

/// Opens one [`HanaPool`] per connect request
#[derive(Debug, Clone)]
pub struct HanaConnector {
    default_max_size: usize,
}

impl HanaConnector {
    pub const fn new(default_max_size: usize) -> Self {
        Self { default_max_size }
    }
}

#[async_trait]
impl Connector for HanaConnector {
    async fn open(&self, target: &TargetParams) -> Result<Arc<dyn SqlConnection>, DownstreamError> {
        let url = target.to_url()?;
        let max_size = target.connection_limit.unwrap_or(self.default_max_size);
        let pool = HanaPool::connect(url.to_string(), max_size)?;

        tracing::debug!(
            host = %target.host,
            user = %target.user,
            max_size,
            "Downstream pool created"
        );

        Ok(Arc::new(pool))
    }
}
