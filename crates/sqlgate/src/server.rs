//! Gateway state shared by the HTTP handlers and the operator console

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::auth::{AuthGate, CredentialStore};
use crate::config::Config;
use crate::constants::LOG_PLANE_TARGET;
use crate::downstream::{Connector, SqlConnection};
use crate::helpers::display_json;
use crate::proxy::{QueryOutcome, QueryProxy, QueryRequest};
use crate::session::{Plane, SessionManager};
use crate::targets::{PoolManager, TargetPolicy};
use crate::types::{ConnectResponse, DisconnectResponse, LogRequest};
use crate::validation::validate_connect_body;
use crate::{Error, Result};

pub struct Gateway {
    sessions: Arc<SessionManager>,
    credentials: CredentialStore,
    gate: AuthGate,
    proxy: QueryProxy,
    pools: PoolManager,
    started_at: Instant,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("sessions", &self.sessions)
            .field("proxy", &self.proxy)
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(
        admin: Arc<dyn SqlConnection>,
        connector: Arc<dyn Connector>,
        policy: TargetPolicy,
        default_timeout: Duration,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new());
        let credentials = CredentialStore::new(admin);
        let gate = AuthGate::new(Arc::clone(&sessions), credentials.clone());

        Self {
            sessions,
            credentials,
            gate,
            proxy: QueryProxy::new(default_timeout),
            pools: PoolManager::new(connector, policy),
            started_at: Instant::now(),
        }
    }

    pub fn from_config(
        config: &Config,
        admin: Arc<dyn SqlConnection>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self::new(
            admin,
            connector,
            TargetPolicy::new(config.targets.allowed_hosts.clone()),
            config.query_timeout(),
        )
    }

    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub const fn gate(&self) -> &AuthGate {
        &self.gate
    }

    #[must_use]
    pub const fn proxy(&self) -> &QueryProxy {
        &self.proxy
    }

    #[must_use]
    pub const fn policy(&self) -> &TargetPolicy {
        self.pools.policy()
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Open a session on `plane`.
    ///
    /// On the sql plane the username is reserved first, then the downstream
    /// pool is opened, then token and connection are committed together. Any
    /// failure along the way releases the reservation.
    pub async fn connect(
        &self,
        plane: Plane,
        username: &str,
        body: &Map<String, Value>,
    ) -> Result<ConnectResponse> {
        let token = match plane {
            Plane::Sql => {
                let target = validate_connect_body(body)?;
                let pending = self.sessions.reserve(plane, username)?;
                let connection = self.pools.open_connection(username, &target).await?;
                pending.commit(Some(connection))
            }
            Plane::Log => self.sessions.issue_token(plane, username)?,
        };

        tracing::info!(plane = %plane, username, "Session opened");
        Ok(ConnectResponse::new(token))
    }

    /// Close the session on `plane`. The entry is removed even when closing
    /// the downstream pool fails.
    pub async fn disconnect(&self, plane: Plane, username: &str) -> Result<DisconnectResponse> {
        match plane {
            Plane::Sql => self.sessions.close_connection(username).await?,
            Plane::Log => {
                self.sessions.revoke(plane, username);
            }
        }

        tracing::info!(plane = %plane, username, "Session closed");
        Ok(DisconnectResponse::default())
    }

    /// Run a validated statement on the user's sql connection
    pub async fn query(&self, username: &str, request: &QueryRequest) -> Result<QueryOutcome> {
        let connection = self.sessions.connection(username);
        self.proxy
            .execute(&request.sql, &request.values, connection.as_ref())
            .await
    }

    /// Emit a message submitted on the log plane
    pub fn log_message(&self, username: &str, body: &Map<String, Value>, blank: bool) -> Result<()> {
        let request: LogRequest = serde_json::from_value(Value::Object(body.clone()))
            .map_err(|e| Error::internal(format!("Unreadable log body: {e}")))?;
        let message = display_json(&request.message);

        if blank {
            tracing::info!(target: LOG_PLANE_TARGET, "{message}");
        } else {
            tracing::info!(target: LOG_PLANE_TARGET, username, "LOG [{username}] -\n{message}");
        }
        Ok(())
    }

    /// Close every session and downstream pool
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
