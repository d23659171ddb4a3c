//! Downstream target policy and the pool manager that opens sessions'
//! connections

use std::fmt;
use std::sync::Arc;

use crate::auth::AuthError;
use crate::downstream::{Connector, SqlConnection, TargetParams};
use crate::{Error, Result};

/// Which downstream hosts callers may connect to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetPolicy {
    allowed_hosts: Vec<String>,
}

impl TargetPolicy {
    /// An empty list permits any host
    pub fn new(allowed_hosts: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.allowed_hosts.is_empty()
    }

    #[must_use]
    pub fn permits(&self, host: &str) -> bool {
        self.is_open()
            || self
                .allowed_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }
}

/// Opens and closes the pooled connections owned by sql-plane sessions
#[derive(Clone)]
pub struct PoolManager {
    connector: Arc<dyn Connector>,
    policy: TargetPolicy,
}

impl fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("connector", &self.connector)
            .field("policy", &self.policy)
            .finish()
    }
}

impl PoolManager {
    pub fn new(connector: Arc<dyn Connector>, policy: TargetPolicy) -> Self {
        Self { connector, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &TargetPolicy {
        &self.policy
    }

    /// Open a pooled connection for `username` to the caller-supplied target
    pub async fn open_connection(
        &self,
        username: &str,
        target: &TargetParams,
    ) -> Result<Arc<dyn SqlConnection>> {
        if !self.policy.permits(&target.host) {
            tracing::warn!(username, host = %target.host, "Connection target rejected");
            return Err(AuthError::TargetNotAllowed(target.host.clone()).into());
        }

        let connection = self.connector.open(target).await.map_err(Error::from)?;

        tracing::info!(username, host = %target.host, "Downstream connection opened");
        Ok(connection)
    }
}
