//! Per-plane session registry
//!
//! Every mutation happens inside one short, synchronous critical section per
//! plane, so "insert only if absent" and "remove and hand back" are atomic
//! with respect to concurrent requests and the operator console. Locks are
//! never held across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;

use super::plane::Plane;
use super::token::generate_token;
use crate::auth::AuthError;
use crate::downstream::{DownstreamError, SqlConnection};

/// A live session: the issued token plus, on the sql plane, its connection
#[derive(Clone)]
pub struct Session {
    token: String,
    connection: Option<Arc<dyn SqlConnection>>,
}

impl Session {
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub const fn connection(&self) -> Option<&Arc<dyn SqlConnection>> {
        self.connection.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("has_connection", &self.connection.is_some())
            .finish()
    }
}

enum Slot {
    /// A connect is in flight: no token yet, but the username is taken
    Pending,
    Live(Session),
}

type Table = Mutex<HashMap<String, Slot>>;

/// Owned registry of every session on every plane
#[derive(Default)]
pub struct SessionManager {
    sql: Table,
    log: Table,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sql_sessions", &self.live_count(Plane::Sql))
            .field("log_sessions", &self.live_count(Plane::Log))
            .finish()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn table(&self, plane: Plane) -> &Table {
        match plane {
            Plane::Sql => &self.sql,
            Plane::Log => &self.log,
        }
    }

    /// Whether the username holds a session or has a connect in flight
    #[must_use]
    pub fn is_occupied(&self, plane: Plane, username: &str) -> bool {
        self.table(plane).lock().contains_key(username)
    }

    /// Token of the live session, if any
    #[must_use]
    pub fn token(&self, plane: Plane, username: &str) -> Option<String> {
        match self.table(plane).lock().get(username) {
            Some(Slot::Live(session)) => Some(session.token.clone()),
            _ => None,
        }
    }

    /// Downstream connection owned by the user's sql session
    #[must_use]
    pub fn connection(&self, username: &str) -> Option<Arc<dyn SqlConnection>> {
        match self.table(Plane::Sql).lock().get(username) {
            Some(Slot::Live(session)) => session.connection.clone(),
            _ => None,
        }
    }

    /// Atomically claim the username on `plane`.
    ///
    /// Fails with [`AuthError::AlreadyConnected`] when a session or another
    /// in-flight connect already holds it.
    pub fn reserve(self: &Arc<Self>, plane: Plane, username: &str) -> Result<PendingSession, AuthError> {
        {
            let mut slots = self.table(plane).lock();
            if slots.contains_key(username) {
                return Err(AuthError::AlreadyConnected);
            }
            slots.insert(username.to_string(), Slot::Pending);
        }

        Ok(PendingSession {
            manager: Arc::clone(self),
            plane,
            username: username.to_string(),
            committed: false,
        })
    }

    /// Issue a token for a session that owns no connection
    pub fn issue_token(self: &Arc<Self>, plane: Plane, username: &str) -> Result<String, AuthError> {
        Ok(self.reserve(plane, username)?.commit(None))
    }

    /// Remove the live session unconditionally, handing it back. Idempotent.
    pub fn revoke(&self, plane: Plane, username: &str) -> Option<Session> {
        let removed = {
            let mut slots = self.table(plane).lock();
            if matches!(slots.get(username), Some(Slot::Live(_))) {
                match slots.remove(username) {
                    Some(Slot::Live(session)) => Some(session),
                    _ => None,
                }
            } else {
                None
            }
        };

        if removed.is_some() {
            self.publish(plane);
        }
        removed
    }

    /// Remove the user's sql session and close its connection.
    ///
    /// The registry entry is gone before the close is attempted, so a failing
    /// close never leaves a dead connection registered.
    pub async fn close_connection(&self, username: &str) -> Result<(), DownstreamError> {
        let Some(session) = self.revoke(Plane::Sql, username) else {
            return Ok(());
        };

        match session.connection {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }

    /// Usernames with a live session, sorted
    #[must_use]
    pub fn usernames(&self, plane: Plane) -> Vec<String> {
        let mut names: Vec<String> = self
            .table(plane)
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn live_count(&self, plane: Plane) -> usize {
        self.table(plane)
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    /// Drop every live session and close all connections
    pub async fn shutdown(&self) {
        let mut closing = Vec::new();

        for plane in Plane::ALL {
            let drained: Vec<(String, Session)> = {
                let mut slots = self.table(plane).lock();
                let live: Vec<String> = slots
                    .iter()
                    .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
                    .map(|(name, _)| name.clone())
                    .collect();
                live.into_iter()
                    .filter_map(|name| match slots.remove(&name) {
                        Some(Slot::Live(session)) => Some((name, session)),
                        _ => None,
                    })
                    .collect()
            };

            self.publish(plane);

            closing.extend(
                drained
                    .into_iter()
                    .filter_map(|(name, session)| session.connection.map(|conn| (name, conn))),
            );
        }

        let count = closing.len();
        let results = join_all(closing.into_iter().map(|(name, conn)| async move {
            (name, conn.close().await)
        }))
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                tracing::warn!(username = %name, error = %e, "Failed to close connection during shutdown");
            }
        }

        tracing::info!(connections = count, "Session manager shut down");
    }

    #[allow(clippy::unused_self)]
    fn publish(&self, plane: Plane) {
        #[cfg(feature = "metrics")]
        crate::observability::set_live_sessions(plane.as_str(), self.live_count(plane));
        #[cfg(not(feature = "metrics"))]
        let _ = plane;
    }
}

/// A claimed username waiting for its token.
///
/// Committing stores token and connection together. Dropping without
/// committing releases the claim, so a failed or abandoned connect leaves
/// nothing behind.
#[must_use = "dropping a pending session releases the reservation"]
pub struct PendingSession {
    manager: Arc<SessionManager>,
    plane: Plane,
    username: String,
    committed: bool,
}

impl fmt::Debug for PendingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSession")
            .field("plane", &self.plane)
            .field("username", &self.username)
            .field("committed", &self.committed)
            .finish()
    }
}

impl PendingSession {
    #[must_use]
    pub const fn plane(&self) -> Plane {
        self.plane
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Turn the reservation into a live session and return its token
    pub fn commit(mut self, connection: Option<Arc<dyn SqlConnection>>) -> String {
        let token = generate_token();
        let session = Session {
            token: token.clone(),
            connection,
        };

        self.manager
            .table(self.plane)
            .lock()
            .insert(self.username.clone(), Slot::Live(session));
        self.committed = true;
        self.manager.publish(self.plane);

        token
    }
}

impl Drop for PendingSession {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        let mut slots = self.manager.table(self.plane).lock();
        if matches!(slots.get(&self.username), Some(Slot::Pending)) {
            slots.remove(&self.username);
        }
    }
}
