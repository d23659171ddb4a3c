//! Per-request admission checks
//!
//! The gate only reads: it consults the session registry and the credential
//! store and never creates or removes a session itself.

use std::fmt;
use std::sync::Arc;

use super::credentials::CredentialStore;
use super::error::{AuthError, Result};
use crate::session::{AccessKind, Plane, SessionManager};

/// Identity headers supplied with a request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    pub username: String,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl fmt::Debug for RequestCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCredentials")
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl RequestCredentials {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[derive(Clone)]
pub struct AuthGate {
    sessions: Arc<SessionManager>,
    credentials: CredentialStore,
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("sessions", &self.sessions)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl AuthGate {
    pub const fn new(sessions: Arc<SessionManager>, credentials: CredentialStore) -> Self {
        Self {
            sessions,
            credentials,
        }
    }

    /// Decide whether a request may reach its handler
    pub async fn check(
        &self,
        plane: Plane,
        kind: AccessKind,
        creds: &RequestCredentials,
    ) -> Result<()> {
        let username = creds.username.as_str();

        match kind {
            AccessKind::Connect => {
                if self.sessions.is_occupied(plane, username) {
                    return Err(AuthError::AlreadyConnected);
                }
                self.verify_password(creds).await
            }
            AccessKind::Disconnect => {
                if self.sessions.token(plane, username).is_none() {
                    return Err(AuthError::NoSession);
                }
                self.verify_password(creds).await
            }
            AccessKind::Operate => {
                let stored = self
                    .sessions
                    .token(plane, username)
                    .ok_or(AuthError::NoSession)?;

                match creds.token.as_deref() {
                    Some(supplied) if supplied == stored => Ok(()),
                    _ => Err(AuthError::WrongToken),
                }
            }
        }
    }

    async fn verify_password(&self, creds: &RequestCredentials) -> Result<()> {
        let record = self
            .credentials
            .lookup(&creds.username)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        match creds.password.as_deref() {
            Some(password) if record.verify(password) => Ok(()),
            _ => Err(AuthError::WrongPassword),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::auth::hash_password;
    use crate::downstream::{DownstreamError, SqlConnection};

    #[derive(Debug)]
    struct Logins;

    #[async_trait]
    impl SqlConnection for Logins {
        async fn query(
            &self,
            _sql: &str,
            params: &[Value],
        ) -> std::result::Result<Value, DownstreamError> {
            match params.first().and_then(Value::as_str) {
                Some("alice") => Ok(json!([{ "password_hash": hash_password("pw") }])),
                Some("broken") => Err(DownstreamError::Driver("admin down".into())),
                _ => Ok(json!([])),
            }
        }

        async fn close(&self) -> std::result::Result<(), DownstreamError> {
            Ok(())
        }
    }

    fn gate() -> (AuthGate, Arc<SessionManager>) {
        let sessions = Arc::new(SessionManager::new());
        let gate = AuthGate::new(Arc::clone(&sessions), CredentialStore::new(Arc::new(Logins)));
        (gate, sessions)
    }

    #[tokio::test]
    async fn test_connect_with_valid_password() {
        let (gate, _) = gate();
        let creds = RequestCredentials::new("alice").with_password("pw");
        assert!(gate.check(Plane::Sql, AccessKind::Connect, &creds).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_unknown_user() {
        let (gate, _) = gate();
        let creds = RequestCredentials::new("mallory").with_password("pw");
        assert_eq!(
            gate.check(Plane::Sql, AccessKind::Connect, &creds).await,
            Err(AuthError::UnknownUser)
        );
    }

    #[tokio::test]
    async fn test_connect_wrong_or_missing_password() {
        let (gate, _) = gate();
        let wrong = RequestCredentials::new("alice").with_password("nope");
        let missing = RequestCredentials::new("alice");

        assert_eq!(
            gate.check(Plane::Log, AccessKind::Connect, &wrong).await,
            Err(AuthError::WrongPassword)
        );
        assert_eq!(
            gate.check(Plane::Log, AccessKind::Connect, &missing).await,
            Err(AuthError::WrongPassword)
        );
    }

    #[tokio::test]
    async fn test_connect_when_already_connected() {
        let (gate, sessions) = gate();
        sessions.issue_token(Plane::Sql, "alice").unwrap();

        let creds = RequestCredentials::new("alice").with_password("pw");
        assert_eq!(
            gate.check(Plane::Sql, AccessKind::Connect, &creds).await,
            Err(AuthError::AlreadyConnected)
        );
        assert!(gate.check(Plane::Log, AccessKind::Connect, &creds).await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_requires_session() {
        let (gate, _) = gate();
        let creds = RequestCredentials::new("alice").with_password("pw");
        assert_eq!(
            gate.check(Plane::Sql, AccessKind::Disconnect, &creds).await,
            Err(AuthError::NoSession)
        );
    }

    #[tokio::test]
    async fn test_disconnect_revalidates_password() {
        let (gate, sessions) = gate();
        sessions.issue_token(Plane::Log, "alice").unwrap();

        let good = RequestCredentials::new("alice").with_password("pw");
        let bad = RequestCredentials::new("alice").with_password("guess");
        assert!(gate.check(Plane::Log, AccessKind::Disconnect, &good).await.is_ok());
        assert_eq!(
            gate.check(Plane::Log, AccessKind::Disconnect, &bad).await,
            Err(AuthError::WrongPassword)
        );
    }

    #[tokio::test]
    async fn test_operate_token_check() {
        let (gate, sessions) = gate();
        let token = sessions.issue_token(Plane::Sql, "alice").unwrap();

        let good = RequestCredentials::new("alice").with_token(token);
        let bad = RequestCredentials::new("alice").with_token("forged");
        let missing = RequestCredentials::new("alice");

        assert!(gate.check(Plane::Sql, AccessKind::Operate, &good).await.is_ok());
        assert_eq!(
            gate.check(Plane::Sql, AccessKind::Operate, &bad).await,
            Err(AuthError::WrongToken)
        );
        assert_eq!(
            gate.check(Plane::Sql, AccessKind::Operate, &missing).await,
            Err(AuthError::WrongToken)
        );
    }

    #[tokio::test]
    async fn test_operate_without_session() {
        let (gate, _) = gate();
        let creds = RequestCredentials::new("alice").with_token("anything");
        assert_eq!(
            gate.check(Plane::Log, AccessKind::Operate, &creds).await,
            Err(AuthError::NoSession)
        );
    }

    #[tokio::test]
    async fn test_pending_connect_blocks_second_connect() {
        let (gate, sessions) = gate();
        let _pending = sessions.reserve(Plane::Sql, "alice").unwrap();

        let creds = RequestCredentials::new("alice").with_password("pw");
        assert_eq!(
            gate.check(Plane::Sql, AccessKind::Connect, &creds).await,
            Err(AuthError::AlreadyConnected)
        );
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces() {
        let (gate, _) = gate();
        let creds = RequestCredentials::new("broken").with_password("pw");
        assert!(matches!(
            gate.check(Plane::Sql, AccessKind::Connect, &creds).await,
            Err(AuthError::Backend(_))
        ));
    }
}
