//! Credential store backed by the admin connection

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha512};

use super::error::{AuthError, Result};
use crate::constants::{CREDENTIAL_LOOKUP_QUERY, PASSWORD_HASH_COLUMN};
use crate::downstream::SqlConnection;

/// Hex-encoded SHA-512 digest of a password
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha512::digest(password.as_bytes()))
}

/// One row of the credential table
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

impl CredentialRecord {
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        hash_password(password) == self.password_hash
    }
}

/// Read-only view over the credential table
#[derive(Clone)]
pub struct CredentialStore {
    connection: Arc<dyn SqlConnection>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("connection", &self.connection)
            .finish()
    }
}

impl CredentialStore {
    pub fn new(connection: Arc<dyn SqlConnection>) -> Self {
        Self { connection }
    }

    /// The admin connection, also used by the console's `sql-admin:` command
    #[must_use]
    pub const fn connection(&self) -> &Arc<dyn SqlConnection> {
        &self.connection
    }

    /// Look up the record for `username`; `None` when the user does not exist
    pub async fn lookup(&self, username: &str) -> Result<Option<CredentialRecord>> {
        let rows = self
            .connection
            .query(CREDENTIAL_LOOKUP_QUERY, &[Value::String(username.to_string())])
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let Some(row) = rows.as_array().and_then(|rows| rows.first()) else {
            return Ok(None);
        };

        let password_hash = row
            .as_object()
            .and_then(|columns| {
                columns
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(PASSWORD_HASH_COLUMN))
                    .map(|(_, value)| value)
            })
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AuthError::Backend(format!("credential row has no '{PASSWORD_HASH_COLUMN}' column"))
            })?;

        Ok(Some(CredentialRecord {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::downstream::DownstreamError;

    #[derive(Debug)]
    struct FixedRows(std::result::Result<Value, DownstreamError>);

    #[async_trait]
    impl SqlConnection for FixedRows {
        async fn query(&self, sql: &str, params: &[Value]) -> std::result::Result<Value, DownstreamError> {
            assert_eq!(sql, CREDENTIAL_LOOKUP_QUERY);
            assert_eq!(params.len(), 1);
            self.0.clone()
        }

        async fn close(&self) -> std::result::Result<(), DownstreamError> {
            Ok(())
        }
    }

    fn store(rows: std::result::Result<Value, DownstreamError>) -> CredentialStore {
        CredentialStore::new(Arc::new(FixedRows(rows)))
    }

    #[test]
    fn test_hash_password_is_sha512_hex() {
        let hash = hash_password("secret");
        assert_eq!(hash.len(), 128);
        assert!(hash.starts_with("bd2b1aaf7ef4f09be9f52ce2d8d599674d81aa9d6a4421696dc4d93dd0619d68"));
    }

    #[test]
    fn test_verify_compares_digest_exactly() {
        let record = CredentialRecord {
            username: "alice".into(),
            password_hash: hash_password("secret"),
        };
        assert!(record.verify("secret"));
        assert!(!record.verify("Secret"));
        assert!(!record.verify(""));

        let upper = CredentialRecord {
            password_hash: hash_password("secret").to_uppercase(),
            ..record
        };
        assert!(!upper.verify("secret"));
    }

    #[tokio::test]
    async fn test_lookup_found_with_any_column_case() {
        let hash = hash_password("pw");
        let store = store(Ok(json!([{ "USERNAME": "alice", "PASSWORD_HASH": hash }])));

        let record = store.lookup("alice").await.unwrap().unwrap();
        assert_eq!(record.username, "alice");
        assert!(record.verify("pw"));
    }

    #[tokio::test]
    async fn test_lookup_missing_user() {
        let store = store(Ok(json!([])));
        assert!(store.lookup("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_backend_failure() {
        let store = store(Err(DownstreamError::Driver("admin pool exhausted".into())));
        let err = store.lookup("alice").await.unwrap_err();
        assert!(matches!(err, AuthError::Backend(ref msg) if msg.contains("admin pool exhausted")));
    }

    #[tokio::test]
    async fn test_lookup_row_without_hash_column() {
        let store = store(Ok(json!([{ "USERNAME": "alice" }])));
        assert!(matches!(
            store.lookup("alice").await,
            Err(AuthError::Backend(_))
        ));
    }

    #[test]
    fn test_record_debug_redacts_hash() {
        let record = CredentialRecord {
            username: "alice".into(),
            password_hash: "abcdef".into(),
        };
        assert!(!format!("{record:?}").contains("abcdef"));
    }
}
