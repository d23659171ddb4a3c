//! Authentication for both planes
//!
//! Connect and disconnect are authenticated by password against the
//! credential store (hex SHA-512 digests read through the admin connection);
//! every other request is authenticated by the session token issued at
//! connect time.

mod credentials;
mod error;
mod gate;
mod middleware;

pub use credentials::{CredentialRecord, CredentialStore, hash_password};
pub use error::{AuthError, Result};
pub use gate::{AuthGate, RequestCredentials};
pub use middleware::{Caller, PASSWORD_HEADER, TOKEN_HEADER, USERNAME_HEADER, gate_middleware};
