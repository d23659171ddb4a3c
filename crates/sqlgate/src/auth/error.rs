//! Authentication error types

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("connection already exists for this user")]
    AlreadyConnected,

    #[error("no connection opened for this user")]
    NoSession,

    #[error("unknown user")]
    UnknownUser,

    #[error("wrong password")]
    WrongPassword,

    #[error("wrong token")]
    WrongToken,

    #[error("connection target '{0}' is not allowed")]
    TargetNotAllowed(String),

    #[error("credential store failure: {0}")]
    Backend(String),
}

impl AuthError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyConnected | Self::NoSession => StatusCode::BAD_REQUEST,
            Self::UnknownUser => StatusCode::UNAUTHORIZED,
            Self::WrongPassword | Self::WrongToken | Self::TargetNotAllowed(_) => {
                StatusCode::FORBIDDEN
            }
            Self::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "Connection Exists",
            Self::NoSession => "No Connection",
            Self::UnknownUser => "Unknown User",
            Self::WrongPassword => "Wrong Password",
            Self::WrongToken => "Wrong Token",
            Self::TargetNotAllowed(_) => "Target Not Allowed",
            Self::Backend(_) => "Internal Authentication Server Error",
        }
    }

    /// Whether the request was turned away because of caller input
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }

    pub(crate) fn body(&self) -> String {
        match self {
            Self::AlreadyConnected => "[CONNECTION EXISTS]\nConnection already exists for this \
                                       user. Close the current connection first!"
                .to_string(),
            Self::NoSession => "[NO CONNECTION]\nNo connection opened for this user!".to_string(),
            Self::UnknownUser => "[ACCESS DENIED]\nAccess denied, unknown user!".to_string(),
            Self::WrongPassword => "[ACCESS DENIED]\nAccess denied, wrong password!".to_string(),
            Self::WrongToken => "[ACCESS DENIED]\nAccess denied, wrong token!".to_string(),
            Self::TargetNotAllowed(host) => {
                format!("[ACCESS DENIED]\nConnection target '{host}' is not allowed!")
            }
            Self::Backend(msg) => format!("Internal Authentication Server Error -\n{msg}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
