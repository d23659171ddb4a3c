use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;
use crate::downstream::DownstreamError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Downstream(#[from] DownstreamError),

    #[error("{0}")]
    Internal(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Downstream(_) | Self::Config(_) | Self::Transport(_)
        ) || matches!(self, Self::Auth(AuthError::Backend(_)))
    }

    /// HTTP status for this error when it terminates a request
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(err) => err.status_code(),
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Config(_) | Self::Downstream(_) | Self::Internal(_) | Self::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short reason used in access log lines
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid Input",
            Self::Auth(err) => err.reason(),
            Self::Timeout(_) => "Connection Timeout",
            Self::Config(_) | Self::Downstream(_) | Self::Internal(_) | Self::Transport(_) => {
                "Internal Server Error"
            }
        }
    }

    /// Plain-text body sent to the client
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Validation(err) => err.body(),
            Self::Auth(err) => err.body(),
            Self::Timeout(_) => "[TIMEOUT]\nDatabase timeout!".to_string(),
            Self::Config(_) | Self::Downstream(_) | Self::Internal(_) | Self::Transport(_) => {
                format!("Internal Server Error -\n{self}")
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = Error::from(ValidationError::MissingOperation);
        assert!(err.is_validation());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.reason(), "Invalid Input");
        assert!(err.body().starts_with("[INVALID BODY]"));
    }

    #[test]
    fn test_timeout_maps_to_request_timeout() {
        let err = Error::Timeout(Duration::from_millis(50));
        assert!(err.is_timeout());
        assert_eq!(err.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.body(), "[TIMEOUT]\nDatabase timeout!");
    }

    #[test]
    fn test_auth_errors_keep_their_status() {
        assert_eq!(
            Error::from(AuthError::UnknownUser).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::from(AuthError::WrongToken).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::from(AuthError::NoSession).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_body_carries_raw_error() {
        let err = Error::internal("pool vanished");
        assert!(err.is_internal());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), "Internal Server Error -\npool vanished");
    }

    #[test]
    fn test_driver_error_is_internal() {
        let err = Error::from(DownstreamError::Driver("socket closed".into()));
        assert!(err.is_internal());
        assert!(err.body().contains("socket closed"));
    }

    #[test]
    fn test_auth_backend_is_internal() {
        let err = Error::from(AuthError::Backend("admin pool down".into()));
        assert!(err.is_internal());
        assert!(err.is_auth());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            err.body()
                .starts_with("Internal Authentication Server Error -")
        );
    }

    #[test]
    fn test_config_predicate() {
        let err = Error::Config("missing admin url".into());
        assert!(err.is_config());
        assert!(err.to_string().contains("missing admin url"));
    }
}
