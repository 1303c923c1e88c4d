//! Error types for authentication operations.

use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;
use tollgate_core::{StoreError, TransportError};

/// Failure of a login, logout or token refresh.
///
/// Cloneable so that one refresh outcome can be handed to every caller that
/// joined the same refresh cycle.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No tokens are stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The stored refresh token is past its expiry; no refresh was attempted.
    #[error("refresh token expired")]
    RefreshTokenExpired,

    /// The token endpoint rejected the credentials.
    #[error("login rejected with status {status}")]
    LoginRejected {
        /// Status returned by the token endpoint.
        status: StatusCode,
        /// Message extracted from the response body, if any.
        message: Option<String>,
    },

    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected with status {status}")]
    RefreshRejected {
        /// Status returned by the refresh endpoint.
        status: StatusCode,
    },

    /// The endpoint answered 2xx with a body that is not a token pair.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(Arc<serde_json::Error>),

    /// The endpoint could not be reached.
    #[error("token endpoint unreachable: {0}")]
    Transport(Arc<TransportError>),

    /// The token store failed.
    #[error("token store failure: {0}")]
    Store(Arc<StoreError>),
}

impl From<TransportError> for AuthError {
    fn from(error: TransportError) -> Self {
        Self::Transport(Arc::new(error))
    }
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        Self::Store(Arc::new(error))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidTokenResponse(Arc::new(error))
    }
}

impl AuthError {
    /// HTTP status associated with the failure, when there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::LoginRejected { status, .. } | Self::RefreshRejected { status } => Some(*status),
            Self::NotAuthenticated | Self::RefreshTokenExpired => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}
