//! Saga error types.

use thiserror::Error;

use crate::services::{Service, SessionError, TransportFailure};

/// Failures surfaced to callers of the orchestration flows.
///
/// Every variant maps to an HTTP-style status via [`SagaError::status_code`]
/// and displays as the human-readable detail sent back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaError {
    /// The caller's input was refused by a dependency (weak password, invalid id).
    #[error("{detail}")]
    ValidationRejected { detail: String },

    /// The user already exists.
    #[error("{detail}")]
    Conflict { detail: String },

    /// A dependency answered with a status the flow does not accept.
    #[error("{detail}")]
    UpstreamServiceError { status: u16, detail: String },

    /// A dependency could not be reached (timeout, refused connection, DNS).
    #[error("{detail}")]
    UpstreamUnreachable { service: Service, detail: String },

    /// The login step after profile creation did not yield a token.
    #[error("{detail}")]
    LoginFailed { detail: String },

    /// Unclassified fault inside the orchestrator.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SagaError {
    /// Returns the caller-facing status code.
    pub fn status_code(&self) -> u16 {
        match self {
            SagaError::ValidationRejected { .. } => 422,
            SagaError::Conflict { .. } => 409,
            SagaError::UpstreamServiceError { status, .. } => *status,
            SagaError::UpstreamUnreachable { .. } | SagaError::LoginFailed { .. } => 503,
            SagaError::Internal(_) => 500,
        }
    }

    /// Returns the caller-facing detail message.
    pub fn detail(&self) -> String {
        self.to_string()
    }

    /// Returns a short name for the failure kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            SagaError::ValidationRejected { .. } => "validation_rejected",
            SagaError::Conflict { .. } => "conflict",
            SagaError::UpstreamServiceError { .. } => "upstream_service_error",
            SagaError::UpstreamUnreachable { .. } => "upstream_unreachable",
            SagaError::LoginFailed { .. } => "login_failed",
            SagaError::Internal(_) => "internal",
        }
    }
}

impl From<TransportFailure> for SagaError {
    fn from(failure: TransportFailure) -> Self {
        SagaError::UpstreamUnreachable {
            service: failure.service,
            detail: failure.to_string(),
        }
    }
}

impl From<SessionError> for SagaError {
    fn from(err: SessionError) -> Self {
        SagaError::Internal(err.to_string())
    }
}

/// Errors from operator discovery.
///
/// Not translated into caller-facing statuses here; the caller decides.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The registry could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportFailure),

    /// The session could not be opened.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The registry answered with a non-success status.
    #[error("registry returned status {0} for the operator list")]
    UnexpectedStatus(u16),

    /// The operator list could not be parsed.
    #[error("invalid operator list: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
