use std::time::Duration;

use thiserror::Error;

pub use shared::error::ValidationError;

/// Normalized outcome of a failed optimize/health call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request never reached the optimizer or no response came back.
    #[error("cannot reach backend at {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("request to {url} timed out after {}s", after.as_secs())]
    Timeout { url: String, after: Duration },
    /// The optimizer answered with a non-success status.
    #[error("optimizer returned status {status}: {detail}")]
    Http { status: u16, detail: String },
    #[error("malformed optimizer response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    Http,
    MalformedResponse,
    /// A stage or the orchestrator reported `error` over the push channel.
    Application,
}

/// Why a session ended in `Error`, in user-presentable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl SessionFailure {
    pub fn application(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Application,
            detail: detail.into(),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self.kind, FailureKind::Network | FailureKind::Timeout)
    }

    /// "cannot reach backend" for connectivity failures, "optimization failed" otherwise.
    pub fn user_message(&self) -> String {
        if self.is_connectivity() {
            format!("Cannot reach backend: {}", self.detail)
        } else {
            format!("Optimization failed: {}", self.detail)
        }
    }
}

impl From<&RequestError> for SessionFailure {
    fn from(err: &RequestError) -> Self {
        match err {
            RequestError::Network { url, reason } => Self {
                kind: FailureKind::Network,
                detail: format!("{url} ({reason})"),
            },
            RequestError::Timeout { url, after } => Self {
                kind: FailureKind::Timeout,
                detail: format!("{url} did not respond within {}s", after.as_secs()),
            },
            RequestError::Http { detail, .. } => Self {
                kind: FailureKind::Http,
                detail: detail.clone(),
            },
            RequestError::MalformedResponse(reason) => Self {
                kind: FailureKind::MalformedResponse,
                detail: format!("malformed optimizer response: {reason}"),
            },
        }
    }
}
