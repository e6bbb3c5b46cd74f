//! Error types for weft
//!
//! Every failure surfaced by pod synthesis falls into one of two kinds:
//! - bad-request: the template is wrong (undeclared volume, artifact without a
//!   path). Not retried; the author has to fix the workflow.
//! - internal: an upstream contract was violated or the control plane failed.
//!   The reconciliation loop decides whether to retry the whole pass.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Classification of an [`Error`] for callers deciding how to react
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The template or workflow is misconfigured
    BadRequest,
    /// Contract violation or infrastructure failure
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest => write!(f, "BadRequest"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Main error type for weft operations
#[derive(Debug, Error)]
pub enum Error {
    /// The template references something that doesn't exist or is incomplete
    #[error("bad request: {message}")]
    BadRequest {
        /// Description of what's wrong
        message: String,
        /// Template field path (e.g., "inputs.artifacts.CODE")
        field: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "compile", "submit")
        context: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },
}

impl Error {
    /// Create a bad-request error with the given message
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a bad-request error pointing at a template field
    pub fn bad_request_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::BadRequest {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Classify this error
    ///
    /// Serialization and Kubernetes failures are internal: neither can be
    /// fixed by editing the template.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadRequest { .. } => ErrorKind::BadRequest,
            Error::Internal { .. } | Error::Serialization { .. } | Error::Kube { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Check if this error is retryable
    ///
    /// Bad requests never succeed on retry. Everything else may.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    /// Get the template field path if this error points at one
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::BadRequest { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::serialization(e.to_string())
    }
}
