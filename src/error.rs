//! Error types for client operations.
//!
//! Every command-executing operation classifies its outcome into one of the
//! variants below before returning. Variants raised from a decoded response
//! carry the server's error stack when one was present in the envelope.

/// Main error type for client operations.
///
/// The first five variants form the closed taxonomy used for protocol and
/// command outcomes; [`Error::Transport`] wraps failures raised by the
/// [`Transport`](crate::transport::Transport) collaborator unmodified.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller violated a precondition (missing credential, operation
    /// unsupported for this identity kind, resource not persisted, ambiguous
    /// default selection).
    #[error("usage error: {message}")]
    Usage {
        message: String,
        stack: Option<Vec<String>>,
    },

    /// The response envelope does not conform to the documented shape.
    #[error("parse error: {message}")]
    Parse {
        message: String,
        stack: Option<Vec<String>>,
    },

    /// A lookup command returned a "not found" status.
    #[error("not found: {message}")]
    NotFound {
        message: String,
        stack: Option<Vec<String>>,
    },

    /// Logon or logoff against the identity endpoint failed.
    #[error("logon failed: {message}")]
    LogonFailed {
        message: String,
        stack: Option<Vec<String>>,
    },

    /// Any other command returned a non-success status.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        stack: Option<Vec<String>>,
    },

    /// Network or server-protocol failure raised by the transport
    /// collaborator, surfaced unmodified.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            stack: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            stack: None,
        }
    }

    /// Create a not-found error carrying the remote error stack, if any.
    pub fn not_found(message: impl Into<String>, stack: Option<Vec<String>>) -> Self {
        Self::NotFound {
            message: message.into(),
            stack,
        }
    }

    /// Create a logon-failed error carrying the remote error stack, if any.
    pub fn logon_failed(message: impl Into<String>, stack: Option<Vec<String>>) -> Self {
        Self::LogonFailed {
            message: message.into(),
            stack,
        }
    }

    /// Create an operation-failed error carrying the remote error stack, if any.
    pub fn operation_failed(message: impl Into<String>, stack: Option<Vec<String>>) -> Self {
        Self::OperationFailed {
            message: message.into(),
            stack,
        }
    }

    /// Wrap a transport-level failure.
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(error))
    }

    /// The remote error stack attached to this error, if any.
    pub fn error_stack(&self) -> Option<&[String]> {
        match self {
            Self::Usage { stack, .. }
            | Self::Parse { stack, .. }
            | Self::NotFound { stack, .. }
            | Self::LogonFailed { stack, .. }
            | Self::OperationFailed { stack, .. } => stack.as_deref(),
            Self::Transport(_) => None,
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
