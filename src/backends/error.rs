//! Error types for backend connectors

/// Result type for connector operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors a connector or its client can report
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// Connectivity failure reaching the backend
    #[error("{backend}: unavailable: {message}")]
    Unavailable { backend: String, message: String },

    /// Credentials rejected or insufficient permissions
    #[error("{backend}: access denied: {message}")]
    AccessDenied { backend: String, message: String },

    /// Bucket, store or location does not exist
    #[error("{backend}: not found: {location}")]
    NotFound { backend: String, location: String },

    /// Call exceeded its deadline
    #[error("{backend}: timed out after {after_ms}ms")]
    Timeout { backend: String, after_ms: u64 },

    /// Backend returned something that cannot be turned into a record
    #[error("{backend}: malformed record {path}: {reason}")]
    Malformed {
        backend: String,
        path: String,
        reason: String,
    },

    /// Tag batch larger than the connector accepts
    #[error("{backend}: tag batch of {requested} exceeds limit of {max}")]
    BatchTooLarge {
        backend: String,
        requested: usize,
        max: usize,
    },
}

impl BackendError {
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Unavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Backend the error originated from
    pub fn backend(&self) -> &str {
        match self {
            BackendError::Unavailable { backend, .. }
            | BackendError::AccessDenied { backend, .. }
            | BackendError::NotFound { backend, .. }
            | BackendError::Timeout { backend, .. }
            | BackendError::Malformed { backend, .. }
            | BackendError::BatchTooLarge { backend, .. } => backend,
        }
    }

    /// Map a filesystem error onto the connector taxonomy
    pub fn from_io(backend: impl Into<String>, location: &str, err: &std::io::Error) -> Self {
        let backend = backend.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => BackendError::NotFound {
                backend,
                location: location.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => BackendError::AccessDenied {
                backend,
                message: format!("{location}: {err}"),
            },
            _ => BackendError::Unavailable {
                backend,
                message: format!("{location}: {err}"),
            },
        }
    }
}
