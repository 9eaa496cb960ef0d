use crate::backends::BackendError;
use crate::models::Manifest;
use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    /// A backend could not be reached (connectivity, auth, missing location)
    #[error("Backend {backend} unavailable: {message}")]
    BackendUnavailable { backend: String, message: String },

    /// A backend exceeded its share of the search timeout
    #[error("Backend {backend} timed out after {after_ms}ms")]
    BackendTimeout { backend: String, after_ms: u64 },

    /// A record that could not be classified into a known file type
    #[error("Malformed record {path} from {backend}: {reason}")]
    MalformedRecord {
        backend: String,
        path: String,
        reason: String,
    },

    /// Every enabled backend failed
    #[error("No backends available ({})", summarize(.diagnostics))]
    NoBackendsAvailable { diagnostics: Manifest },

    /// Cache entry failed validation
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            EngineError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            EngineError::BackendTimeout { .. } => "BACKEND_TIMEOUT",
            EngineError::MalformedRecord { .. } => "MALFORMED_RECORD",
            EngineError::NoBackendsAvailable { .. } => "NO_BACKENDS_AVAILABLE",
            EngineError::CacheCorruption(_) => "CACHE_CORRUPTION",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Configuration(_) => "CONFIGURATION_ERROR",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error is confined to a single backend and can be absorbed
    /// into a degraded search
    pub fn is_backend_local(&self) -> bool {
        matches!(
            self,
            EngineError::BackendUnavailable { .. }
                | EngineError::BackendTimeout { .. }
                | EngineError::MalformedRecord { .. }
        )
    }
}

fn summarize(diagnostics: &Manifest) -> String {
    if diagnostics.is_empty() {
        return "no backends enabled".to_string();
    }

    diagnostics
        .iter()
        .map(|(id, report)| match &report.error {
            Some(err) => format!("{}: {} ({})", id, report.status, err),
            None => format!("{}: {}", id, report.status),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Conversion from connector-level errors
impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout { backend, after_ms } => {
                EngineError::BackendTimeout { backend, after_ms }
            }
            BackendError::Malformed {
                backend,
                path,
                reason,
            } => EngineError::MalformedRecord {
                backend,
                path,
                reason,
            },
            other => EngineError::BackendUnavailable {
                backend: other.backend().to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for EngineError {
    fn from(err: validator::ValidationErrors) -> Self {
        EngineError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;
