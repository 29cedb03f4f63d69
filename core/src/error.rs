use thiserror::Error;

/// Freighter error types
#[derive(Error, Debug)]
pub enum FreighterError {
    /// Malformed artifact reference
    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// Missing reference or digest
    #[error("Not found: {0}")]
    NotFound(String),

    /// Content does not hash to the digest it claims
    #[error("Digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Copy aborted before every referenced blob reached the destination
    #[error("Partial transfer of {reference}: blob {digest} failed: {message}")]
    PartialTransfer {
        reference: String,
        digest: String,
        message: String,
    },

    /// Mapper cannot classify content
    #[error("Unsupported content kind: {0}")]
    UnsupportedKind(String),

    /// Destination path escapes the extraction root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Verification failed because the transparency log could not be consulted
    #[error("Transparency log unavailable: {0}")]
    TransparencyLogUnavailable(String),

    /// Signature verification failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Operation observed caller cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Retry orchestrator gave up
    #[error("operation unsuccessful after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last_error: Box<FreighterError>,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`FreighterError`].
///
/// Callers use this to decide whether an operation is worth handing to the
/// retry orchestrator at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidReference,
    NotFound,
    DigestMismatch,
    PartialTransfer,
    UnsupportedKind,
    InvalidPath,
    Io,
    TransparencyLogUnavailable,
    Verification,
    Registry,
    Serialization,
    Config,
    Cancelled,
    RetryExhausted,
    Other,
}

impl FreighterError {
    /// Build an `InvalidReference` error.
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        FreighterError::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FreighterError::InvalidReference { .. } => ErrorKind::InvalidReference,
            FreighterError::NotFound(_) => ErrorKind::NotFound,
            FreighterError::DigestMismatch { .. } => ErrorKind::DigestMismatch,
            FreighterError::PartialTransfer { .. } => ErrorKind::PartialTransfer,
            FreighterError::UnsupportedKind(_) => ErrorKind::UnsupportedKind,
            FreighterError::InvalidPath(_) => ErrorKind::InvalidPath,
            FreighterError::IoError(_) => ErrorKind::Io,
            FreighterError::TransparencyLogUnavailable(_) => {
                ErrorKind::TransparencyLogUnavailable
            }
            FreighterError::Verification(_) => ErrorKind::Verification,
            FreighterError::RegistryError { .. } => ErrorKind::Registry,
            FreighterError::SerializationError(_) => ErrorKind::Serialization,
            FreighterError::ConfigError(_) => ErrorKind::Config,
            FreighterError::Cancelled => ErrorKind::Cancelled,
            FreighterError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            FreighterError::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether repeating the failed operation could plausibly succeed.
    ///
    /// Malformed input, integrity violations and unclassifiable content never
    /// heal on their own. Consulted by `Retry::run_retryable`.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::InvalidReference
                | ErrorKind::DigestMismatch
                | ErrorKind::UnsupportedKind
                | ErrorKind::InvalidPath
                | ErrorKind::Config
                | ErrorKind::Cancelled
        )
    }
}

impl From<serde_json::Error> for FreighterError {
    fn from(err: serde_json::Error) -> Self {
        FreighterError::SerializationError(err.to_string())
    }
}

/// Result type alias for Freighter operations
pub type Result<T> = std::result::Result<T, FreighterError>;
