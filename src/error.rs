/// Error taxonomy shared by the library, the HTTP boundary, and the CLI.
///
/// Scanner-local failures are absorbed by the registry (logged, treated as an
/// empty contribution); vault failures always surface — silently returning
/// fewer detections would break the rehydration contract.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedactorError>;

#[derive(Debug, Error)]
pub enum RedactorError {
    /// Malformed request or unusable input; reported to the caller, no retry.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A single scanner raised. The registry logs this and keeps going with
    /// the other scanners.
    #[error("scanner '{scanner}' failed: {message}")]
    ScannerFailure { scanner: String, message: String },

    /// The persistent store cannot be read or written.
    #[error("vault unavailable: {0}")]
    VaultUnavailable(String),

    /// The NER model could not initialize; the process downgrades to
    /// regex-only detection for its lifetime.
    #[error("NER model failed to load: {0}")]
    ModelLoadFailure(String),

    /// Internal invariant violation, e.g. overlapping spans surviving
    /// resolution. Aborts the request.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Anything else: socket setup, signal handling, stdin I/O.
    #[error("{0}")]
    Internal(String),
}

impl RedactorError {
    /// Process exit code for the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            RedactorError::InvalidInput(_) => 2,
            RedactorError::VaultUnavailable(_) => 3,
            _ => 1,
        }
    }
}

impl From<rusqlite::Error> for RedactorError {
    fn from(err: rusqlite::Error) -> Self {
        RedactorError::VaultUnavailable(err.to_string())
    }
}

impl From<r2d2::Error> for RedactorError {
    fn from(err: r2d2::Error) -> Self {
        RedactorError::VaultUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for RedactorError {
    fn from(err: serde_json::Error) -> Self {
        RedactorError::InvalidInput(err.to_string())
    }
}
