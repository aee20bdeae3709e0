use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends and the persistence gateway.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed to do its I/O.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What the backend was doing.
        message: String,
        /// Underlying backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The gateway answered a request with an error status.
    #[error("storage rejected the request: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },
    /// The gateway worker is gone, so no request can be served.
    #[error("persistence gateway closed")]
    GatewayClosed,
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
