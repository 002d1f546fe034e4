//! Error types for scan operations

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The trial-decryption primitive could not be loaded by a worker
    #[error("Worker {worker} failed to load decryptor: {message}")]
    WorkerLoadFailure {
        /// Failing worker index
        worker: usize,
        /// Loader error
        message: String,
    },

    /// The primitive failed or panicked while a worker was scanning
    #[error("Worker {worker} failed: {message}")]
    WorkerRuntimeFailure {
        /// Failing worker index
        worker: usize,
        /// Primitive error or panic message
        message: String,
    },

    /// A worker message did not fit the protocol
    #[error("Invalid worker message: {0}")]
    InvalidMessage(String),

    /// Pool construction or channel failure
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Viewing key could not be parsed
    #[error("Invalid viewing key: {0}")]
    InvalidViewingKey(String),

    /// Trial or full decryption failed
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Raw transaction input error
    #[error("Decode error: {0}")]
    Decode(#[from] cipherscan_core::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Index of the worker that produced the error, if any
    pub fn worker_index(&self) -> Option<usize> {
        match self {
            Error::WorkerLoadFailure { worker, .. } | Error::WorkerRuntimeFailure { worker, .. } => {
                Some(*worker)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_index() {
        let err = Error::WorkerRuntimeFailure {
            worker: 3,
            message: "boom".into(),
        };
        assert_eq!(err.worker_index(), Some(3));
        assert_eq!(err.to_string(), "Worker 3 failed: boom");
        assert_eq!(Error::WorkerPool("x".into()).worker_index(), None);
    }
}
