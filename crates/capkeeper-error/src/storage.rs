// Storage error types
// Failures of the durable store underneath the registry

use thiserror::Error;
use crate::{ErrorCode, ErrorDomain, KeeperError};

/// Storage error codes
pub mod codes {
    use crate::ErrorCode;

    // Storage error codes start with 2000
    pub const READ_FAILED: ErrorCode = ErrorCode(2001);
    pub const WRITE_FAILED: ErrorCode = ErrorCode(2002);
    pub const CORRUPTION: ErrorCode = ErrorCode(2003);
    pub const CODEC: ErrorCode = ErrorCode(2004);
    pub const UNAVAILABLE: ErrorCode = ErrorCode(2005);
}

/// Durable store failures
///
/// The durable store guarantees its own consistency through the enclosing
/// transaction, so every storage error is fatal to the current unit of work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),

    #[error("storage write failed: {0}")]
    Write(String),

    /// A stored record does not match the layout the registry writes
    #[error("storage corruption: {0}")]
    Corruption(String),

    #[error("storage codec error: {0}")]
    Codec(String),

    /// Store could not be opened or has been closed
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl KeeperError for StorageError {
    fn code(&self) -> ErrorCode {
        use codes::*;
        match self {
            StorageError::Read(_) => READ_FAILED,
            StorageError::Write(_) => WRITE_FAILED,
            StorageError::Corruption(_) => CORRUPTION,
            StorageError::Codec(_) => CODEC,
            StorageError::Unavailable(_) => UNAVAILABLE,
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Storage
    }

    fn is_fatal(&self) -> bool {
        true
    }
}

/// Convenient Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for Box<dyn KeeperError> {
    fn from(err: StorageError) -> Self {
        Box::new(err)
    }
}
