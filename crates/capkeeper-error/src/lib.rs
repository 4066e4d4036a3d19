// Capkeeper Error Handling Framework
// Central location for error types, traits, and handling utilities

use std::fmt;
use std::error::Error as StdError;

// Re-export for the macros
pub use thiserror;

// Module structure
mod macros;

// Domain modules
mod capability;
mod meter;
mod storage;

// Public exports
pub use capability::{CapabilityError, CapabilityResult};
pub use meter::{MeterError, MeterResult};
pub use storage::{StorageError, StorageResult};

/// Every error code namespace, re-exported per domain
pub mod codes {
    pub use crate::capability::codes as capability;
    pub use crate::meter::codes as meter;
    pub use crate::storage::codes as storage;
}

/// Error domains representing different components of the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorDomain {
    Capability,
    Storage,
    Meter,
}
impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDomain::Capability => write!(f, "capability"),
            ErrorDomain::Storage => write!(f, "storage"),
            ErrorDomain::Meter => write!(f, "meter"),
        }
    }
}

/// Error code structure for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ErrorCode(pub u32);
impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Standard error message format for serialization
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorMessage {
    pub code: ErrorCode,
    pub domain: ErrorDomain,
    pub message: String,
}

impl ErrorMessage {
    /// Capture any keeper error in its serializable form
    pub fn from_error<E: KeeperError + ?Sized>(err: &E) -> Self {
        Self {
            code: err.code(),
            domain: err.domain(),
            message: err.to_string(),
        }
    }
}

/// Base trait for all errors raised by the capability registry.
pub trait KeeperError: StdError + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Numeric code, unique within the error's domain.
    fn code(&self) -> ErrorCode;

    /// The component that raised the error.
    fn domain(&self) -> ErrorDomain;

    /// Fatal errors indicate a broken durable store; callers must not retry
    /// or continue processing the current unit of work.
    fn is_fatal(&self) -> bool { false }
}

/// Shorthand for a boxed KeeperError
pub type BoxError = Box<dyn KeeperError>;

/// Standard Result type using BoxError
pub type Result<T> = std::result::Result<T, BoxError>;
