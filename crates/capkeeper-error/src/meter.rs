// Resource metering error types

use thiserror::Error;
use crate::{ErrorCode, ErrorDomain, KeeperError};

/// Meter error codes
pub mod codes {
    use crate::ErrorCode;

    // Meter error codes start with 3000
    pub const OUT_OF_GAS: ErrorCode = ErrorCode(3001);
    pub const OVERFLOW: ErrorCode = ErrorCode(3002);
}

/// Errors raised while charging a resource meter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeterError {
    /// Charging would exceed the meter's limit
    #[error("out of gas in location: {descriptor}; consumed: {consumed}, limit: {limit}")]
    OutOfGas { descriptor: String, consumed: u64, limit: u64 },

    /// The consumed counter would wrap
    #[error("gas overflow in location: {0}")]
    Overflow(String),
}

impl KeeperError for MeterError {
    fn code(&self) -> ErrorCode {
        match self {
            MeterError::OutOfGas { .. } => codes::OUT_OF_GAS,
            MeterError::Overflow(_) => codes::OVERFLOW,
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Meter
    }
}

/// Convenient Result type for metering
pub type MeterResult<T> = Result<T, MeterError>;
