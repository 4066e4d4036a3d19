// Capability registry error types
// Raised by the keeper, its scoped views and genesis handling

use thiserror::Error;
use crate::{ErrorCode, ErrorDomain, KeeperError, MeterError, StorageError};

/// Capability error codes
pub mod codes {
    use crate::ErrorCode;

    // Capability error codes start with 1000
    pub const ALREADY_EXISTS: ErrorCode = ErrorCode(1001);
    pub const NOT_FOUND: ErrorCode = ErrorCode(1002);
    pub const NOT_OWNER: ErrorCode = ErrorCode(1003);
    pub const OWNER_ALREADY_EXISTS: ErrorCode = ErrorCode(1004);
    pub const INVALID_NAME: ErrorCode = ErrorCode(1005);
    pub const INVALID_INDEX: ErrorCode = ErrorCode(1006);
    pub const SEALED: ErrorCode = ErrorCode(1007);
    pub const MODULE_ALREADY_SCOPED: ErrorCode = ErrorCode(1008);
    pub const INVALID_GENESIS: ErrorCode = ErrorCode(1009);
}

/// Errors returned by capability registry operations
///
/// All variants except [`CapabilityError::Storage`] are local and recoverable:
/// the registry state is unchanged when they are returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// A capability with this name is already registered for the owner
    #[error("capability already exists: {owner}/{name}")]
    AlreadyExists { owner: String, name: String },

    /// Unknown index, handle or name
    #[error("capability not found: {0}")]
    NotFound(String),

    /// Release or lookup attempted by a module that does not own the name
    #[error("capability not owned by {owner}: {name}")]
    NotOwner { owner: String, name: String },

    /// The claiming owner already holds a capability under this name
    #[error("owner already exists: {owner}/{name}")]
    OwnerAlreadyExists { owner: String, name: String },

    /// Empty or whitespace-only module or capability name
    #[error("invalid capability name: {0:?}")]
    InvalidName(String),

    /// An index that cannot be set in the current state
    #[error("invalid capability index: {0}")]
    InvalidIndex(String),

    /// The keeper no longer accepts new scoped modules
    #[error("capability keeper is sealed")]
    Sealed,

    /// A scoped keeper already exists for this module
    #[error("module already scoped: {0}")]
    ModuleAlreadyScoped(String),

    /// Genesis state failed validation
    #[error("invalid genesis state: {0}")]
    InvalidGenesis(String),

    /// The durable store failed underneath the registry
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Metered store access exceeded the caller's limit
    #[error(transparent)]
    Meter(#[from] MeterError),
}

impl KeeperError for CapabilityError {
    fn code(&self) -> ErrorCode {
        use codes::*;
        match self {
            CapabilityError::AlreadyExists { .. } => ALREADY_EXISTS,
            CapabilityError::NotFound(_) => NOT_FOUND,
            CapabilityError::NotOwner { .. } => NOT_OWNER,
            CapabilityError::OwnerAlreadyExists { .. } => OWNER_ALREADY_EXISTS,
            CapabilityError::InvalidName(_) => INVALID_NAME,
            CapabilityError::InvalidIndex(_) => INVALID_INDEX,
            CapabilityError::Sealed => SEALED,
            CapabilityError::ModuleAlreadyScoped(_) => MODULE_ALREADY_SCOPED,
            CapabilityError::InvalidGenesis(_) => INVALID_GENESIS,
            CapabilityError::Storage(err) => err.code(),
            CapabilityError::Meter(err) => err.code(),
        }
    }

    fn domain(&self) -> ErrorDomain {
        match self {
            CapabilityError::Storage(err) => err.domain(),
            CapabilityError::Meter(err) => err.domain(),
            _ => ErrorDomain::Capability,
        }
    }

    fn is_fatal(&self) -> bool {
        match self {
            CapabilityError::Storage(err) => err.is_fatal(),
            _ => false,
        }
    }
}

/// Convenient Result type for capability operations
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Convert from capability error to boxed error
impl From<CapabilityError> for Box<dyn KeeperError> {
    fn from(err: CapabilityError) -> Self {
        Box::new(err)
    }
}

impl CapabilityError {
    /// Create a new already exists error
    pub fn already_exists(owner: impl Into<String>, name: impl Into<String>) -> Self {
        CapabilityError::AlreadyExists { owner: owner.into(), name: name.into() }
    }

    /// Create a new not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        CapabilityError::NotFound(what.into())
    }

    /// Create a new not owner error
    pub fn not_owner(owner: impl Into<String>, name: impl Into<String>) -> Self {
        CapabilityError::NotOwner { owner: owner.into(), name: name.into() }
    }

    /// Create a new owner already exists error
    pub fn owner_already_exists(owner: impl Into<String>, name: impl Into<String>) -> Self {
        CapabilityError::OwnerAlreadyExists { owner: owner.into(), name: name.into() }
    }

    pub fn invalid_genesis(reason: impl Into<String>) -> Self {
        CapabilityError::InvalidGenesis(reason.into())
    }
}
