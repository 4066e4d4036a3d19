// Capkeeper Database Implementations
//
// This crate provides the durable key-value store the capability registry
// persists its index into. Two backends are provided:
// 1. Memory: An ordered in-memory database for testing and development
// 2. RocksDB: A persistent disk-based database for production use
//
// On top of any backend, `CacheDb` buffers the writes of one unit of work so
// they can be committed or dropped together, and `PrefixDb` gives a module its
// own key namespace.

use std::error::Error;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use capkeeper_error::StorageError;

mod iter;
pub use iter::SnapshotIterator;

/// Write buffering for one unit of work
pub mod cache;
pub use cache::CacheDb;

/// Key namespacing
pub mod prefix;
pub use prefix::PrefixDb;

/// Module containing the in-memory database implementation
#[cfg(feature = "memory")]
pub mod memory;

/// Module containing the RocksDB database implementation
#[cfg(feature = "rocks")]
pub mod rocks;

#[cfg(feature = "memory")]
pub use memory::MemoryDb;

#[cfg(feature = "rocks")]
pub use rocks::RocksDb;

/// Database error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// Error opening the database
    OpenError(String),
    /// Error reading from the database
    ReadError(String),
    /// Error writing to the database
    WriteError(String),
    /// Error deleting from the database
    DeleteError(String),
    /// Key not found
    NotFound,
    /// Generic database error
    GenericError(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenError(msg) => write!(f, "Database open error: {}", msg),
            Self::ReadError(msg) => write!(f, "Database read error: {}", msg),
            Self::WriteError(msg) => write!(f, "Database write error: {}", msg),
            Self::DeleteError(msg) => write!(f, "Database delete error: {}", msg),
            Self::NotFound => write!(f, "Key not found"),
            Self::GenericError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl Error for DbError {}

// Every database failure surfaces to the registry as a fatal storage error
impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::OpenError(msg) => StorageError::Unavailable(msg),
            DbError::ReadError(msg) => StorageError::Read(msg),
            DbError::WriteError(msg) | DbError::DeleteError(msg) => StorageError::Write(msg),
            DbError::NotFound => StorageError::Read("key not found".to_string()),
            DbError::GenericError(msg) => StorageError::Unavailable(msg),
        }
    }
}

/// Database configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Path to the database directory
    pub path: String,
    /// Whether to create the database if it doesn't exist
    pub create_if_missing: bool,
    /// Whether to create a read-only database
    pub read_only: bool,
}

impl DbConfig {
    /// Create a new database configuration
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            create_if_missing: true,
            read_only: false,
        }
    }

    /// Set whether to create the database if it doesn't exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set whether to create a read-only database
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Key-value batch operation type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Put a key-value pair
    Put(Vec<u8>, Vec<u8>),
    /// Delete a key
    Delete(Vec<u8>),
}

/// Database key iterator
///
/// Iterators yield entries in ascending key order.
pub trait DbIterator {
    /// Move to the next key
    fn next(&mut self) -> Option<Result<(Vec<u8>, Vec<u8>), DbError>>;

    /// Seek to the first key greater than or equal to `key`
    fn seek(&mut self, key: &[u8]) -> Result<(), DbError>;

    /// Seek to the first key
    fn seek_to_first(&mut self) -> Result<(), DbError>;

    /// Seek to the last key
    fn seek_to_last(&mut self) -> Result<(), DbError>;
}

/// Database interface
///
/// This trait defines the interface for an ordered key-value database. It
/// provides methods for basic CRUD operations, as well as batch operations and
/// iterators. All methods take `&self`; implementations synchronize internally.
pub trait Database: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError>;

    /// Put a key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DbError>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<(), DbError>;

    /// Check if a key exists
    fn contains(&self, key: &[u8]) -> Result<bool, DbError>;

    /// Execute a batch of operations atomically
    fn write_batch(&self, batch: &[BatchOp]) -> Result<(), DbError>;

    /// Create an iterator over the database
    fn iterator(&self) -> Result<Box<dyn DbIterator>, DbError>;

    /// Create an iterator over keys starting with `prefix`
    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Box<dyn DbIterator>, DbError>;

    /// Flush any pending writes to disk
    fn flush(&self) -> Result<(), DbError>;

    /// Close the database
    fn close(&self) -> Result<(), DbError>;
}

/// Backends that can be opened from a configuration
pub trait OpenDatabase: Database + Sized {
    /// Open a database with the given configuration
    fn open(config: DbConfig) -> Result<Self, DbError>;
}

/// Returns the smallest key greater than every key starting with `prefix`,
/// or `None` when no such key exists (empty or all-0xff prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Database factory for creating database instances
pub struct DbFactory;

impl DbFactory {
    /// Create an in-memory database (for testing)
    #[cfg(feature = "memory")]
    pub fn create_memory_db() -> Result<Arc<dyn Database>, DbError> {
        Ok(Arc::new(memory::MemoryDb::open(DbConfig::new("in_memory"))?))
    }

    /// Create a RocksDB database
    #[cfg(feature = "rocks")]
    pub fn create_rocksdb(config: DbConfig) -> Result<Arc<dyn Database>, DbError> {
        Ok(Arc::new(rocks::RocksDb::open(config)?))
    }

    /// Create a default database (depends on enabled features)
    pub fn create_default_db(_config: DbConfig) -> Result<Arc<dyn Database>, DbError> {
        #[cfg(feature = "rocks")]
        {
            Self::create_rocksdb(_config)
        }

        #[cfg(all(feature = "memory", not(feature = "rocks")))]
        {
            Self::create_memory_db()
        }

        #[cfg(not(any(feature = "memory", feature = "rocks")))]
        {
            Err(DbError::OpenError("No database implementation available".to_string()))
        }
    }
}
