//! Error types for worldstore
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Absence of a key is never an error: lookups return `Ok(None)`. Corrupt
//! bytes for a present key always surface as [`Error::Decode`].

use crate::types::InstanceId;
use std::io;
use thiserror::Error;

/// Result type alias for worldstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for worldstore
#[derive(Debug, Error)]
pub enum Error {
    /// No data type is registered for the requested value type
    #[error("No data type registered for {type_name}")]
    UnregisteredType {
        /// Rust type name or wire identifier that missed
        type_name: String,
    },

    /// Stored bytes could not be decoded
    #[error("Decode error{}: {source}", fmt_key(.key))]
    Decode {
        /// Storage key whose bytes were malformed, when known
        key: Option<String>,
        /// What went wrong
        #[source]
        source: DecodeError,
    },

    /// Backend I/O failure
    #[error("Storage I/O error during {operation}{}: {source}", fmt_key(.key))]
    StorageIo {
        /// Backend operation that failed (`open`, `get`, `set`, `delete`, `close`)
        operation: &'static str,
        /// Key involved, when the operation targets one
        key: Option<String>,
        /// Backend failure
        #[source]
        source: BackendError,
    },

    /// A shared instance was registered without an instance container
    #[error("Shared instance {shared} has no instance container assigned")]
    MissingContainer {
        /// The offending shared instance
        shared: InstanceId,
    },

    /// A shared instance was requested for a container that is not registered
    #[error("Instance container {container} is not registered")]
    UnregisteredContainer {
        /// The unregistered container
        container: InstanceId,
    },

    /// A container entry holds a different type than the caller asked for
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Identifier the caller asked for
        expected: String,
        /// Identifier stored in the entry
        found: String,
    },

    /// A length exceeds what the binary format can encode
    #[error("Length {len} exceeds the encodable maximum of {}", u32::MAX)]
    LengthOverflow {
        /// Length the caller tried to write
        len: usize,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

fn fmt_key(key: &Option<String>) -> String {
    match key {
        Some(k) => format!(" for key '{}'", k),
        None => String::new(),
    }
}

impl Error {
    /// Build an `UnregisteredType` error for a Rust type
    pub fn unregistered<T: ?Sized>() -> Self {
        Error::UnregisteredType {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }

    /// Build a storage I/O error
    pub fn storage_io(operation: &'static str, key: Option<&str>, source: BackendError) -> Self {
        Error::StorageIo {
            operation,
            key: key.map(str::to_string),
            source,
        }
    }

    /// Attach a key to a decode error that does not carry one yet
    pub fn with_key(self, key: &str) -> Self {
        match self {
            Error::Decode { key: None, source } => Error::Decode {
                key: Some(key.to_string()),
                source,
            },
            other => other,
        }
    }

    /// Whether this error reports malformed data
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }
}

impl From<DecodeError> for Error {
    fn from(source: DecodeError) -> Self {
        Error::Decode { key: None, source }
    }
}

/// Malformed byte input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before a value was complete
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes required by the read
        needed: usize,
        /// Bytes left in the input
        remaining: usize,
    },

    /// A variable-length integer ran past its maximum width
    #[error("Variable-length integer is too long")]
    VarIntTooLong,

    /// A string field was not valid UTF-8
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    /// An indexed entry names a type identifier nobody registered
    #[error("Unknown type identifier: {0}")]
    UnknownType(String),

    /// An indexed encoding contains the same entry name twice
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Bytes remained after the declared entries were decoded
    #[error("{0} trailing bytes after declared entries")]
    TrailingBytes(usize),

    /// Structurally invalid content
    #[error("Invalid data: {0}")]
    Invalid(String),
}

/// Failure reported by a storage backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// I/O error (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation issued before `open`
    #[error("Backend is not open")]
    NotOpen,

    /// Operation issued after `close`
    #[error("Backend is closed")]
    Closed,

    /// Backend-specific failure
    #[error("{0}")]
    Other(String),
}
