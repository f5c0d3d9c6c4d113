//! Error types for tabula core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in tabula core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tabula_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] tabula_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The model's table directory does not exist.
    #[error("directory does not exist: {}", path.display())]
    TableNotFound {
        /// The table directory that was looked up.
        path: PathBuf,
    },

    /// No record is stored under the requested ID.
    #[error("resource does not exist: {model} #{id}")]
    ResourceNotFound {
        /// Model of the record.
        model: String,
        /// ID that was looked up.
        id: i64,
    },

    /// Record IDs start at 1.
    #[error("ID smaller than 1: {id}")]
    InvalidId {
        /// The rejected ID.
        id: i64,
    },

    /// A query produced no matching records.
    #[error("no matching where clauses for {model}")]
    NoMatch {
        /// Model that was queried.
        model: String,
    },

    /// A query was issued without any clauses.
    #[error("where clauses missing")]
    MissingClauses,

    /// The resource carries no ID field for the requested owner type.
    #[error("{model} has no {owner}ID field")]
    OwnerNotFound {
        /// Model of the owned resource.
        model: String,
        /// Short type name of the owner.
        owner: String,
    },

    /// The counter file holds something other than a decimal integer.
    #[error("counter corrupt at {}: {content:?}", path.display())]
    CounterCorrupt {
        /// Path of the counter file.
        path: PathBuf,
        /// What was read instead.
        content: String,
    },

    /// The configuration cannot be used to open a database.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with it.
        message: String,
    },

    /// A line of the index log could not be understood.
    #[error("index log corrupt at line {line_number}: {line:?}")]
    IndexLogCorruption {
        /// 1-based line number.
        line_number: usize,
        /// The offending line.
        line: String,
    },

    /// Encryption is not enabled.
    #[error("encryption feature not enabled")]
    EncryptionNotEnabled,

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Wrong key or tampered data.
    #[error("authentication/decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a resource not found error.
    pub fn resource_not_found(model: impl Into<String>, id: i64) -> Self {
        Self::ResourceNotFound {
            model: model.into(),
            id,
        }
    }

    /// Creates a no match error.
    pub fn no_match(model: impl Into<String>) -> Self {
        Self::NoMatch {
            model: model.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an index log corruption error.
    pub fn index_log_corruption(line_number: usize, line: impl Into<String>) -> Self {
        Self::IndexLogCorruption {
            line_number,
            line: line.into(),
        }
    }

    /// Creates an encryption not enabled error.
    pub fn encryption_not_enabled() -> Self {
        Self::EncryptionNotEnabled
    }

    /// Creates an encryption failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a decryption failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Returns true if the error means the requested record or table is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ResourceNotFound { .. } | Self::TableNotFound { .. }
        )
    }
}
