//! Error types for qrtrack.
//!
//! This module defines all error types used throughout the qrtrack crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for qrtrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The item file exists but does not hold a JSON array of items.
    #[error("item file {path} is corrupt: {source}")]
    StoreCorrupt {
        /// Path to the item file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to move a freshly written file into place.
    #[error("failed to replace {path}: {source}")]
    Persist {
        /// Destination path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Item Errors ===
    /// An item with this id is already stored.
    #[error("item {id} already exists")]
    DuplicateItem {
        /// The conflicting id.
        id: String,
    },

    /// The id is not a well-formed item identifier.
    #[error("invalid item id: {id}")]
    InvalidItemId {
        /// The rejected id.
        id: String,
    },

    /// Submitted item fields were rejected.
    #[error("{message}")]
    Validation {
        /// User-facing description of the problem.
        message: String,
    },

    // === Code Errors ===
    /// The payload could not be encoded as a QR code.
    #[error("failed to encode QR code: {0}")]
    CodeRender(#[from] qrcode::types::QrError),

    /// The rendered code image could not be written.
    #[error("failed to write code image {path}: {source}")]
    CodeImage {
        /// Destination path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: image::ImageError,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for qrtrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid item id error.
    #[must_use]
    pub fn invalid_item_id(id: impl Into<String>) -> Self {
        Self::InvalidItemId { id: id.into() }
    }

    /// Check if this error was caused by rejected user input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is an id collision.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateItem { .. })
    }
}
