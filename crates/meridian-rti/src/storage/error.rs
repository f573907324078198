//! Save store error types.
//!
//! - `NotFound`: no snapshot stored under the label
//! - `Serialization`: snapshot failed to encode or decode
//! - `Io`: underlying store failure

use thiserror::Error;

/// Errors that can occur during save store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No snapshot under this label
    #[error("snapshot not found: federation {federation}, label {label}")]
    NotFound {
        /// Federation execution name
        federation: String,
        /// Save label
        label: String,
    },

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

impl<E: std::fmt::Debug> From<ciborium::ser::Error<E>> for StorageError {
    fn from(err: ciborium::ser::Error<E>) -> Self {
        StorageError::Serialization(format!("{err:?}"))
    }
}

impl<E: std::fmt::Debug> From<ciborium::de::Error<E>> for StorageError {
    fn from(err: ciborium::de::Error<E>) -> Self {
        StorageError::Serialization(format!("{err:?}"))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
