//! Error types for sink operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while staging or uploading the normalized table
#[derive(Error, Debug)]
pub enum TransferError {
    /// Staging artifact could not be written
    #[error("Failed to write staging file {path}: {reason}")]
    StagingWrite { path: PathBuf, reason: String },

    /// Local file to upload does not exist
    #[error("Upload source not found: {0}")]
    SourceNotFound(PathBuf),

    /// Destination key is not usable
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Transfer to the object store failed
    #[error("Failed to upload {path} to {key}: {reason}")]
    Upload {
        path: PathBuf,
        key: String,
        reason: String,
    },
}

impl TransferError {
    /// Short kind name used in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::StagingWrite { .. } => "StagingWrite",
            TransferError::SourceNotFound(_) => "SourceNotFound",
            TransferError::InvalidKey { .. } => "InvalidKey",
            TransferError::Upload { .. } => "Upload",
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            TransferError::StagingWrite { path, reason } => {
                format!(
                    "Could not write staging file {}: {reason}\n\n\
                    Hint: Check that the output directory exists and is writable.",
                    path.display()
                )
            }
            TransferError::Upload { path, key, reason } => {
                format!(
                    "Upload of {} to '{key}' failed: {reason}\n\n\
                    Hint: Check credentials, bucket name and network connectivity.",
                    path.display()
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Errors that can occur while replacing the relational table
#[derive(Error, Debug)]
pub enum LoadError {
    /// Could not open a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement failed
    #[error("SQL error: {0}")]
    Sql(String),

    /// Table or column name unusable as an identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Two column names that the database treats as the same identifier
    #[error("Columns '{first}' and '{second}' differ only in case")]
    DuplicateColumn { first: String, second: String },

    /// Post-write verification found a different row count
    #[error("Row count mismatch in {table}: expected {expected}, found {found}")]
    RowCountMismatch {
        table: String,
        expected: u64,
        found: u64,
    },
}

impl LoadError {
    /// Short kind name used in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Connection(_) => "Connection",
            LoadError::Sql(_) => "Sql",
            LoadError::InvalidIdentifier(_) => "InvalidIdentifier",
            LoadError::DuplicateColumn { .. } => "DuplicateColumn",
            LoadError::RowCountMismatch { .. } => "RowCountMismatch",
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            LoadError::Connection(msg) => {
                format!(
                    "Could not connect to the database: {msg}\n\n\
                    Hint: Check the endpoint and that the password variable is set."
                )
            }
            LoadError::DuplicateColumn { first, second } => {
                format!(
                    "Columns '{first}' and '{second}' differ only in case, which the database \
                    does not distinguish.\n\n\
                    Hint: Add a rename rule so the inputs agree on one spelling."
                )
            }
            LoadError::RowCountMismatch {
                table,
                expected,
                found,
            } => {
                format!(
                    "Table '{table}' holds {found} rows after the load, expected {expected}.\n\n\
                    Hint: Another writer may be using the same table."
                )
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(feature = "duckdb-backend")]
impl From<duckdb::Error> for LoadError {
    fn from(err: duckdb::Error) -> Self {
        LoadError::Sql(err.to_string())
    }
}

#[cfg(feature = "postgres-backend")]
impl From<tokio_postgres::Error> for LoadError {
    fn from(err: tokio_postgres::Error) -> Self {
        LoadError::Sql(err.to_string())
    }
}
