//! Error types for pipeline operations
//!
//! Every stage error converts into [`PipelineError`]; the executor turns it
//! into a [`StageFailure`] record rather than returning it.

use std::path::PathBuf;
use thiserror::Error;

use super::stage::{PipelineStage, StageFailure};
use crate::extract::ParseError;
use crate::provision::ProvisioningError;
use crate::sink::{LoadError, TransferError};

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error (including missing inputs or credentials)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input could not be read
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Control-plane call failed
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Staging or upload failed
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Relational write failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// IO error with path context
    #[error("IO error with {path}: {message}")]
    IoErrorWithPath {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Invalid configuration file: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Create an IO error with path context
    pub fn io_with_path(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::IoErrorWithPath {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Short kind name, e.g. `FileNotFound` or `RowCountMismatch`
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ConfigError(_) => "ConfigError",
            PipelineError::Parse(e) => e.kind(),
            PipelineError::Provisioning(e) => e.kind(),
            PipelineError::Transfer(e) => e.kind(),
            PipelineError::Load(e) => e.kind(),
            PipelineError::IoErrorWithPath { .. } => "Io",
            PipelineError::JsonError(_) => "Json",
            PipelineError::TomlError(_) => "ConfigError",
        }
    }

    /// Failure record for a stage that ended with this error
    pub fn to_failure(&self, stage: PipelineStage) -> StageFailure {
        StageFailure {
            stage,
            kind: self.kind().to_string(),
            cause: self.to_string(),
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::ConfigError(msg) => {
                format!(
                    "Configuration error: {msg}\n\nHint: Check your pipeline configuration file."
                )
            }
            PipelineError::Parse(e) => e.user_message(),
            PipelineError::Provisioning(e) => e.user_message(),
            PipelineError::Transfer(e) => e.user_message(),
            PipelineError::Load(e) => e.user_message(),
            PipelineError::TomlError(e) => {
                format!("Invalid configuration file: {e}\n\nHint: Check the TOML syntax.")
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_kind_passes_through() {
        let err: PipelineError = ParseError::FileNotFound(PathBuf::from("data/source1.xml")).into();
        assert_eq!(err.kind(), "FileNotFound");

        let failure = err.to_failure(PipelineStage::ExtractXml);
        assert_eq!(failure.stage, PipelineStage::ExtractXml);
        assert_eq!(failure.kind, "FileNotFound");
        assert!(failure.cause.contains("data/source1.xml"));
    }

    #[test]
    fn test_load_error_failure() {
        let err: PipelineError = LoadError::Connection("refused".to_string()).into();
        assert_eq!(err.kind(), "Connection");
        assert!(err.user_message().contains("refused"));

        let failure = err.to_failure(PipelineStage::PersistRelational);
        assert_eq!(failure.stage, PipelineStage::PersistRelational);
        assert_eq!(failure.kind, "Connection");
        assert!(failure.cause.contains("refused"));
    }

    #[test]
    fn test_io_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = PipelineError::io_with_path("/out/run_record.json", "writing run record", io_err);
        let display = err.to_string();
        assert!(display.contains("/out/run_record.json"));
        assert!(display.contains("writing run record"));
    }

    #[test]
    fn test_user_message() {
        let err = PipelineError::ConfigError("missing input data/source2.json".to_string());
        let msg = err.user_message();
        assert!(msg.contains("source2.json"));
        assert!(msg.contains("Hint:"));
    }
}
