//! Error types for provisioning

use thiserror::Error;

/// Errors from control-plane calls
///
/// "Already exists" is never an error: it is reported as
/// [`EnsureOutcome::AlreadyExists`](super::EnsureOutcome::AlreadyExists).
#[derive(Error, Debug)]
pub enum ProvisioningError {
    /// A control-plane request was rejected or could not be sent
    #[error("Failed to ensure {resource} '{name}': {reason}")]
    Request {
        resource: &'static str,
        name: String,
        reason: String,
    },

    /// A resource did not become ready in time
    #[error("{resource} '{name}' not ready after {attempts} checks")]
    Timeout {
        resource: &'static str,
        name: String,
        attempts: u32,
    },

    /// A response lacked a field the pipeline needs
    #[error("{resource} '{name}' has no {field}")]
    MissingField {
        resource: &'static str,
        name: String,
        field: &'static str,
    },

    /// Invalid infrastructure settings
    #[error("Invalid infrastructure configuration: {0}")]
    InvalidConfig(String),
}

impl ProvisioningError {
    /// Short kind name used in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisioningError::Request { .. } => "Request",
            ProvisioningError::Timeout { .. } => "Timeout",
            ProvisioningError::MissingField { .. } => "MissingField",
            ProvisioningError::InvalidConfig(_) => "InvalidConfig",
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ProvisioningError::Request { .. } => {
                format!(
                    "{self}\n\nHint: Check AWS credentials and that the account may create this resource."
                )
            }
            ProvisioningError::Timeout { .. } => {
                format!(
                    "{self}\n\nHint: Increase 'instance_max_attempts' or re-run once the instance is available."
                )
            }
            _ => self.to_string(),
        }
    }

    pub(crate) fn request(
        resource: &'static str,
        name: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        ProvisioningError::Request {
            resource,
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
