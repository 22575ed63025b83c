//! Error types for CrossCheck.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Event errors
    #[error("Unrecognized event kind: {0}")]
    UnrecognizedEvent(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    // Workflow errors
    #[error("Invalid workflow definition: {0}")]
    InvalidWorkflow(String),

    #[error("Workflow validation failed: {0}")]
    WorkflowValidation(String),

    // Run errors
    #[error("Run cancelled")]
    RunCancelled,

    // Job errors
    #[error("Environment provisioning failed: {0}")]
    Provisioning(String),

    // Step errors
    #[error("Step failed with exit code {exit_code}: {message}")]
    StepFailed { exit_code: i32, message: String },

    #[error("Step timed out after {seconds} seconds")]
    StepTimeout { seconds: u64 },

    // Capability errors
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Capability invocation failed: {0}")]
    CapabilityFailed(String),

    // Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Reporting errors
    #[error("Status report failed: {0}")]
    Report(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
