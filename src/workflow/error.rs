// Error types for the generation workflow

use genapi::FailureKind;
use serde::Serialize;
use thiserror::Error;

/// Shown when the service fails without saying why
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate images. Please try again.";

/// Everything the workflow surfaces as its current error
///
/// `Display` is the message meant for the person using the app.
#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowError {
    #[error("HEIC/HEIF photos are not supported. Please upload a JPEG, PNG or WebP image.")]
    UnsupportedFormat { file_name: String },

    #[error("Could not prepare the photo for upload: {reason}")]
    CompressionFailure { reason: String },

    #[error("{message}")]
    GenerationFailure { failure: FailureKind, message: String },

    #[error("{}", GENERIC_FAILURE_MESSAGE)]
    EmptyResult,

    #[error("{message}")]
    InvalidInput { message: String },
}

impl WorkflowError {
    pub fn compression(err: &imgfit::CompressError) -> Self {
        Self::CompressionFailure {
            reason: err.to_string(),
        }
    }

    pub fn from_service(err: &genapi::ServiceError) -> Self {
        Self::GenerationFailure {
            failure: err.kind(),
            message: err.user_message(),
        }
    }

    /// A response that arrived with `success: false`
    pub fn rejected(message: Option<String>) -> Self {
        Self::GenerationFailure {
            failure: FailureKind::Rejected,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
        }
    }
}
