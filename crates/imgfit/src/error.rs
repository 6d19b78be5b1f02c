// Error types for imgfit

use thiserror::Error;

/// Result type for imgfit operations
pub type Result<T> = std::result::Result<T, CompressError>;

/// Errors that abort a compression call
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Source image is empty")]
    EmptySource,

    #[error("Failed to decode source image: {0}")]
    Decode(String),

    #[error("Failed to create raster surface: {0}")]
    Surface(String),

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}
