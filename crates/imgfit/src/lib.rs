// imgfit - byte-budget image compression
// Re-encodes a photo as JPEG until it fits under a target size

mod codec;
mod engine;

pub mod error;

pub use codec::{JpegCodec, RasterCodec};
pub use engine::{
    CompressionTarget, compress, QUALITY_CEILING, QUALITY_FLOOR, QUALITY_STEP,
    RESIZE_BELOW_RATIO, SEED_QUALITY_GAIN,
};
pub use error::{CompressError, Result};

use std::sync::Arc;

/// Media type of everything the engine produces
pub const OUTPUT_MEDIA_TYPE: &str = "image/jpeg";

/// A user-selected photo, held as raw encoded bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    data: Arc<[u8]>,
    media_type: String,
    file_name: String,
}

impl SourceImage {
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        media_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes, for moving into blocking tasks
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Output of a compression call
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    /// Encoded bytes
    pub data: Arc<[u8]>,

    /// Encoding of `data`
    pub media_type: String,

    /// File name carried over from the source
    pub file_name: String,

    /// Number of encode passes performed
    pub passes: usize,

    /// Quality of the last pass (1.0 when the source was returned unchanged)
    pub quality: f32,

    /// Linear scale applied to both dimensions
    pub scale: f32,
}

impl CompressedImage {
    /// Wrap a source that needs no re-encoding
    pub fn unchanged(source: &SourceImage) -> Self {
        Self {
            data: source.shared_data(),
            media_type: source.media_type().to_string(),
            file_name: source.file_name().to_string(),
            passes: 0,
            quality: 1.0,
            scale: 1.0,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// View the result as a source, e.g. to compress it again
    pub fn to_source(&self) -> SourceImage {
        SourceImage {
            data: Arc::clone(&self.data),
            media_type: self.media_type.clone(),
            file_name: self.file_name.clone(),
        }
    }
}
