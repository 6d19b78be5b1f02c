// Raster codec seam and the default JPEG implementation

use crate::{CompressError, OUTPUT_MEDIA_TYPE, Result, SourceImage};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType};
use std::sync::Arc;

/// Platform operations the compression engine suspends on
#[async_trait]
pub trait RasterCodec: Send + Sync {
    /// Decoded pixels, ready to be rendered or encoded
    type Surface: Send + Sync;

    /// Decode the source bytes into a surface
    async fn decode(&self, source: &SourceImage) -> Result<Self::Surface>;

    /// Pixel dimensions of a surface
    fn dimensions(&self, surface: &Self::Surface) -> (u32, u32);

    /// Draw the surface into a new one of the given size
    async fn render(&self, surface: &Self::Surface, width: u32, height: u32)
        -> Result<Self::Surface>;

    /// Encode one frame at `quality` in (0, 1]
    async fn encode(&self, surface: &Self::Surface, quality: f32) -> Result<Vec<u8>>;

    /// Media type produced by `encode`
    fn media_type(&self) -> &'static str {
        OUTPUT_MEDIA_TYPE
    }
}

/// Decodes any format the `image` crate understands and encodes baseline JPEG
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    filter: FilterType,
}

impl JpegCodec {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    /// Use a different resampling filter when rendering
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a (0, 1] quality factor onto the JPEG 1..=100 scale
pub(crate) fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

#[async_trait]
impl RasterCodec for JpegCodec {
    type Surface = Arc<DynamicImage>;

    async fn decode(&self, source: &SourceImage) -> Result<Self::Surface> {
        let data = source.shared_data();
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&data))
            .await
            .map_err(|e| CompressError::Decode(e.to_string()))?
            .map_err(|e| CompressError::Decode(e.to_string()))?;

        Ok(Arc::new(decoded))
    }

    fn dimensions(&self, surface: &Self::Surface) -> (u32, u32) {
        (surface.width(), surface.height())
    }

    async fn render(
        &self,
        surface: &Self::Surface,
        width: u32,
        height: u32,
    ) -> Result<Self::Surface> {
        if width == 0 || height == 0 {
            return Err(CompressError::Surface(format!(
                "invalid surface size {}x{}",
                width, height
            )));
        }

        if (surface.width(), surface.height()) == (width, height) {
            return Ok(Arc::clone(surface));
        }

        let surface = Arc::clone(surface);
        let filter = self.filter;
        let resized =
            tokio::task::spawn_blocking(move || surface.resize_exact(width, height, filter))
                .await
                .map_err(|e| CompressError::Surface(e.to_string()))?;

        Ok(Arc::new(resized))
    }

    async fn encode(&self, surface: &Self::Surface, quality: f32) -> Result<Vec<u8>> {
        let surface = Arc::clone(surface);
        let quality = jpeg_quality(quality);

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            // JPEG has no alpha channel
            let rgb = surface.to_rgb8();
            let mut buf = Vec::new();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .map_err(|e| CompressError::Encode(e.to_string()))?;
            Ok(buf)
        })
        .await
        .map_err(|e| CompressError::Encode(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_fixture(width: u32, height: u32) -> SourceImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)) as u8;
            Rgb([v, v.wrapping_add(64), (x + y) as u8])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .expect("png fixture");
        SourceImage::new(buf.into_inner(), "image/png", "fixture.png")
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(0.8), 80);
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(0.001), 1);
        assert_eq!(jpeg_quality(0.094), 9);
    }

    #[tokio::test]
    async fn test_decode_render_encode() {
        let codec = JpegCodec::new();
        let source = png_fixture(64, 48);

        let surface = codec.decode(&source).await.unwrap();
        assert_eq!(codec.dimensions(&surface), (64, 48));

        let smaller = codec.render(&surface, 32, 24).await.unwrap();
        assert_eq!(codec.dimensions(&smaller), (32, 24));

        let bytes = codec.encode(&smaller, 0.5).await.unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[tokio::test]
    async fn test_decode_rejects_garbage() {
        let codec = JpegCodec::new();
        let source = SourceImage::new(vec![1u8, 2, 3, 4], "image/jpeg", "broken.jpg");
        assert!(matches!(
            codec.decode(&source).await,
            Err(CompressError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_render_rejects_zero_size() {
        let codec = JpegCodec::new();
        let surface = codec.decode(&png_fixture(8, 8)).await.unwrap();
        assert!(matches!(
            codec.render(&surface, 0, 8).await,
            Err(CompressError::Surface(_))
        ));
    }
}
