// Budget-driven compression search
//
// Seeds quality and scale from the ratio between the budget and the source
// size, renders once at the seeded scale, then lowers quality geometrically
// until the encoded frame fits or quality reaches the floor.

use crate::{CompressError, CompressedImage, RasterCodec, Result, SourceImage};
use tracing::{debug, info, warn};

/// Highest quality the search ever starts from
pub const QUALITY_CEILING: f32 = 0.8;

/// The search stops once quality is at or below this value
pub const QUALITY_FLOOR: f32 = 0.1;

/// Multiplier applied to quality after every oversized pass
pub const QUALITY_STEP: f32 = 0.7;

/// Initial quality is `ratio * SEED_QUALITY_GAIN`, capped at the ceiling
pub const SEED_QUALITY_GAIN: f32 = 1.5;

/// Below this budget/source ratio pixel dimensions shrink as well
pub const RESIZE_BELOW_RATIO: f64 = 0.5;

/// Parameters of a single encode pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionTarget {
    /// Encoder quality in (0, 1]
    pub quality: f32,

    /// Linear scale applied to width and height, in (0, 1]
    pub scale: f32,
}

impl CompressionTarget {
    /// Initial parameters for squeezing `source_bytes` into `target_bytes`
    ///
    /// Encoded size grows roughly linearly with quality and with the square
    /// of the linear scale, so small ratios shrink both.
    pub fn seed(source_bytes: usize, target_bytes: usize) -> Self {
        let ratio = target_bytes as f64 / source_bytes.max(1) as f64;
        let quality = ((ratio * SEED_QUALITY_GAIN as f64) as f32).min(QUALITY_CEILING);
        let scale = if ratio < RESIZE_BELOW_RATIO {
            (ratio * 2.0).sqrt() as f32
        } else {
            1.0
        };

        Self { quality, scale }
    }

    /// Parameters for the following pass, or `None` once quality is spent
    pub fn next(self) -> Option<Self> {
        if self.quality <= QUALITY_FLOOR {
            return None;
        }
        Some(Self {
            quality: self.quality * QUALITY_STEP,
            scale: self.scale,
        })
    }

    /// Scaled pixel dimensions, never below one pixel
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.scale as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        (w, h)
    }
}

/// Re-encode `source` so that it fits in `target_bytes` where possible
///
/// Output may still exceed the budget when quality hits the floor first.
pub async fn compress<C>(
    codec: &C,
    source: &SourceImage,
    target_bytes: usize,
) -> Result<CompressedImage>
where
    C: RasterCodec + ?Sized,
{
    if source.is_empty() {
        return Err(CompressError::EmptySource);
    }

    let surface = codec.decode(source).await?;
    let (width, height) = codec.dimensions(&surface);

    let mut target = CompressionTarget::seed(source.byte_len(), target_bytes);
    let (scaled_w, scaled_h) = target.scaled_dimensions(width, height);

    debug!(
        source_bytes = source.byte_len(),
        target_bytes,
        width,
        height,
        scaled_w,
        scaled_h,
        quality = target.quality,
        "Seeded compression search"
    );

    let frame = codec.render(&surface, scaled_w, scaled_h).await?;

    let mut passes = 0;
    let encoded = loop {
        let bytes = codec.encode(&frame, target.quality).await?;
        passes += 1;

        debug!(pass = passes, quality = target.quality, size = bytes.len(), "Encode pass");

        if bytes.len() <= target_bytes {
            break bytes;
        }
        match target.next() {
            Some(next) => target = next,
            None => {
                warn!(
                    size = bytes.len(),
                    target_bytes,
                    "Quality floor reached before fitting the budget"
                );
                break bytes;
            }
        }
    };

    // Re-encoding an already compact JPEG at a higher quality can grow it
    if source.media_type() == codec.media_type()
        && source.byte_len() <= target_bytes
        && source.byte_len() <= encoded.len()
    {
        debug!(passes, "Source already fits, keeping original bytes");
        return Ok(CompressedImage {
            passes,
            ..CompressedImage::unchanged(source)
        });
    }

    info!(
        file = source.file_name(),
        from = source.byte_len(),
        to = encoded.len(),
        passes,
        quality = target.quality,
        scale = target.scale,
        "Image compressed"
    );

    Ok(CompressedImage {
        data: encoded.into(),
        media_type: codec.media_type().to_string(),
        file_name: source.file_name().to_string(),
        passes,
        quality: target.quality,
        scale: target.scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JpegCodec;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns pre-recorded sizes from `encode`, in order
    struct ScriptedCodec {
        dims: (u32, u32),
        sizes: Mutex<VecDeque<usize>>,
        encodes: AtomicUsize,
        rendered: Mutex<Option<(u32, u32)>>,
    }

    impl ScriptedCodec {
        fn new(dims: (u32, u32), sizes: &[usize]) -> Self {
            Self {
                dims,
                sizes: Mutex::new(sizes.iter().copied().collect()),
                encodes: AtomicUsize::new(0),
                rendered: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl RasterCodec for ScriptedCodec {
        type Surface = (u32, u32);

        async fn decode(&self, _source: &SourceImage) -> Result<Self::Surface> {
            Ok(self.dims)
        }

        fn dimensions(&self, surface: &Self::Surface) -> (u32, u32) {
            *surface
        }

        async fn render(&self, _surface: &Self::Surface, w: u32, h: u32) -> Result<Self::Surface> {
            *self.rendered.lock().unwrap() = Some((w, h));
            Ok((w, h))
        }

        async fn encode(&self, _surface: &Self::Surface, _quality: f32) -> Result<Vec<u8>> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            let size = self
                .sizes
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| CompressError::Encode("script exhausted".into()))?;
            Ok(vec![0u8; size])
        }
    }

    /// Size proportional to pixel count and quality
    struct ModelCodec {
        dims: (u32, u32),
        bytes_per_pixel: f64,
    }

    #[async_trait]
    impl RasterCodec for ModelCodec {
        type Surface = (u32, u32);

        async fn decode(&self, _source: &SourceImage) -> Result<Self::Surface> {
            Ok(self.dims)
        }

        fn dimensions(&self, surface: &Self::Surface) -> (u32, u32) {
            *surface
        }

        async fn render(&self, _surface: &Self::Surface, w: u32, h: u32) -> Result<Self::Surface> {
            Ok((w, h))
        }

        async fn encode(&self, surface: &Self::Surface, quality: f32) -> Result<Vec<u8>> {
            let pixels = surface.0 as f64 * surface.1 as f64;
            let size = (pixels * self.bytes_per_pixel * quality as f64).ceil() as usize;
            Ok(vec![0u8; size.max(1)])
        }
    }

    fn source_of(len: usize) -> SourceImage {
        SourceImage::new(vec![7u8; len], "image/png", "photo.png")
    }

    #[test]
    fn test_seed_quality_only_for_modest_reduction() {
        let target = CompressionTarget::seed(1_000_000, 900_000);
        assert_eq!(target.quality, QUALITY_CEILING);
        assert_eq!(target.scale, 1.0);

        let target = CompressionTarget::seed(1_000_000, 400_000);
        assert!((target.quality - 0.6).abs() < 1e-6);
        assert!((target.scale - 0.8f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_seed_with_budget_above_source() {
        let target = CompressionTarget::seed(1_000, 5_000);
        assert_eq!(target.quality, QUALITY_CEILING);
        assert_eq!(target.scale, 1.0);
    }

    #[test]
    fn test_quality_steps_are_bounded() {
        let mut target = CompressionTarget::seed(10, 9);
        let mut passes = 1;
        while let Some(next) = target.next() {
            assert_eq!(next.scale, target.scale);
            assert!(next.quality < target.quality);
            target = next;
            passes += 1;
        }
        assert!(target.quality <= QUALITY_FLOOR);
        assert!(passes <= 12);
    }

    #[test]
    fn test_scaled_dimensions_never_zero() {
        let target = CompressionTarget {
            quality: 0.5,
            scale: 0.0001,
        };
        assert_eq!(target.scaled_dimensions(4000, 3000), (1, 1));
    }

    #[tokio::test]
    async fn test_two_passes_when_second_fits() {
        let codec = ScriptedCodec::new((4000, 3000), &[600_000, 300_000]);
        let result = compress(&codec, &source_of(1_000_000), 450_000).await.unwrap();

        assert_eq!(codec.encodes.load(Ordering::SeqCst), 2);
        assert_eq!(result.passes, 2);
        assert_eq!(result.byte_len(), 300_000);
        assert_eq!(result.media_type, "image/jpeg");
        assert_eq!(result.file_name, "photo.png");
        // ratio 0.45 shrinks pixels as well
        assert!(result.scale < 1.0);
        assert!((result.quality - 0.675 * QUALITY_STEP).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_scale_fixed_across_passes() {
        let codec = ScriptedCodec::new((1000, 1000), &[9_000, 8_000, 7_000, 10]);
        let result = compress(&codec, &source_of(10_000), 4_000).await.unwrap();

        let seeded = CompressionTarget::seed(10_000, 4_000);
        assert_eq!(result.passes, 4);
        assert_eq!(result.scale, seeded.scale);
        assert_eq!(
            *codec.rendered.lock().unwrap(),
            Some(seeded.scaled_dimensions(1000, 1000))
        );
    }

    #[tokio::test]
    async fn test_budget_above_source_still_encodes_once() {
        let codec = ScriptedCodec::new((10, 10), &[500]);
        let result = compress(&codec, &source_of(1_000), 5_000).await.unwrap();

        assert_eq!(codec.encodes.load(Ordering::SeqCst), 1);
        assert_eq!(result.byte_len(), 500);
    }

    #[tokio::test]
    async fn test_accepts_oversized_result_at_floor() {
        let codec = ScriptedCodec::new((100, 100), &[5_000; 20]);
        let result = compress(&codec, &source_of(10_000), 1_000).await.unwrap();

        assert!(result.byte_len() > 1_000);
        assert!(result.quality <= QUALITY_FLOOR);
        assert!(result.passes < 20);
    }

    #[tokio::test]
    async fn test_empty_source_fails() {
        let codec = ScriptedCodec::new((1, 1), &[1]);
        let err = compress(&codec, &source_of(0), 100).await.unwrap_err();
        assert!(matches!(err, CompressError::EmptySource));
        assert_eq!(codec.encodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_encode_failure_propagates() {
        let codec = ScriptedCodec::new((10, 10), &[]);
        let err = compress(&codec, &source_of(100), 10).await.unwrap_err();
        assert!(matches!(err, CompressError::Encode(_)));
    }

    #[tokio::test]
    async fn test_fits_or_reaches_floor() {
        let codec = ModelCodec {
            dims: (2000, 1500),
            bytes_per_pixel: 0.5,
        };
        for (source, budget) in [
            (3_000_000, 2_000_000),
            (3_000_000, 1_000_000),
            (3_000_000, 200_000),
            (3_000_000, 5_000),
            (500_000, 499_999),
        ] {
            let result = compress(&codec, &source_of(source), budget).await.unwrap();
            assert!(
                result.byte_len() <= budget || result.quality <= QUALITY_FLOOR,
                "source {} budget {} gave {} at q={}",
                source,
                budget,
                result.byte_len(),
                result.quality
            );
        }
    }

    #[tokio::test]
    async fn test_recompressing_output_never_grows() {
        let source = {
            let img = ImageBuffer::from_fn(320, 240, |x, y| {
                let n = x.wrapping_mul(2654435761).wrapping_add(y.wrapping_mul(40503));
                Rgb([(n >> 3) as u8, (n >> 11) as u8, (n >> 19) as u8])
            });
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(img)
                .write_to(&mut buf, ImageFormat::Png)
                .unwrap();
            SourceImage::new(buf.into_inner(), "image/png", "noise.png")
        };
        let codec = JpegCodec::new();
        let budget = source.byte_len() / 4;

        let first = compress(&codec, &source, budget).await.unwrap();
        assert!(first.byte_len() <= budget || first.quality <= QUALITY_FLOOR);
        assert!(image::load_from_memory(&first.data).is_ok());

        let second = compress(&codec, &first.to_source(), budget).await.unwrap();
        assert!(second.byte_len() <= first.byte_len());
    }
}
