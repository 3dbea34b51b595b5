//! Best-effort shrinking of base64 images to fit upstream body-size caps.
//!
//! The reducer downsizes with a scale derived from the byte ratio, then
//! re-encodes as JPEG with decreasing quality until the budget is met. Any
//! failure returns the input untouched.

use crate::error::{GenAiError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static DATA_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/(\w+);base64,(.+)$").unwrap());

/// 1.5 MiB, the usual budget for one reference image.
pub const DEFAULT_TARGET_BYTES: usize = 1536 * 1024;

/// Re-encodes oversized images to fit a byte budget.
#[derive(Debug, Clone)]
pub struct ImageSizeReducer {
    target_bytes: usize,
    min_dimension: u32,
    min_scale: f64,
    initial_quality: u8,
    quality_step: u8,
    quality_floor: u8,
    max_attempts: u32,
}

impl ImageSizeReducer {
    pub fn new(target_bytes: usize) -> Self {
        Self {
            target_bytes,
            min_dimension: 512,
            min_scale: 0.3,
            initial_quality: 80,
            quality_step: 15,
            quality_floor: 20,
            max_attempts: 5,
        }
    }

    pub fn target_bytes(&self) -> usize {
        self.target_bytes
    }

    /// Shrink `data_uri`, returning the original on any failure.
    ///
    /// The result is never larger than the input.
    pub fn reduce(&self, data_uri: &str) -> String {
        match self.try_reduce(data_uri) {
            Ok(Some(reduced)) => reduced,
            Ok(None) => data_uri.to_string(),
            Err(err) => {
                warn!(error = %err, "Image reduction failed, keeping original");
                data_uri.to_string()
            }
        }
    }

    /// Shrink `data_uri`.
    ///
    /// Returns `Ok(None)` when the image already fits or re-encoding would not
    /// make it smaller.
    pub fn try_reduce(&self, data_uri: &str) -> Result<Option<String>> {
        let captures = DATA_URI
            .captures(data_uri)
            .ok_or_else(|| GenAiError::Image("not a base64 image data URI".to_string()))?;
        let payload = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

        let original = STANDARD.decode(payload.trim())?;
        if original.len() <= self.target_bytes {
            debug!(bytes = original.len(), target = self.target_bytes, "Image already fits");
            return Ok(None);
        }

        let decoded = image::load_from_memory(&original)?;
        let (width, height) = self.scaled_dimensions(
            decoded.width(),
            decoded.height(),
            original.len(),
        );
        let resized = fit_inside(decoded, width, height);

        let mut quality = self.initial_quality;
        let mut attempts = 0;
        let encoded = loop {
            let encoded = encode_jpeg(&resized, quality)?;
            debug!(attempt = attempts + 1, quality, bytes = encoded.len(), "Re-encoded image");

            if encoded.len() <= self.target_bytes {
                break encoded;
            }

            quality = quality.saturating_sub(self.quality_step);
            attempts += 1;
            if quality <= self.quality_floor || attempts >= self.max_attempts {
                break encoded;
            }
        };

        if encoded.len() >= original.len() {
            return Ok(None);
        }

        info!(
            original_bytes = original.len(),
            reduced_bytes = encoded.len(),
            width = resized.width(),
            height = resized.height(),
            "Reduced image"
        );

        Ok(Some(format!(
            "data:image/jpeg;base64,{}",
            STANDARD.encode(&encoded)
        )))
    }

    /// Target box for the resize.
    ///
    /// Linear scale `1/sqrt(bytes/target)` clamped to `[min_scale, 1]`; when
    /// both sides would fall under `min_dimension`, the longer side is pinned to
    /// it instead.
    fn scaled_dimensions(&self, width: u32, height: u32, bytes: usize) -> (u32, u32) {
        let ratio = bytes as f64 / self.target_bytes.max(1) as f64;
        let scale = (1.0 / ratio.sqrt()).clamp(self.min_scale, 1.0);

        let mut new_width = (width as f64 * scale).round() as u32;
        let mut new_height = (height as f64 * scale).round() as u32;

        if new_width < self.min_dimension && new_height < self.min_dimension {
            let min = self.min_dimension as f64;
            if width >= height {
                new_width = self.min_dimension;
                new_height = (min * height as f64 / width.max(1) as f64).round() as u32;
            } else {
                new_height = self.min_dimension;
                new_width = (min * width as f64 / height.max(1) as f64).round() as u32;
            }
        }

        (new_width.max(1), new_height.max(1))
    }
}

impl Default for ImageSizeReducer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_BYTES)
    }
}

/// Resize to fit inside `width`x`height`, keeping the aspect ratio. Never enlarges.
fn fit_inside(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if width >= image.width() && height >= image.height() {
        return image;
    }
    image.resize(width, height, FilterType::Triangle)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&rgb)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Deterministic noise compresses badly, which is what we want here.
    fn noisy_png(width: u32, height: u32) -> String {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        });

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
    }

    fn decoded_len(data_uri: &str) -> usize {
        let payload = data_uri.split_once(",").unwrap().1;
        STANDARD.decode(payload).unwrap().len()
    }

    fn dimensions(data_uri: &str) -> (u32, u32) {
        let payload = data_uri.split_once(",").unwrap().1;
        let img = image::load_from_memory(&STANDARD.decode(payload).unwrap()).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_oversized_image_fits_budget() {
        let input = noisy_png(1200, 900);
        let target = 400 * 1024;
        assert!(decoded_len(&input) > target);

        let output = ImageSizeReducer::new(target).reduce(&input);

        assert!(output.starts_with("data:image/jpeg;base64,"));
        assert!(decoded_len(&output) <= target);
    }

    #[test]
    fn test_image_under_budget_is_untouched() {
        let input = noisy_png(64, 64);
        let output = ImageSizeReducer::new(10 * 1024 * 1024).reduce(&input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_output_never_larger_than_input() {
        let input = noisy_png(700, 700);
        // impossible budget: quality bottoms out
        let output = ImageSizeReducer::new(1).reduce(&input);
        assert!(decoded_len(&output) <= decoded_len(&input));
    }

    #[test]
    fn test_resize_respects_minimum_dimension() {
        let input = noisy_png(900, 600);
        let output = ImageSizeReducer::new(1).reduce(&input);

        let (width, height) = dimensions(&output);
        assert!((500..=512).contains(&width), "width {width}");
        assert!(height <= 342, "height {height}");
    }

    #[test]
    fn test_small_images_are_not_enlarged() {
        let reducer = ImageSizeReducer::new(1);
        let (w, h) = reducer.scaled_dimensions(300, 200, 10_000);
        assert_eq!((w, h), (512, 341));

        let resized = fit_inside(DynamicImage::new_rgb8(300, 200), w, h);
        assert_eq!((resized.width(), resized.height()), (300, 200));
    }

    #[test]
    fn test_scale_is_clamped() {
        let reducer = ImageSizeReducer::new(1000);
        // ratio 4 => scale 0.5
        assert_eq!(reducer.scaled_dimensions(2000, 1000, 4000), (1000, 500));
        // ratio 100 => scale clamped to 0.3
        assert_eq!(reducer.scaled_dimensions(4000, 2000, 100_000), (1200, 600));
    }

    #[test]
    fn test_invalid_input_returns_original() {
        let reducer = ImageSizeReducer::new(1);
        for input in [
            "https://cdn.test/image.png",
            "data:image/png;base64,@@@not-base64@@@",
            "data:image/png;base64,aGVsbG8gd29ybGQ=",
        ] {
            assert_eq!(reducer.reduce(input), input);
        }
        assert!(reducer.try_reduce("https://cdn.test/image.png").is_err());
    }
}
