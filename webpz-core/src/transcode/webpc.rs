use super::ImageEncoder;
use crate::error::TranscodeError;
use crate::policy::TargetFormat;
use image::DynamicImage;

/// Lossy WebP through libwebp.
pub struct WebpEncoder;

impl ImageEncoder for WebpEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Webp
    }

    fn encode(&self, img: &DynamicImage, quality: f32) -> Result<Vec<u8>, TranscodeError> {
        let (w, h) = (img.width(), img.height());
        let encoded = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            webp::Encoder::from_rgba(rgba.as_raw(), w, h).encode_simple(false, quality)
        } else {
            let rgb = img.to_rgb8();
            webp::Encoder::from_rgb(rgb.as_raw(), w, h).encode_simple(false, quality)
        };
        let mem = encoded
            .map_err(|e| TranscodeError::EncodeFailure(format!("webp {w}x{h}: {e:?}")))?;
        Ok(mem.to_vec())
    }
}
