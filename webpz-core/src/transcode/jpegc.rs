use super::ImageEncoder;
use crate::error::TranscodeError;
use crate::policy::TargetFormat;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder as Baseline;

pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Jpeg
    }

    fn encode(&self, img: &DynamicImage, quality: f32) -> Result<Vec<u8>, TranscodeError> {
        let q = quality.round().clamp(1.0, 100.0) as u8;
        let mut out = Vec::new();
        // JPEG has no alpha; flatten to RGB.
        let rgb = img.to_rgb8();
        Baseline::new_with_quality(&mut out, q)
            .encode_image(&rgb)
            .map_err(|e| TranscodeError::EncodeFailure(format!("jpeg q={q}: {e}")))?;
        Ok(out)
    }
}
