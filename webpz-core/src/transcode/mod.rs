// Single-image transcoding: sniff, decode, downscale, re-encode under a size cap.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::TranscodeError;
use crate::policy::{Policy, TargetFormat};

pub trait ImageEncoder: Send + Sync {
    fn format(&self) -> TargetFormat;
    fn encode(&self, img: &DynamicImage, quality: f32) -> Result<Vec<u8>, TranscodeError>;
}

pub mod jpegc;
pub mod webpc;

/// Source containers the transcoder decodes.
pub const SUPPORTED_SOURCES: [ImageFormat; 5] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

/// Resolution shrink applied per pass once quality is at its floor.
const SHRINK_FACTOR: f64 = 0.85;

pub fn encoder_for(format: TargetFormat) -> Box<dyn ImageEncoder> {
    match format {
        TargetFormat::Webp => Box::new(webpc::WebpEncoder),
        TargetFormat::Jpeg => Box::new(jpegc::JpegEncoder),
    }
}

#[derive(Clone, Debug)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: TargetFormat,
    pub source_format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    /// Encode passes made, including the first.
    pub attempts: u8,
}

pub fn transcode(
    input: &[u8],
    input_name: &str,
    policy: &Policy,
) -> Result<EncodedImage, TranscodeError> {
    let encoder = encoder_for(policy.target_format);
    transcode_with(input, input_name, policy, encoder.as_ref())
}

/// Same as [`transcode`] with an explicit encoder; `policy.target_format` is ignored.
pub fn transcode_with(
    input: &[u8],
    input_name: &str,
    policy: &Policy,
    encoder: &dyn ImageEncoder,
) -> Result<EncodedImage, TranscodeError> {
    let (source_format, decoded) = decode(input, input_name)?;
    let (w, h) = fit_within(decoded.width(), decoded.height(), policy.max_dimension_px);
    let mut img = if (w, h) != (decoded.width(), decoded.height()) {
        debug!(
            file = input_name,
            from = %format!("{}x{}", decoded.width(), decoded.height()),
            to = %format!("{w}x{h}"),
            "downscaling"
        );
        decoded.resize_exact(w, h, FilterType::Lanczos3)
    } else {
        decoded
    };

    let cap = policy.max_output_bytes();
    let mut quality = policy.initial_quality;
    let mut attempts = 0u8;
    let mut reductions = 0u8;
    let mut best: Option<EncodedImage> = None;

    loop {
        attempts += 1;
        let bytes = encoder.encode(&img, quality)?;
        if bytes.is_empty() || !encoder.format().matches(&bytes) {
            return Err(TranscodeError::EncodeFailure(format!(
                "{input_name}: encoder produced no valid {} stream",
                encoder.format().extension()
            )));
        }
        let len = bytes.len() as u64;
        debug!(file = input_name, attempt = attempts, quality, bytes = len, cap, "encoded");

        if best.as_ref().is_none_or(|b| bytes.len() < b.bytes.len()) {
            best = Some(EncodedImage {
                bytes,
                format: encoder.format(),
                source_format,
                width: img.width(),
                height: img.height(),
                quality,
                attempts,
            });
        }
        if len <= cap || reductions >= policy.max_quality_reductions {
            break;
        }
        reductions += 1;
        if quality > policy.min_quality {
            quality = (quality - policy.quality_step).max(policy.min_quality);
        } else {
            let (sw, sh) = shrink(img.width(), img.height());
            if (sw, sh) == (img.width(), img.height()) {
                break;
            }
            img = img.resize_exact(sw, sh, FilterType::Triangle);
        }
    }

    match best {
        Some(mut out) => {
            out.attempts = attempts;
            Ok(out)
        }
        None => Err(TranscodeError::EncodeFailure(format!(
            "{input_name}: no encode attempt completed"
        ))),
    }
}

fn decode(input: &[u8], name: &str) -> Result<(ImageFormat, DynamicImage), TranscodeError> {
    let unsupported = || TranscodeError::UnsupportedFormat(name.to_string());
    let format = image::guess_format(input).map_err(|_| unsupported())?;
    if !SUPPORTED_SOURCES.contains(&format) {
        return Err(unsupported());
    }
    // Animated GIF/WebP decode to their first frame.
    let img = image::load_from_memory_with_format(input, format).map_err(|e| {
        debug!(file = name, error = %e, "decode failed");
        unsupported()
    })?;
    if img.width() == 0 || img.height() == 0 {
        return Err(unsupported());
    }
    Ok((format, img))
}

/// Dimensions whose longer edge is at most `max`, aspect preserved.
pub fn fit_within(w: u32, h: u32, max: u32) -> (u32, u32) {
    let longer = w.max(h);
    if longer <= max || max == 0 {
        return (w, h);
    }
    let scale = max as f64 / longer as f64;
    let shorter = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, max);
    if w >= h {
        (max, shorter(h))
    } else {
        (shorter(w), max)
    }
}

fn shrink(w: u32, h: u32) -> (u32, u32) {
    let s = |v: u32| ((v as f64 * SHRINK_FACTOR).round() as u32).max(1);
    (s(w), s(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_as(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn noise(w: u32, h: u32) -> DynamicImage {
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |_, _| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let b = state.to_le_bytes();
            Rgb([b[0], b[1], b[2]])
        }))
    }

    #[test]
    fn fit_within_preserves_aspect() {
        assert_eq!(fit_within(4000, 3000, 3000), (3000, 2250));
        assert_eq!(fit_within(3000, 4000, 3000), (2250, 3000));
        assert_eq!(fit_within(800, 600, 3000), (800, 600));
        assert_eq!(fit_within(10_000, 1, 100), (100, 1));
    }

    #[test]
    fn decodes_every_supported_source() {
        let img = gradient(40, 30);
        let policy = Policy::default();
        for format in SUPPORTED_SOURCES {
            let bytes = encode_as(&img, format);
            let out = transcode(&bytes, "in", &policy)
                .unwrap_or_else(|e| panic!("{format:?} failed: {e}"));
            assert_eq!(out.source_format, format);
            assert_eq!(out.format, TargetFormat::Webp);
            assert!(TargetFormat::Webp.matches(&out.bytes));
            assert_eq!((out.width, out.height), (40, 30));
            assert_eq!(out.attempts, 1);
        }
    }

    #[test]
    fn keeps_alpha_inputs_encodable() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 128])));
        let bytes = encode_as(&img, ImageFormat::Png);
        let out = transcode(&bytes, "alpha.png", &Policy::default()).unwrap();
        assert!(TargetFormat::Webp.matches(&out.bytes));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = transcode(b"just some text, not pixels", "b.png", &Policy::default())
            .unwrap_err();
        assert_eq!(err, TranscodeError::UnsupportedFormat("b.png".into()));
    }

    #[test]
    fn rejects_truncated_png() {
        let bytes = encode_as(&gradient(64, 64), ImageFormat::Png);
        let err = transcode(&bytes[..40], "cut.png", &Policy::default()).unwrap_err();
        assert!(matches!(err, TranscodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn downscales_longer_edge() {
        let bytes = encode_as(&gradient(400, 300), ImageFormat::Png);
        let policy = Policy {
            max_dimension_px: 100,
            ..Policy::default()
        };
        let out = transcode(&bytes, "big.png", &policy).unwrap();
        assert_eq!((out.width, out.height), (100, 75));
        let back = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((back.width(), back.height()), (100, 75));
    }

    #[test]
    fn unreachable_cap_stops_after_bounded_reductions() {
        let bytes = encode_as(&noise(128, 128), ImageFormat::Png);
        let policy = Policy {
            max_output_megabytes: 1.0 / (1024.0 * 1024.0),
            ..Policy::default()
        };
        let out = transcode(&bytes, "noise.png", &policy).unwrap();
        assert_eq!(out.attempts, policy.max_quality_reductions + 1);
        assert!(out.bytes.len() as u64 > policy.max_output_bytes());
        assert!(out.quality >= policy.min_quality);
    }

    #[test]
    fn quality_reduction_shrinks_output() {
        let bytes = encode_as(&noise(256, 256), ImageFormat::Png);
        let loose = transcode(&bytes, "n.png", &Policy::default()).unwrap();
        let tight = Policy {
            max_output_megabytes: (loose.bytes.len() as f64 * 0.6) / (1024.0 * 1024.0),
            ..Policy::default()
        };
        let out = transcode(&bytes, "n.png", &tight).unwrap();
        assert!(out.attempts > 1);
        assert!(out.bytes.len() < loose.bytes.len());
        assert!(out.quality < loose.quality || out.width < loose.width);
    }

    #[test]
    fn jpeg_target_is_supported() {
        let bytes = encode_as(&gradient(32, 32), ImageFormat::Bmp);
        let policy = Policy {
            target_format: TargetFormat::Jpeg,
            ..Policy::default()
        };
        let out = transcode(&bytes, "x.bmp", &policy).unwrap();
        assert_eq!(out.format, TargetFormat::Jpeg);
        assert!(TargetFormat::Jpeg.matches(&out.bytes));
    }

    struct Broken;

    impl ImageEncoder for Broken {
        fn format(&self) -> TargetFormat {
            TargetFormat::Webp
        }
        fn encode(&self, _: &DynamicImage, _: f32) -> Result<Vec<u8>, TranscodeError> {
            Ok(vec![0u8; 7])
        }
    }

    #[test]
    fn garbage_encoder_output_is_an_encode_failure() {
        let bytes = encode_as(&gradient(8, 8), ImageFormat::Png);
        let err = transcode_with(&bytes, "g.png", &Policy::default(), &Broken).unwrap_err();
        assert!(matches!(err, TranscodeError::EncodeFailure(_)));
    }
}
