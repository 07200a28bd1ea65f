use std::sync::Arc;

use crate::policy::TargetFormat;
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::transcode::EncodedImage;

/// Result of one successful transcode.
#[derive(Clone, Debug)]
pub struct ConversionRecord {
    pub original_name: String,
    /// Not deduplicated: two inputs with the same stem share an output name.
    pub output_name: String,
    pub payload: Arc<[u8]>,
    pub preview_handle: PreviewHandle,
    pub size_before: u64,
    pub size_after: u64,
    pub format: TargetFormat,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub attempts: u8,
    /// BLAKE3 of `payload`, hex.
    pub digest: String,
}

impl ConversionRecord {
    pub fn from_encoded(
        original_name: &str,
        size_before: u64,
        encoded: EncodedImage,
        previews: &PreviewRegistry,
    ) -> Self {
        let digest = hex::encode(blake3::hash(&encoded.bytes).as_bytes());
        let payload: Arc<[u8]> = Arc::from(encoded.bytes);
        Self {
            original_name: original_name.to_string(),
            output_name: output_name(original_name, encoded.format),
            size_after: payload.len() as u64,
            preview_handle: previews.issue(&payload),
            payload,
            size_before,
            format: encoded.format,
            width: encoded.width,
            height: encoded.height,
            quality: encoded.quality,
            attempts: encoded.attempts,
            digest,
        }
    }

    /// after / before; above 1.0 means the output grew.
    pub fn ratio(&self) -> f64 {
        if self.size_before == 0 {
            return 0.0;
        }
        self.size_after as f64 / self.size_before as f64
    }
}

/// `<stem>.<ext>` where the stem drops the last extension only.
pub fn output_name(original: &str, format: TargetFormat) -> String {
    let file = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = match file.rfind('.') {
        Some(i) if i > 0 => &file[..i],
        _ => file,
    };
    format!("{stem}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_output_names() {
        let w = TargetFormat::Webp;
        assert_eq!(output_name("photo.png", w), "photo.webp");
        assert_eq!(output_name("archive.tar.png", w), "archive.tar.webp");
        assert_eq!(output_name("noext", w), "noext.webp");
        assert_eq!(output_name(".png", w), ".png.webp");
        assert_eq!(output_name("dir/sub/a.JPG", w), "a.webp");
        assert_eq!(output_name("c.jpeg", TargetFormat::Jpeg), "c.jpg");
    }

    #[test]
    fn digest_and_row_fingerprint_the_payload() {
        use crate::domain::RecordRow;
        use image::ImageFormat;

        let previews = PreviewRegistry::new();
        let encoded = EncodedImage {
            bytes: b"RIFF\0\0\0\0WEBPVP8 ".to_vec(),
            format: TargetFormat::Webp,
            source_format: ImageFormat::Png,
            width: 2,
            height: 2,
            quality: 80.0,
            attempts: 1,
        };
        let expected = blake3::hash(&encoded.bytes).to_hex().to_string();
        let rec = ConversionRecord::from_encoded("x.png", 32, encoded, &previews);
        assert_eq!(rec.digest, expected);
        assert_eq!(rec.ratio(), 16.0 / 32.0);

        let row = RecordRow::from(&rec);
        assert_eq!(row.digest, &expected[..12]);
        assert_eq!(row.ratio, 0.5);
    }

    #[test]
    fn collisions_are_kept() {
        let w = TargetFormat::Webp;
        assert_eq!(output_name("a.png", w), output_name("a.jpg", w));
    }
}
