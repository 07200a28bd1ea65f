use serde::{Deserialize, Serialize};

use crate::error::{Result, WebpzError};

pub const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Webp,
    Jpeg,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Webp => "webp",
            TargetFormat::Jpeg => "jpg",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            TargetFormat::Webp => "image/webp",
            TargetFormat::Jpeg => "image/jpeg",
        }
    }

    /// Magic-byte check used to confirm an encoder produced what it claims.
    pub fn matches(self, bytes: &[u8]) -> bool {
        match self {
            TargetFormat::Webp => {
                bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
            }
            TargetFormat::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        }
    }
}

impl std::str::FromStr for TargetFormat {
    type Err = WebpzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(TargetFormat::Webp),
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            other => Err(WebpzError::Config(format!("unknown target format '{other}'"))),
        }
    }
}

/// Compression policy applied to every item of a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Soft cap; the encoder trades quality (then resolution) to approach it.
    pub max_output_megabytes: f64,
    /// Longer edge is downscaled to this, aspect preserved.
    pub max_dimension_px: u32,
    pub target_format: TargetFormat,
    pub initial_quality: f32,
    pub min_quality: f32,
    /// Extra encode passes allowed after the first one overshoots the cap.
    pub max_quality_reductions: u8,
    pub quality_step: f32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_output_megabytes: 2.0,
            max_dimension_px: 3000,
            target_format: TargetFormat::Webp,
            initial_quality: 80.0,
            min_quality: 10.0,
            max_quality_reductions: 5,
            quality_step: 15.0,
        }
    }
}

impl Policy {
    pub fn max_output_bytes(&self) -> u64 {
        (self.max_output_megabytes * BYTES_PER_MEGABYTE) as u64
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_output_megabytes > 0.0) {
            return Err(WebpzError::Config(
                "max_output_megabytes must be positive".into(),
            ));
        }
        if self.max_dimension_px == 0 {
            return Err(WebpzError::Config("max_dimension_px must be at least 1".into()));
        }
        if !(self.min_quality > 0.0
            && self.min_quality <= self.initial_quality
            && self.initial_quality <= 100.0)
        {
            return Err(WebpzError::Config(format!(
                "quality bounds must satisfy 0 < min ({}) <= initial ({}) <= 100",
                self.min_quality, self.initial_quality
            )));
        }
        if !(self.quality_step > 0.0) {
            return Err(WebpzError::Config("quality_step must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        let p = Policy::default();
        p.validate().unwrap();
        assert_eq!(p.max_output_bytes(), 2 * 1024 * 1024);
        assert_eq!(p.target_format.extension(), "webp");
    }

    #[test]
    fn rejects_inverted_quality_bounds() {
        let p = Policy {
            min_quality: 90.0,
            initial_quality: 50.0,
            ..Policy::default()
        };
        assert!(matches!(p.validate(), Err(WebpzError::Config(_))));
    }

    #[test]
    fn rejects_zero_caps() {
        let p = Policy {
            max_dimension_px: 0,
            ..Policy::default()
        };
        assert!(p.validate().is_err());
        let p = Policy {
            max_output_megabytes: 0.0,
            ..Policy::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("WebP".parse::<TargetFormat>().unwrap(), TargetFormat::Webp);
        assert_eq!("jpg".parse::<TargetFormat>().unwrap(), TargetFormat::Jpeg);
        assert!("tiff".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p: Policy = serde_json::from_str(r#"{"max_dimension_px": 640}"#).unwrap();
        assert_eq!(p.max_dimension_px, 640);
        assert_eq!(p.max_quality_reductions, 5);
    }
}
