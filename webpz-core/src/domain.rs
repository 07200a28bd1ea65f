// webpz_core/src/domain.rs
use crate::record::ConversionRecord;

/// One line of a result table.
#[derive(Clone, Debug)]
pub struct RecordRow {
    pub original_name: String,
    pub output_name: String,
    pub size_before: u64,
    pub size_after: u64,
    pub dims: (u32, u32),
    pub quality: f32,
    pub attempts: u8,
    /// after / before.
    pub ratio: f64,
    /// Short BLAKE3 fingerprint of the output.
    pub digest: String,
    pub preview: String,
}

impl From<&ConversionRecord> for RecordRow {
    fn from(r: &ConversionRecord) -> Self {
        Self {
            original_name: r.original_name.clone(),
            output_name: r.output_name.clone(),
            size_before: r.size_before,
            size_after: r.size_after,
            dims: (r.width, r.height),
            quality: r.quality,
            attempts: r.attempts,
            ratio: r.ratio(),
            digest: r.digest.chars().take(12).collect(),
            preview: r.preview_handle.uri(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EntryRow {
    pub name: String,
    pub method: &'static str,
    pub u_size: u64,
    pub c_size: u64,
    pub crc32: u32,
}
