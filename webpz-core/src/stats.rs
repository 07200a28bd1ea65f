use serde::{Deserialize, Serialize};

use crate::record::ConversionRecord;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub files: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
    /// before / after; 0.0 when nothing was converted.
    pub compression_ratio: f32,
    /// Negative when outputs grew overall.
    pub saved_bytes: i64,
}

impl Stats {
    pub fn from_records(records: &[ConversionRecord]) -> Self {
        let bytes_before: u64 = records.iter().map(|r| r.size_before).sum();
        let bytes_after: u64 = records.iter().map(|r| r.size_after).sum();
        let compression_ratio = if bytes_after == 0 {
            0.0
        } else {
            (bytes_before as f64 / bytes_after as f64) as f32
        };
        Self {
            files: records.len() as u64,
            bytes_before,
            bytes_after,
            compression_ratio,
            saved_bytes: bytes_before as i64 - bytes_after as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats() {
        let s = Stats::from_records(&[]);
        assert_eq!(s, Stats::default());
    }
}
