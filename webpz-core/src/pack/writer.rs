use crate::codec::{CodecId, compressor_for};
use crate::container::zip::{
    CentralHeader, DosDateTime, EndOfCentralDir, FLAG_UTF8, LocalHeader, MAX_ENTRIES,
    MAX_NAME_LEN, MAX_SIZE,
};
use crate::error::{Result, WebpzError};
use crate::record::ConversionRecord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMethod {
    /// Deflate each entry unless it saves less than `min_gain`.
    #[default]
    Deflate,
    Store,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PackOptions {
    /// When true, every entry gets the 1980-01-01 DOS timestamp.
    pub deterministic: bool,
    /// Only accept compression if it saves at least this fraction.
    /// e.g. 0.05 means "deflate only if >=5% smaller than STORE";
    /// 0.0 keeps any deflate output that is not larger.
    pub min_gain: f32,
    pub method: ArchiveMethod,
    pub level: u32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            deterministic: false,
            min_gain: 0.05,
            method: ArchiveMethod::Deflate,
            level: 6,
        }
    }
}

/// A complete, finalized archive. Never constructed from a partial build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveBytes(Vec<u8>);

impl ArchiveBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for ArchiveBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PackOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.min_gain) {
            return Err(WebpzError::Config(format!(
                "min_gain must be in [0, 1), got {}",
                self.min_gain
            )));
        }
        if self.level > 9 {
            return Err(WebpzError::Config(format!(
                "deflate level must be 0-9, got {}",
                self.level
            )));
        }
        Ok(())
    }
}

fn should_compress(u: usize, c: usize, min_gain: f32) -> bool {
    // true if (u - c) >= u * min_gain  ⇔  c <= u * (1 - min_gain)
    (u as f64 - c as f64) >= (u as f64 * min_gain as f64)
}

struct EntryPlan<'a> {
    name: &'a str,
    codec: CodecId,
    crc32: u32,
    u_size: u64,
    /// Deflated bytes; `None` means the payload is stored as-is.
    packed: Option<Vec<u8>>,
}

fn build_err(name: &str, why: impl std::fmt::Display) -> WebpzError {
    WebpzError::ArchiveBuild(format!("{name}: {why}"))
}

fn plan_entry<'a>(rec: &'a ConversionRecord, opts: &PackOptions) -> Result<EntryPlan<'a>> {
    let name = rec.output_name.as_str();
    if name.is_empty() {
        return Err(build_err("<unnamed>", "empty entry name"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(build_err(name, format!("name longer than {MAX_NAME_LEN} bytes")));
    }
    let payload: &[u8] = &rec.payload;
    let u_size = payload.len() as u64;
    if u_size > MAX_SIZE {
        return Err(build_err(name, "entry exceeds 4 GiB"));
    }
    let crc32 = crc32fast::hash(payload);

    let packed = match opts.method {
        ArchiveMethod::Store => None,
        ArchiveMethod::Deflate => {
            let mut tmp = Vec::with_capacity(payload.len());
            compressor_for(CodecId::Deflate)
                .compress(&mut &payload[..], &mut tmp, opts.level)
                .map_err(|e| build_err(name, e))?;
            should_compress(payload.len(), tmp.len(), opts.min_gain).then_some(tmp)
        }
    };
    let codec = if packed.is_some() {
        CodecId::Deflate
    } else {
        CodecId::Store
    };
    Ok(EntryPlan {
        name,
        codec,
        crc32,
        u_size,
        packed,
    })
}

/// Packs records into one ZIP, entry order = record order, names kept verbatim.
pub fn build_archive(
    records: &[ConversionRecord],
    opts: Option<&PackOptions>,
) -> Result<ArchiveBytes> {
    let defaults = PackOptions::default();
    let o = opts.unwrap_or(&defaults);
    if records.len() > MAX_ENTRIES {
        return Err(WebpzError::ArchiveBuild(format!(
            "{} entries exceeds the {MAX_ENTRIES} entry limit",
            records.len()
        )));
    }
    o.validate()
        .map_err(|e| WebpzError::ArchiveBuild(e.to_string()))?;

    let plans: Vec<EntryPlan> = records
        .par_iter() // In parallel, each entry independent
        .map(|rec| plan_entry(rec, o))
        .collect::<Result<Vec<_>>>()?;

    let modified = if o.deterministic {
        DosDateTime::epoch()
    } else {
        DosDateTime::from_datetime(OffsetDateTime::now_utc())
    };

    let mut out: Vec<u8> = Vec::new();
    let mut central: Vec<CentralHeader> = Vec::with_capacity(plans.len());

    for (rec, plan) in records.iter().zip(&plans) {
        let c_size = plan.packed.as_ref().map_or(rec.payload.len(), Vec::len);
        let offset = u32::try_from(out.len())
            .map_err(|_| build_err(plan.name, "archive exceeds 4 GiB"))?;
        let local = LocalHeader {
            flags: FLAG_UTF8,
            method: plan.codec as u16,
            modified,
            crc32: plan.crc32,
            c_size: c_size as u32,
            u_size: plan.u_size as u32,
            name: plan.name.to_string(),
        };
        local.write_to(&mut out)?;
        match &plan.packed {
            Some(p) => out.extend_from_slice(p),
            None => {
                compressor_for(CodecId::Store)
                    .compress(&mut &rec.payload[..], &mut out, o.level)
                    .map_err(|e| build_err(plan.name, e))?;
            }
        }
        central.push(CentralHeader::for_local(&local, offset));
    }

    let cd_offset = u32::try_from(out.len())
        .map_err(|_| WebpzError::ArchiveBuild("archive exceeds 4 GiB".into()))?;
    for ch in &central {
        ch.write_to(&mut out)?;
    }
    let cd_size = u32::try_from(out.len() - cd_offset as usize)
        .map_err(|_| WebpzError::ArchiveBuild("central directory exceeds 4 GiB".into()))?;
    if out.len() as u64 > MAX_SIZE {
        return Err(WebpzError::ArchiveBuild("archive exceeds 4 GiB".into()));
    }
    EndOfCentralDir {
        entries: central.len() as u16,
        cd_size,
        cd_offset,
    }
    .write_to(&mut out)?;

    let deflated = plans.iter().filter(|p| p.codec == CodecId::Deflate).count();
    info!(
        entries = plans.len(),
        deflated,
        bytes = out.len(),
        "archive built"
    );
    Ok(ArchiveBytes(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_threshold() {
        assert!(should_compress(100, 90, 0.05));
        assert!(should_compress(100, 94, 0.05));
        assert!(!should_compress(100, 96, 0.05));
        assert!(!should_compress(100, 120, 0.05));
    }

    #[test]
    fn zero_min_gain_keeps_any_saving() {
        assert!(should_compress(100, 100, 0.0));
        assert!(should_compress(100, 99, 0.0));
        assert!(!should_compress(100, 101, 0.0));
    }

    #[test]
    fn pack_options_bounds() {
        let with = |min_gain, level| PackOptions {
            min_gain,
            level,
            ..PackOptions::default()
        };
        with(0.0, 6).validate().unwrap();
        with(0.5, 0).validate().unwrap();
        assert!(with(-0.1, 6).validate().is_err());
        assert!(with(1.0, 6).validate().is_err());
        assert!(with(0.05, 10).validate().is_err());
    }

    #[test]
    fn invalid_options_fail_the_build() {
        let o = PackOptions {
            min_gain: 2.0,
            ..PackOptions::default()
        };
        assert!(matches!(
            build_archive(&[], Some(&o)),
            Err(WebpzError::ArchiveBuild(_))
        ));
    }
}
