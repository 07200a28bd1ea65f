use crate::codec::{CodecId, compressor_for};
use crate::container::zip::{CENTRAL_LEN, CentralHeader, EndOfCentralDir, LocalHeader, find_eocd};
use crate::error::{Result, WebpzError};
use std::fs;
use std::path::Path;

const MAX_DEFLATE_RATIO: usize = 1032;

/// An archive held in memory with its central directory parsed.
pub struct Opened {
    buf: Vec<u8>,
    pub eocd: EndOfCentralDir,
    /// Central directory order, duplicates included.
    pub entries: Vec<CentralHeader>,
}

impl Opened {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        let at = find_eocd(&buf)
            .ok_or_else(|| WebpzError::Format("no end-of-central-directory record".into()))?;
        let eocd = EndOfCentralDir::read_from(&buf[at..])?;

        let start = eocd.cd_offset as usize;
        let end = start + eocd.cd_size as usize;
        if end > at {
            return Err(WebpzError::Format("central directory overruns end record".into()));
        }
        if eocd.entries as u64 * CENTRAL_LEN > eocd.cd_size as u64 {
            return Err(WebpzError::Format(format!(
                "{} entries cannot fit a {}-byte central directory",
                eocd.entries, eocd.cd_size
            )));
        }
        let mut cd = &buf[start..end];
        let mut entries = Vec::with_capacity(eocd.entries as usize);
        for _ in 0..eocd.entries {
            entries.push(CentralHeader::read_from(&mut cd)?);
        }
        Ok(Self { buf, eocd, entries })
    }

    /// Decompressed bytes of entry `idx`, checked against CRC and size.
    pub fn read_entry(&self, idx: usize) -> Result<Vec<u8>> {
        let ch = self
            .entries
            .get(idx)
            .ok_or_else(|| WebpzError::Format(format!("no entry #{idx}")))?;
        let off = ch.local_offset as usize;
        if off >= self.buf.len() {
            return Err(WebpzError::Format(format!("{}: local header out of range", ch.name)));
        }
        let mut r = &self.buf[off..];
        let local = LocalHeader::read_from(&mut r)?;
        if local.name != ch.name {
            return Err(WebpzError::Format(format!(
                "{}: local name '{}' disagrees with directory",
                ch.name, local.name
            )));
        }
        let c_size = ch.c_size as usize;
        if r.len() < c_size {
            return Err(WebpzError::Format(format!("{}: truncated entry data", ch.name)));
        }
        let codec = CodecId::from_method(ch.method).ok_or_else(|| {
            WebpzError::Format(format!("{}: unsupported method {}", ch.name, ch.method))
        })?;

        // Header sizes are untrusted; deflate cannot expand beyond ~1032:1.
        let hint = (ch.u_size as usize).min(c_size.saturating_mul(MAX_DEFLATE_RATIO));
        let mut out = Vec::with_capacity(hint);
        compressor_for(codec).decompress(&mut &r[..c_size], &mut out)?;
        if out.len() as u64 != ch.u_size as u64 {
            return Err(WebpzError::Format(format!("{}: size mismatch", ch.name)));
        }
        if crc32fast::hash(&out) != ch.crc32 {
            return Err(WebpzError::Format(format!("{}: CRC mismatch", ch.name)));
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
