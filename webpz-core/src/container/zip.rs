// Plain (non-ZIP64) ZIP records: local header, central directory header, end record.

use std::io::{Read, Write};

use time::OffsetDateTime;
use time::macros::datetime;

pub const LOCAL_MAGIC: u32 = 0x0403_4b50;
pub const CENTRAL_MAGIC: u32 = 0x0201_4b50;
pub const EOCD_MAGIC: u32 = 0x0605_4b50;

pub const LOCAL_LEN: u64 = 30;
pub const CENTRAL_LEN: u64 = 46;
pub const EOCD_LEN: u64 = 22;

/// 2.0: deflate support.
pub const VERSION_NEEDED: u16 = 20;
/// Upper byte 3 = Unix, so `external_attrs` carries a mode.
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;
/// General purpose bit 11: names are UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;
/// Regular file, 0644.
pub const FILE_ATTRS: u32 = 0o100644 << 16;

pub const MAX_ENTRIES: usize = u16::MAX as usize;
pub const MAX_NAME_LEN: usize = u16::MAX as usize;
pub const MAX_SIZE: u64 = u32::MAX as u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// DOS timestamps start in 1980 and have 2-second resolution.
    pub fn from_datetime(t: OffsetDateTime) -> Self {
        let t = if t.year() < 1980 {
            datetime!(1980-01-01 0:00 UTC)
        } else {
            t
        };
        let year = (t.year() - 1980).min(127) as u16;
        Self {
            time: ((t.hour() as u16) << 11) | ((t.minute() as u16) << 5) | (t.second() as u16 / 2),
            date: (year << 9) | ((t.month() as u16) << 5) | t.day() as u16,
        }
    }

    pub fn epoch() -> Self {
        Self::from_datetime(datetime!(1980-01-01 0:00 UTC))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalHeader {
    pub flags: u16,
    pub method: u16,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub c_size: u32,
    pub u_size: u32,
    pub name: String,
}

impl LocalHeader {
    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(&LOCAL_MAGIC.to_le_bytes())?;
        w.write_all(&VERSION_NEEDED.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        w.write_all(&self.method.to_le_bytes())?;
        w.write_all(&self.modified.time.to_le_bytes())?;
        w.write_all(&self.modified.date.to_le_bytes())?;
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&self.c_size.to_le_bytes())?;
        w.write_all(&self.u_size.to_le_bytes())?;
        w.write_all(&(self.name.len() as u16).to_le_bytes())?;
        w.write_all(&0u16.to_le_bytes())?; // extra len
        w.write_all(self.name.as_bytes())?;
        Ok(())
    }

    /// Reads the header and skips its extra field.
    pub fn read_from(mut r: impl Read) -> std::io::Result<Self> {
        if read_u32(&mut r)? != LOCAL_MAGIC {
            return Err(invalid("bad local header magic"));
        }
        let _version = read_u16(&mut r)?;
        let flags = read_u16(&mut r)?;
        let method = read_u16(&mut r)?;
        let time = read_u16(&mut r)?;
        let date = read_u16(&mut r)?;
        let crc32 = read_u32(&mut r)?;
        let c_size = read_u32(&mut r)?;
        let u_size = read_u32(&mut r)?;
        let name_len = read_u16(&mut r)? as usize;
        let extra_len = read_u16(&mut r)? as usize;
        let name = read_name(&mut r, name_len)?;
        skip(&mut r, extra_len)?;
        Ok(Self {
            flags,
            method,
            modified: DosDateTime { time, date },
            crc32,
            c_size,
            u_size,
            name,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CentralHeader {
    pub flags: u16,
    pub method: u16,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub c_size: u32,
    pub u_size: u32,
    pub external_attrs: u32,
    pub local_offset: u32,
    pub name: String,
}

impl CentralHeader {
    pub fn for_local(local: &LocalHeader, local_offset: u32) -> Self {
        Self {
            flags: local.flags,
            method: local.method,
            modified: local.modified,
            crc32: local.crc32,
            c_size: local.c_size,
            u_size: local.u_size,
            external_attrs: FILE_ATTRS,
            local_offset,
            name: local.name.clone(),
        }
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(&CENTRAL_MAGIC.to_le_bytes())?;
        w.write_all(&VERSION_MADE_BY.to_le_bytes())?;
        w.write_all(&VERSION_NEEDED.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        w.write_all(&self.method.to_le_bytes())?;
        w.write_all(&self.modified.time.to_le_bytes())?;
        w.write_all(&self.modified.date.to_le_bytes())?;
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&self.c_size.to_le_bytes())?;
        w.write_all(&self.u_size.to_le_bytes())?;
        w.write_all(&(self.name.len() as u16).to_le_bytes())?;
        w.write_all(&0u16.to_le_bytes())?; // extra len
        w.write_all(&0u16.to_le_bytes())?; // comment len
        w.write_all(&0u16.to_le_bytes())?; // disk number start
        w.write_all(&0u16.to_le_bytes())?; // internal attrs
        w.write_all(&self.external_attrs.to_le_bytes())?;
        w.write_all(&self.local_offset.to_le_bytes())?;
        w.write_all(self.name.as_bytes())?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> std::io::Result<Self> {
        if read_u32(&mut r)? != CENTRAL_MAGIC {
            return Err(invalid("bad central directory magic"));
        }
        let _made_by = read_u16(&mut r)?;
        let _needed = read_u16(&mut r)?;
        let flags = read_u16(&mut r)?;
        let method = read_u16(&mut r)?;
        let time = read_u16(&mut r)?;
        let date = read_u16(&mut r)?;
        let crc32 = read_u32(&mut r)?;
        let c_size = read_u32(&mut r)?;
        let u_size = read_u32(&mut r)?;
        let name_len = read_u16(&mut r)? as usize;
        let extra_len = read_u16(&mut r)? as usize;
        let comment_len = read_u16(&mut r)? as usize;
        let _disk = read_u16(&mut r)?;
        let _internal = read_u16(&mut r)?;
        let external_attrs = read_u32(&mut r)?;
        let local_offset = read_u32(&mut r)?;
        let name = read_name(&mut r, name_len)?;
        skip(&mut r, extra_len + comment_len)?;
        Ok(Self {
            flags,
            method,
            modified: DosDateTime { time, date },
            crc32,
            c_size,
            u_size,
            external_attrs,
            local_offset,
            name,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EndOfCentralDir {
    pub entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl EndOfCentralDir {
    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(&EOCD_MAGIC.to_le_bytes())?;
        w.write_all(&0u16.to_le_bytes())?; // this disk
        w.write_all(&0u16.to_le_bytes())?; // disk with cd
        w.write_all(&self.entries.to_le_bytes())?;
        w.write_all(&self.entries.to_le_bytes())?;
        w.write_all(&self.cd_size.to_le_bytes())?;
        w.write_all(&self.cd_offset.to_le_bytes())?;
        w.write_all(&0u16.to_le_bytes())?; // comment len
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> std::io::Result<Self> {
        if read_u32(&mut r)? != EOCD_MAGIC {
            return Err(invalid("bad end-of-central-directory magic"));
        }
        let disk = read_u16(&mut r)?;
        let cd_disk = read_u16(&mut r)?;
        let _on_disk = read_u16(&mut r)?;
        let entries = read_u16(&mut r)?;
        if disk != 0 || cd_disk != 0 {
            return Err(invalid("multi-disk archives are not supported"));
        }
        let cd_size = read_u32(&mut r)?;
        let cd_offset = read_u32(&mut r)?;
        Ok(Self {
            entries,
            cd_size,
            cd_offset,
        })
    }
}

/// Offset of the end record, scanning back over a possible archive comment.
pub fn find_eocd(buf: &[u8]) -> Option<usize> {
    if (buf.len() as u64) < EOCD_LEN {
        return None;
    }
    let last = buf.len() - EOCD_LEN as usize;
    let first = last.saturating_sub(u16::MAX as usize);
    let magic = EOCD_MAGIC.to_le_bytes();
    (first..=last).rev().find(|&i| buf[i..i + 4] == magic)
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

fn read_u16(r: &mut impl Read) -> std::io::Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_le_bytes(b))
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_name(r: &mut impl Read, len: usize) -> std::io::Result<String> {
    let mut b = vec![0u8; len];
    r.read_exact(&mut b)?;
    String::from_utf8(b).map_err(|_| invalid("entry name is not UTF-8"))
}

fn skip(r: &mut impl Read, n: usize) -> std::io::Result<()> {
    let mut b = vec![0u8; n];
    r.read_exact(&mut b)
}
