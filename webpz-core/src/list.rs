use crate::codec::CodecId;
use crate::domain::EntryRow;
use crate::error::Result;
use crate::read::opened::Opened;
use std::path::Path;

pub fn list(archive: &Path) -> Result<Vec<EntryRow>> {
    let opened = Opened::open(archive)?;
    Ok(rows(&opened))
}

pub fn rows(opened: &Opened) -> Vec<EntryRow> {
    opened
        .entries
        .iter()
        .map(|ch| EntryRow {
            name: ch.name.clone(),
            method: CodecId::from_method(ch.method)
                .map(CodecId::name)
                .unwrap_or("unknown"),
            u_size: ch.u_size as u64,
            c_size: ch.c_size as u64,
            crc32: ch.crc32,
        })
        .collect()
}
