use crate::error::{Result, WebpzError};
use crate::read::opened::Opened;

use std::fs;
use std::path::{Path, PathBuf};

/// Writes every entry under `dest`. Same-named entries overwrite earlier ones on disk.
pub fn extract(archive: &Path, dest: &Path) -> Result<usize> {
    let opened = Opened::open(archive)?;
    fs::create_dir_all(dest)?;
    for (idx, ch) in opened.entries.iter().enumerate() {
        let outp = safe_join(dest, &ch.name)?;
        if let Some(parent) = outp.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = opened.read_entry(idx)?;
        fs::write(&outp, &bytes)?;
    }
    Ok(opened.len())
}

fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);
    if p.is_absolute() || rel.contains("../") || rel.contains("..\\") || rel == ".." {
        return Err(WebpzError::Format(format!("unsafe path: {rel}")));
    }
    Ok(root.join(p))
}

/// Decompresses every entry and checks sizes and CRCs. Returns the entry count.
pub fn verify(archive: &Path) -> Result<usize> {
    let opened = Opened::open(archive)?;
    verify_opened(&opened)
}

pub fn verify_opened(opened: &Opened) -> Result<usize> {
    for idx in 0..opened.len() {
        opened.read_entry(idx)?;
    }
    Ok(opened.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_escaping_names() {
        let root = Path::new("/tmp/out");
        assert!(safe_join(root, "../etc/passwd").is_err());
        assert!(safe_join(root, "/etc/passwd").is_err());
        assert_eq!(safe_join(root, "a.webp").unwrap(), root.join("a.webp"));
    }
}
