// Input boundary: allow-list screening and file collection.
//
// Screening happens before anything reaches the transcoder, so a rejected
// file here is a `TranscodeError::UnacceptedInputType`, not an
// in-pipeline `UnsupportedFormat`.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, TranscodeError};

pub const ACCEPTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];
pub const ACCEPTED_MIME_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/bmp",
    "image/webp",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Declared content type, when the boundary supplies one.
    pub mime: Option<String>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Extension must be allow-listed; a declared MIME type must be too.
    pub fn is_accepted(&self) -> bool {
        is_accepted_name(&self.name) && self.mime.as_deref().is_none_or(is_accepted_mime)
    }
}

#[derive(Debug, Default)]
pub struct Screened {
    pub accepted: Vec<InputFile>,
    pub rejected: Vec<(String, TranscodeError)>,
}

pub fn is_accepted_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|a| a.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

pub fn is_accepted_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim();
    ACCEPTED_MIME_TYPES
        .iter()
        .any(|a| a.eq_ignore_ascii_case(essence))
}

/// Splits a batch by extension and declared MIME; order within each side is preserved.
pub fn screen(inputs: Vec<InputFile>) -> Screened {
    let mut out = Screened::default();
    for input in inputs {
        if input.is_accepted() {
            out.accepted.push(input);
        } else {
            let err = TranscodeError::UnacceptedInputType(input.name.clone());
            out.rejected.push((input.name, err));
        }
    }
    out
}

/// Reads files, descending into directories. Sorted per root for a stable batch order.
pub fn collect_paths(roots: &[PathBuf]) -> Result<Vec<InputFile>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for root in roots {
        let mut found = Vec::new();
        for e in WalkDir::new(root).follow_links(false) {
            let e = e.map_err(std::io::Error::other)?;
            if e.file_type().is_file() {
                found.push(e.path().to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }
    files
        .into_iter()
        .map(|p| {
            let bytes = fs::read(&p)?;
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string());
            Ok(InputFile::new(name, bytes))
        })
        .collect()
}
