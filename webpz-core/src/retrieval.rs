// Consumer-facing downloads: one record, or the whole store as an archive.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::diagnostics::{Diagnostic, DiagnosticsBoard};
use crate::error::{Result, WebpzError};
use crate::pack::writer::{PackOptions, build_archive};
use crate::policy::TargetFormat;
use crate::record::ConversionRecord;
use crate::store::ResultStore;

/// Where downloads end up.
pub trait DownloadSink: Send + Sync {
    /// Emits `bytes` under `name`; returns where it landed.
    fn emit(&self, name: &str, bytes: &[u8]) -> Result<String>;
}

/// Writes into a directory; each file appears whole or not at all.
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for FsSink {
    fn emit(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| WebpzError::Format(format!("invalid download name '{name}'")))?;
        let dest = self.dir.join(file_name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| WebpzError::Io(e.error))?;
        Ok(dest.display().to_string())
    }
}

/// Keeps emitted files in memory, in emission order.
#[derive(Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl DownloadSink for MemorySink {
    fn emit(&self, name: &str, bytes: &[u8]) -> Result<String> {
        self.files.lock().push((name.to_string(), bytes.to_vec()));
        Ok(name.to_string())
    }
}

impl<S: DownloadSink + ?Sized> DownloadSink for Arc<S> {
    fn emit(&self, name: &str, bytes: &[u8]) -> Result<String> {
        (**self).emit(name, bytes)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Emitted {
    pub name: String,
    pub location: String,
    pub bytes: u64,
    pub mime: &'static str,
    /// Records included; 1 for single downloads.
    pub entries: usize,
}

pub struct Retrieval {
    store: Arc<ResultStore>,
    sink: Box<dyn DownloadSink>,
    pack: PackOptions,
    format: TargetFormat,
    diagnostics: Arc<DiagnosticsBoard>,
    last_stamp: AtomicI64,
}

impl Retrieval {
    pub fn new(
        store: Arc<ResultStore>,
        sink: Box<dyn DownloadSink>,
        pack: PackOptions,
        format: TargetFormat,
        diagnostics: Arc<DiagnosticsBoard>,
    ) -> Self {
        Self {
            store,
            sink,
            pack,
            format,
            diagnostics,
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn download_one(&self, record: &ConversionRecord) -> Result<Emitted> {
        let location = self.sink.emit(&record.output_name, &record.payload)?;
        info!(file = %record.output_name, bytes = record.size_after, "record downloaded");
        Ok(Emitted {
            name: record.output_name.clone(),
            location,
            bytes: record.size_after,
            mime: record.format.mime(),
            entries: 1,
        })
    }

    /// `Ok(None)` when the store is empty: nothing is built or emitted.
    pub fn download_all(&self) -> Result<Option<Emitted>> {
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return Ok(None);
        }
        let name = self.archive_name();
        let emitted = build_archive(&snapshot, Some(&self.pack)).and_then(|archive| {
            let location = self.sink.emit(&name, archive.as_slice())?;
            Ok((location, archive.len() as u64))
        });
        let (location, bytes) = match emitted {
            Ok(v) => v,
            Err(e) => {
                error!(archive = %name, error = %e, "archive download failed");
                self.diagnostics.set(Diagnostic::ArchiveFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        info!(archive = %name, entries = snapshot.len(), bytes, "archive downloaded");
        Ok(Some(Emitted {
            name,
            location,
            bytes,
            mime: "application/zip",
            entries: snapshot.len(),
        }))
    }

    pub fn download_all_detached(self: &Arc<Self>) -> Result<JoinHandle<Result<Option<Emitted>>>> {
        let this = Arc::clone(self);
        Ok(std::thread::Builder::new()
            .name("webpz-archive".into())
            .spawn(move || this.download_all())?)
    }

    /// `converted_<ext>_<unix_ms>.zip`, strictly increasing within this surface.
    pub fn archive_name(&self) -> String {
        let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        let stamp = loop {
            let next = now_ms.max(prev + 1);
            match self.last_stamp.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break next,
                Err(actual) => prev = actual,
            }
        };
        format!("converted_{}_{stamp}.zip", self.format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieval(sink: Arc<MemorySink>) -> Retrieval {
        Retrieval::new(
            Arc::new(ResultStore::new()),
            Box::new(sink),
            PackOptions::default(),
            TargetFormat::Webp,
            Arc::new(DiagnosticsBoard::new()),
        )
    }

    struct RefusingSink;

    impl DownloadSink for RefusingSink {
        fn emit(&self, _name: &str, _bytes: &[u8]) -> Result<String> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    fn stored_record(store: &ResultStore) {
        use crate::preview::PreviewRegistry;
        use crate::transcode::EncodedImage;

        let encoded = EncodedImage {
            bytes: b"RIFF\0\0\0\0WEBP".to_vec(),
            format: TargetFormat::Webp,
            source_format: image::ImageFormat::Png,
            width: 1,
            height: 1,
            quality: 80.0,
            attempts: 1,
        };
        let previews = PreviewRegistry::new();
        store.append(ConversionRecord::from_encoded("a.png", 64, encoded, &previews));
    }

    #[test]
    fn sink_failure_during_archive_is_an_archive_diagnostic() {
        let store = Arc::new(ResultStore::new());
        stored_record(&store);
        let diagnostics = Arc::new(DiagnosticsBoard::new());
        diagnostics.set(Diagnostic::BatchFailures {
            failed: 1,
            total: 2,
            reasons: Vec::new(),
        });
        let r = Retrieval::new(
            store,
            Box::new(RefusingSink),
            PackOptions::default(),
            TargetFormat::Webp,
            diagnostics.clone(),
        );
        assert!(matches!(r.download_all(), Err(WebpzError::Io(_))));
        match diagnostics.current() {
            Some(Diagnostic::ArchiveFailed { reason }) => assert!(reason.contains("disk full")),
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn emitted_downloads_carry_content_types() {
        let sink = Arc::new(MemorySink::new());
        let r = retrieval(sink.clone());
        stored_record(&r.store);
        let rec = r.store.snapshot().remove(0);
        assert_eq!(r.download_one(&rec).unwrap().mime, "image/webp");
        let all = r.download_all().unwrap().unwrap();
        assert_eq!(all.mime, "application/zip");
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn empty_store_emits_nothing() {
        let sink = Arc::new(MemorySink::new());
        let r = retrieval(sink.clone());
        assert_eq!(r.download_all().unwrap(), None);
        assert!(sink.is_empty());
    }

    #[test]
    fn archive_names_are_unique_and_shaped() {
        let r = retrieval(Arc::new(MemorySink::new()));
        let a = r.archive_name();
        let b = r.archive_name();
        assert_ne!(a, b);
        assert!(a.starts_with("converted_webp_") && a.ends_with(".zip"));
        let ms: i64 = a["converted_webp_".len()..a.len() - 4].parse().unwrap();
        assert!(ms > 1_600_000_000_000);
    }

    #[test]
    fn fs_sink_writes_whole_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path().join("out")).unwrap();
        let loc = sink.emit("a.webp", b"RIFF....WEBP").unwrap();
        assert_eq!(std::fs::read(&loc).unwrap(), b"RIFF....WEBP");
        // overwrite keeps a single file
        sink.emit("a.webp", b"second").unwrap();
        assert_eq!(std::fs::read(&loc).unwrap(), b"second");
        let count = std::fs::read_dir(sink.dir()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn fs_sink_strips_directories_from_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path()).unwrap();
        let loc = sink.emit("../escape.webp", b"x").unwrap();
        assert_eq!(PathBuf::from(loc), dir.path().join("escape.webp"));
    }
}
