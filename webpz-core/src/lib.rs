#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod policy;

pub mod intake;
pub mod transcode;

pub mod preview;
pub mod record;
pub mod store;

pub mod batch;
pub mod diagnostics;

pub mod codec;

pub mod container {
    pub mod zip;
}

pub mod pack {
    pub mod writer;
}

pub mod read {
    pub mod extract;
    pub mod opened;
}

pub mod domain;
pub mod list;
pub mod retrieval;
pub mod session;
pub mod stats;

// Re-exports: stable API surface
pub use batch::{BatchCoordinator, BatchHandle, BatchItem, BatchReport, CancelToken};
pub use config::Config;
pub use error::{Result, TranscodeError, WebpzError};
pub use intake::{InputFile, collect_paths, screen};
pub use list::list;
pub use pack::writer::{ArchiveBytes, ArchiveMethod, PackOptions, build_archive};
pub use policy::{Policy, TargetFormat};
pub use read::extract::{extract, verify};
pub use record::ConversionRecord;
pub use retrieval::{DownloadSink, Emitted, FsSink, MemorySink, Retrieval};
pub use session::Session;
pub use stats::Stats;
pub use store::ResultStore;
pub use transcode::{EncodedImage, transcode};
