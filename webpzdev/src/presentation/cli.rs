use clap::{Parser, Subcommand};
use std::path::PathBuf;

use webpz_core::TargetFormat;

#[derive(Parser)]
#[command(author, version, about = "webpzdev: batch image compressor", long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert images (files or directories) and write the results
    Convert {
        inputs: Vec<PathBuf>,

        /// Output directory for converted files and archives
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// JSON config; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Soft output size cap in megabytes
        #[arg(long)]
        max_mb: Option<f64>,

        /// Longer-edge cap in pixels
        #[arg(long)]
        max_dim: Option<u32>,

        /// webp or jpeg
        #[arg(long)]
        format: Option<TargetFormat>,

        /// Starting encoder quality (1-100)
        #[arg(long)]
        quality: Option<f32>,

        /// Concurrent transcodes (defaults to logical cores)
        #[arg(long)]
        workers: Option<usize>,

        /// Also bundle every result into one zip
        #[arg(long)]
        archive: bool,

        /// Fixed timestamps inside the zip
        #[arg(long)]
        deterministic: bool,

        /// Skip writing individual converted files
        #[arg(long)]
        no_singles: bool,
    },

    /// List zip contents
    List { archive: PathBuf },

    /// Extract zip to destination
    Extract { archive: PathBuf, dest: PathBuf },

    /// Verify every entry's CRC
    Verify { archive: PathBuf },
}
