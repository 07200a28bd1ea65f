use std::path::PathBuf;

use tracing::info;
use webpz_core::domain::RecordRow;
use webpz_core::error::{Result, WebpzError};
use webpz_core::{
    Config, FsSink, Session, TargetFormat, collect_paths, extract, list, verify,
};

pub struct ConvertArgs {
    pub inputs: Vec<PathBuf>,
    pub out: PathBuf,
    pub config: Option<PathBuf>,
    pub max_mb: Option<f64>,
    pub max_dim: Option<u32>,
    pub format: Option<TargetFormat>,
    pub quality: Option<f32>,
    pub workers: Option<usize>,
    pub archive: bool,
    pub deterministic: bool,
    pub singles: bool,
}

/// File config first, then flag overrides.
pub fn resolve_config(args: &ConvertArgs) -> Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(mb) = args.max_mb {
        cfg.policy.max_output_megabytes = mb;
    }
    if let Some(px) = args.max_dim {
        cfg.policy.max_dimension_px = px;
    }
    if let Some(f) = args.format {
        cfg.policy.target_format = f;
    }
    if let Some(q) = args.quality {
        cfg.policy.initial_quality = q;
        cfg.policy.min_quality = cfg.policy.min_quality.min(q);
    }
    if args.workers.is_some() {
        cfg.workers = args.workers;
    }
    if args.deterministic {
        cfg.pack.deterministic = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// One result-table line: names, sizes, dimensions, encoder settings, fingerprint.
pub fn format_row(row: &RecordRow) -> String {
    format!(
        "{:<32} -> {:<32} {:>10} -> {:>10} ({:>5.1}%)  {}x{}  q={:.0} tries={}  {}",
        row.original_name,
        row.output_name,
        row.size_before,
        row.size_after,
        row.ratio * 100.0,
        row.dims.0,
        row.dims.1,
        row.quality,
        row.attempts,
        row.digest
    )
}

pub fn handle_convert(args: ConvertArgs) -> Result<()> {
    if args.inputs.is_empty() {
        return Err(WebpzError::Config("no inputs given".into()));
    }
    let cfg = resolve_config(&args)?;
    let files = collect_paths(&args.inputs)?;
    info!(files = files.len(), "collected inputs");

    let session = Session::new(cfg, Box::new(FsSink::new(&args.out)?))?;
    let report = session.submit_files(files);

    for item in &report.items {
        match &item.result {
            Ok(rec) => println!("{}", format_row(&RecordRow::from(rec))),
            Err(e) => println!("{:<32} !! {e}", item.name),
        }
    }

    if args.singles {
        for rec in report.records() {
            session.download_one(rec)?;
        }
    }
    if args.archive {
        if let Some(emitted) = session.download_all()? {
            eprintln!(
                "archive: {} ({} entries, {} bytes)",
                emitted.location, emitted.entries, emitted.bytes
            );
        }
    }

    let stats = session.stats();
    eprintln!(
        "converted {}/{}: {} -> {} bytes (ratio {:.2}, saved {})",
        stats.files,
        report.total(),
        stats.bytes_before,
        stats.bytes_after,
        stats.compression_ratio,
        stats.saved_bytes
    );
    if let Some(d) = session.diagnostic() {
        eprintln!("warning: {}", d.message());
    }
    Ok(())
}

pub fn handle_list(archive: PathBuf) -> Result<()> {
    for r in list(&archive)? {
        println!(
            "{:<8} u={:<10} c={:<10} crc={:08x} {}",
            r.method, r.u_size, r.c_size, r.crc32, r.name
        );
    }
    Ok(())
}

pub fn handle_extract(archive: PathBuf, dest: PathBuf) -> Result<()> {
    let n = extract(&archive, &dest)?;
    eprintln!("extract: {n} entries -> {}", dest.display());
    Ok(())
}

pub fn handle_verify(archive: PathBuf) -> Result<()> {
    let n = verify(&archive)?;
    eprintln!("verify: OK ({n} entries)");
    Ok(())
}
