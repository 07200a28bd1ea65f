pub mod handlers;

use crate::logging;
use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use webpz_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);
    match cli.command {
        Commands::Convert {
            inputs,
            out,
            config,
            max_mb,
            max_dim,
            format,
            quality,
            workers,
            archive,
            deterministic,
            no_singles,
        } => handlers::handle_convert(handlers::ConvertArgs {
            inputs,
            out,
            config,
            max_mb,
            max_dim,
            format,
            quality,
            workers,
            archive,
            deterministic,
            singles: !no_singles,
        }),
        Commands::List { archive } => handlers::handle_list(archive),
        Commands::Extract { archive, dest } => handlers::handle_extract(archive, dest),
        Commands::Verify { archive } => handlers::handle_verify(archive),
    }
}
