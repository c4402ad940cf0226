//! sqcb-unpacker - extracts the files packed in SQCB banks

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;

use cli::Args;
use config::Config;
use sqcb::{TagWidth, DEFAULT_BUFFER_SIZE};

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "sqcb=debug,sqcb_unpacker=debug"
    } else {
        "sqcb=info,sqcb_unpacker=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .merge(&args);
    tracing::debug!(?config, "resolved configuration");

    let tag_width = if config.wide_tags {
        TagWidth::Wide
    } else {
        TagWidth::Narrow
    };

    let banks = commands::collect_banks(&args.paths)?;
    if banks.is_empty() {
        tracing::warn!("No .{} files found", sqcb::EXTENSION);
        return Ok(());
    }

    if args.list {
        let failed = commands::list_banks(&banks, tag_width, args.json, config.keep_going)?;
        if failed > 0 {
            bail!("{} of {} banks could not be read", failed, banks.len());
        }
        return Ok(());
    }

    if let Some(output) = &args.output {
        std::fs::create_dir_all(output)
            .with_context(|| format!("Failed to create output directory {}", output.display()))?;
    }

    let options = commands::Options {
        output: args.output.as_deref(),
        tag_width,
        buffer_size: config.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
        keep_going: config.keep_going,
    };
    let summary = commands::unpack_banks(&banks, &options)?;

    tracing::info!(
        "Extracted {} entries from {} banks",
        summary.entries,
        summary.banks
    );
    if summary.failed > 0 {
        bail!("{} of {} banks failed", summary.failed, banks.len());
    }

    Ok(())
}
