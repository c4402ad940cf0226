//! CLI argument definitions for sqcb-unpacker

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sqcb-unpacker")]
#[command(about = "Unpacks SQCB banks, or every SQCB bank below a directory")]
#[command(version)]
pub struct Args {
    /// Bank files or directories to search recursively for *.sqcb
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Extract into DIR/<bank name> instead of next to each bank
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print each bank's record table instead of extracting
    #[arg(short, long)]
    pub list: bool,

    /// Print the record table as JSON (with --list)
    #[arg(long, requires = "list")]
    pub json: bool,

    /// Header and version tags are stored as 16-bit characters
    #[arg(long)]
    pub wide_tags: bool,

    /// Copy buffer size in bytes
    #[arg(long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,

    /// Report a failed bank and continue with the next one
    #[arg(short, long)]
    pub keep_going: bool,

    /// Config file (default: <config dir>/sqcb/config.toml)
    #[arg(long, env = "SQCB_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
