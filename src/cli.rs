//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use dlfetch::download::{DEFAULT_MAX_WORKERS, DEFAULT_TARGET_DIR};

/// Download files concurrently with live progress tracking.
///
/// URLs come from the arguments, or one per line on stdin when none are
/// given. Each file is written under the output directory and only appears
/// there once it is complete.
#[derive(Parser, Debug)]
#[command(name = "dlfetch")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download
    pub urls: Vec<String>,

    /// Directory to save downloaded files
    #[arg(short, long, default_value = DEFAULT_TARGET_DIR)]
    pub output_dir: PathBuf,

    /// Number of concurrent download workers (1-100)
    #[arg(short, long, default_value_t = DEFAULT_MAX_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: u8,

    /// Replace files that already exist in the output directory
    #[arg(long)]
    pub overwrite: bool,

    /// Print every progress snapshot to stdout as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
