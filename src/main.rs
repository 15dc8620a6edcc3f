//! CLI entry point for dlfetch.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use clap::Parser;
use dlfetch::{DownloadRequest, Fetcher, FetcherConfig, Monitor, ProgressMonitor};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so --json output on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let urls = if !args.urls.is_empty() {
        args.urls.clone()
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        parse_url_lines(&buffer)
    } else {
        info!("No input provided. Pass URLs as arguments or pipe them via stdin.");
        info!("Example: echo 'https://example.com/file.pdf' | dlfetch");
        return Ok(());
    };

    if urls.is_empty() {
        info!("No URLs found in input");
        return Ok(());
    }

    let monitor = Arc::new(ProgressMonitor::new());
    let failed = Arc::new(AtomicUsize::new(0));
    let failed_in_callback = Arc::clone(&failed);

    let fetcher = Fetcher::new(
        FetcherConfig::default()
            .with_max_workers(usize::from(args.workers))
            .with_target_dir(&args.output_dir)
            .with_overwrite(args.overwrite)
            .with_monitor(monitor.clone())
            .with_on_complete(|result| {
                info!(
                    id = result.id,
                    path = %result.path.display(),
                    mime_type = %result.mime_type,
                    "Downloaded"
                );
            })
            .with_on_error(move |request, error| {
                failed_in_callback.fetch_add(1, Ordering::SeqCst);
                warn!(id = request.id, url = %request.url, error = %error, "Download failed");
            }),
    )?;

    let mut signal = monitor.change_signal();

    let requests = urls
        .into_iter()
        .zip(1_u64..)
        .map(|(url, id)| DownloadRequest::new(id, url))
        .collect();
    let mut rejected = 0;
    let mut queued = 0;
    for outcome in fetcher.enqueue_many(requests).await {
        match outcome.error {
            Some(error) if !outcome.queued => {
                rejected += 1;
                warn!(url = %outcome.request.url, error = %error, "Skipped request");
            }
            _ => queued += 1,
        }
    }

    info!(queued, rejected, target_dir = %fetcher.target_dir().display(), "Starting downloads");
    fetcher.start()?;

    if queued > 0 {
        while signal.changed().await {
            let snapshot = monitor.snapshot();
            if args.json {
                println!("{}", serde_json::to_string(&snapshot)?);
            }
            if snapshot.count.all_finished() {
                break;
            }
        }
    }

    fetcher.stop().await;

    let count = monitor.snapshot().count;
    let failed = failed.load(Ordering::SeqCst);
    info!(
        completed = count.completed,
        failed,
        rejected,
        total = count.total,
        "Download complete"
    );

    if failed + rejected > 0 {
        bail!("{} of {} downloads did not complete", failed + rejected, queued + rejected);
    }
    Ok(())
}

/// One URL per line; blank lines and `#` comments are skipped.
fn parse_url_lines(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
