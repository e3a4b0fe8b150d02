//! `srcstore fetch` – download a source into the cache.

use anyhow::{Context, Result};
use srcstore_core::config::StoreConfig;
use srcstore_core::progress::{ProgressObserver, TransferProgress};
use srcstore_core::{FetchOutcome, Fetcher, SourceDescriptor};
use std::sync::{Arc, Mutex};
use std::time::Instant;

const PROGRESS_INTERVAL_MS: u64 = 500;

pub fn run_fetch(cfg: &StoreConfig, uri: &str, hash: &str, legacy: bool) -> Result<()> {
    let source = SourceDescriptor::new(uri, hash, legacy).context("invalid source")?;
    let fetcher = Fetcher::new(cfg).with_observer(Arc::new(StderrProgress::new()));

    let outcome = fetcher
        .fetch(&source)
        .with_context(|| format!("fetching {}", source.identifier()))?;
    match &outcome {
        FetchOutcome::Cached { path } => {
            println!("cached\t{}", path.display());
        }
        FetchOutcome::Fetched {
            path,
            legacy_alias,
            ..
        } => {
            println!("fetched\t{}", path.display());
            if let Some(sha1) = legacy_alias {
                tracing::info!("legacy alias {} created", sha1);
            }
        }
    }
    Ok(())
}

/// Line-based progress on stderr, at most one line per interval.
struct StderrProgress {
    started: Instant,
    last_print: Mutex<Option<Instant>>,
}

impl StderrProgress {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_print: Mutex::new(None),
        }
    }
}

impl ProgressObserver for StderrProgress {
    fn on_start(&self, name: &str, total_bytes: Option<u64>) {
        match total_bytes {
            Some(total) => eprintln!(
                "downloading {} ({:.1} MiB)",
                name,
                total as f64 / 1_048_576.0
            ),
            None => eprintln!("downloading {}", name),
        }
    }

    fn on_progress(&self, progress: TransferProgress) {
        let now = Instant::now();
        let Ok(mut last) = self.last_print.lock() else {
            return;
        };
        let due = last
            .map(|t| now.duration_since(t).as_millis() as u64 >= PROGRESS_INTERVAL_MS)
            .unwrap_or(true);
        if !due {
            return;
        }
        *last = Some(now);

        let done_mib = progress.bytes_done as f64 / 1_048_576.0;
        let elapsed = now.duration_since(self.started).as_secs_f64();
        let rate_mib = if elapsed > 0.0 { done_mib / elapsed } else { 0.0 };
        match (progress.total_bytes, progress.fraction()) {
            (Some(total), Some(fraction)) => eprintln!(
                "  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s",
                done_mib,
                total as f64 / 1_048_576.0,
                fraction * 100.0,
                rate_mib
            ),
            _ => eprintln!("  {:.1} MiB  {:.2} MiB/s", done_mib, rate_mib),
        }
    }

    fn on_finish(&self, bytes: u64) {
        eprintln!(
            "  done: {:.1} MiB in {:.1}s",
            bytes as f64 / 1_048_576.0,
            self.started.elapsed().as_secs_f64()
        );
    }
}
