//! Tracing setup for the `srcstore` binary.
//!
//! Events are appended to `$XDG_STATE_HOME/srcstore/srcstore.log`. Verbosity
//! comes from `SRCSTORE_LOG` (EnvFilter syntax), then `RUST_LOG`, then
//! [`DEFAULT_DIRECTIVES`].

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Target of the fetch lifecycle events (cached, fetching, committed, mismatch).
/// Filter on it to follow what the cache did without backend chatter.
pub const FETCH_TARGET: &str = "srcstore::fetch";

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "SRCSTORE_LOG";

/// Lifecycle at info, backend and store decisions at debug, dependencies at info.
pub const DEFAULT_DIRECTIVES: &[&str] = &[
    "info",
    "srcstore_core=debug",
    "srcstore::fetch=info",
    "srcstore=info",
];

fn default_filter() -> String {
    DEFAULT_DIRECTIVES.join(",")
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter()))
}

/// `$XDG_STATE_HOME/srcstore/srcstore.log`, creating the directory.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("srcstore")?;
    xdg_dirs
        .place_state_file("srcstore.log")
        .context("creating srcstore state directory")
}

/// Log to the state file. Errors (unwritable state dir, subscriber already
/// set) are returned so the caller can fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(target: FETCH_TARGET, path = %path.display(), "logging initialized");
    Ok(())
}

pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init();
}
