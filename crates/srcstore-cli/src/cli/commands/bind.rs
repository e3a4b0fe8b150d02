//! `srcstore bind` – bind-mount pair for the build sandbox.

use anyhow::{bail, Context, Result};
use srcstore_core::config::StoreConfig;
use srcstore_core::SourceDescriptor;
use std::path::Path;

pub fn run_bind(cfg: &StoreConfig, uri: &str, hash: &str, rootfs: &Path) -> Result<()> {
    let source = SourceDescriptor::new(uri, hash, false).context("invalid source")?;
    if source.validator().is_empty() {
        bail!("a hash is required to locate a cached source");
    }
    let bind = source.bind_configuration(&cfg.source_dir, rootfs);
    if !bind.source.is_file() {
        tracing::warn!(path = %bind.source.display(), "source is not cached yet");
    }
    println!("{}\t{}", bind.source.display(), bind.target.display());
    Ok(())
}
