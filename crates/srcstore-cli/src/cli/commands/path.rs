//! `srcstore path` – canonical location of a source and whether it is cached.

use anyhow::{Context, Result};
use srcstore_core::config::StoreConfig;
use srcstore_core::{ContentStore, SourceDescriptor};

pub fn run_path(cfg: &StoreConfig, uri: &str, hash: &str) -> Result<()> {
    let source = SourceDescriptor::new(uri, hash, false).context("invalid source")?;
    let store = ContentStore::new(&cfg.source_dir);
    let path = store.canonical_path(source.validator(), source.file_name());
    let state = if store.exists(source.validator(), source.file_name()) {
        "cached"
    } else {
        "missing"
    };
    println!("{}\t{}", path.display(), state);
    Ok(())
}
