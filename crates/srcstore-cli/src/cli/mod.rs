//! CLI for the srcstore source cache.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use srcstore_core::checksum::HashAlgorithm;
use srcstore_core::config::{self, VerifyPolicy};
use std::path::PathBuf;

use commands::{run_bind, run_checksum, run_fetch, run_path};

/// Top-level CLI for the srcstore source cache.
#[derive(Debug, Parser)]
#[command(name = "srcstore")]
#[command(about = "srcstore: content-addressed cache for package build sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a source into the cache unless it is already there.
    Fetch {
        /// Source URI (http, https, ftp, ...).
        uri: String,
        /// Expected SHA-256 (or SHA-1 with --legacy). May be empty.
        hash: String,
        /// The hash is a SHA-1; also link the entry under it.
        #[arg(long)]
        legacy: bool,
        /// Fail instead of warning when the download does not match the hash.
        #[arg(long)]
        strict: bool,
    },

    /// Print where a source is cached and whether it is present.
    Path {
        uri: String,
        hash: String,
    },

    /// Print the bind-mount pair for a cached source inside a build root.
    Bind {
        uri: String,
        hash: String,
        /// Root filesystem of the build sandbox.
        rootfs: PathBuf,
    },

    /// Compute the digest of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// sha256 (default) or sha1.
        #[arg(long, default_value = "sha256")]
        algorithm: HashAlgorithm,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                uri,
                hash,
                legacy,
                strict,
            } => {
                if strict {
                    cfg.verify = VerifyPolicy::Strict;
                }
                run_fetch(&cfg, &uri, &hash, legacy)?;
            }
            CliCommand::Path { uri, hash } => run_path(&cfg, &uri, &hash)?,
            CliCommand::Bind { uri, hash, rootfs } => run_bind(&cfg, &uri, &hash, &rootfs)?,
            CliCommand::Checksum { path, algorithm } => run_checksum(&path, algorithm)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
