use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Transfer tuning (optional `[transfer]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Upper bound on connection establishment for HTTP-family transfers, in seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound on connecting to an FTP server, in seconds.
    pub ftp_timeout_secs: u64,
    /// Maximum number of redirects followed by the generic backend.
    pub max_redirections: u32,
    /// Abort when throughput stays below this many bytes/sec for `low_speed_time_secs`.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// User-Agent sent by the generic backend; defaults to `srcstore/<version>`.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 300,
            ftp_timeout_secs: 120,
            max_redirections: 10,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            user_agent: None,
        }
    }
}

/// What to do when a downloaded file does not hash to the expected validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyPolicy {
    /// Log a warning and commit under the computed hash anyway.
    #[default]
    Warn,
    /// Refuse to commit; the staged file stays for inspection.
    Strict,
}

/// Global configuration loaded from `~/.config/srcstore/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Content root: one directory per SHA-256, plus legacy SHA-1 links.
    pub source_dir: PathBuf,
    /// Flat directory holding in-flight downloads.
    pub staging_dir: PathBuf,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub verify: VerifyPolicy,
}

impl StoreConfig {
    /// Config with `sources/` and `staging/` under a single directory.
    pub fn with_root(root: &Path) -> Self {
        Self {
            source_dir: root.join("sources"),
            staging_dir: root.join("staging"),
            transfer: TransferConfig::default(),
            verify: VerifyPolicy::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("srcstore")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default cache layout: `~/.cache/srcstore/{sources,staging}`.
pub fn default_config() -> Result<StoreConfig> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("srcstore")?;
    let sources = xdg_dirs.place_cache_file("sources")?;
    let root = sources
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(StoreConfig::with_root(&root))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<StoreConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = default_config()?;
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: StoreConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_root_layout() {
        let cfg = StoreConfig::with_root(Path::new("/var/lib/builder"));
        assert_eq!(cfg.source_dir, Path::new("/var/lib/builder/sources"));
        assert_eq!(cfg.staging_dir, Path::new("/var/lib/builder/staging"));
        assert_eq!(cfg.verify, VerifyPolicy::Warn);
        assert_eq!(cfg.transfer.connect_timeout_secs, 300);
        assert_eq!(cfg.transfer.ftp_timeout_secs, 120);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = StoreConfig::with_root(Path::new("/tmp/srcstore"));
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: StoreConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.source_dir, cfg.source_dir);
        assert_eq!(parsed.staging_dir, cfg.staging_dir);
        assert_eq!(parsed.transfer.max_redirections, cfg.transfer.max_redirections);
        assert_eq!(parsed.verify, cfg.verify);
    }

    #[test]
    fn config_toml_minimal() {
        let toml = r#"
            source_dir = "/srv/sources"
            staging_dir = "/srv/staging"
        "#;
        let cfg: StoreConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.source_dir, Path::new("/srv/sources"));
        assert_eq!(cfg.transfer.low_speed_limit, 1024);
        assert!(cfg.transfer.user_agent.is_none());
        assert_eq!(cfg.verify, VerifyPolicy::Warn);
    }

    #[test]
    fn config_toml_transfer_and_verify() {
        let toml = r#"
            source_dir = "/srv/sources"
            staging_dir = "/srv/staging"
            verify = "strict"

            [transfer]
            connect_timeout_secs = 20
            ftp_timeout_secs = 30
            max_redirections = 3
            low_speed_limit = 512
            low_speed_time_secs = 15
            user_agent = "builder 1.0"
        "#;
        let cfg: StoreConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.verify, VerifyPolicy::Strict);
        assert_eq!(cfg.transfer.connect_timeout_secs, 20);
        assert_eq!(cfg.transfer.ftp_timeout_secs, 30);
        assert_eq!(cfg.transfer.max_redirections, 3);
        assert_eq!(cfg.transfer.low_speed_limit, 512);
        assert_eq!(cfg.transfer.low_speed_time_secs, 15);
        assert_eq!(cfg.transfer.user_agent.as_deref(), Some("builder 1.0"));
    }
}
