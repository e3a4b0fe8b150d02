//! Protocol backends that move one remote file into a local destination.
//!
//! Selection is a pure function of the URI scheme: `ftp` goes to the FTP
//! backend, everything else to libcurl, which also reports unsupported
//! schemes from its own connection attempt.

pub mod ftp;
pub mod generic;

use crate::config::TransferConfig;
use crate::error::FetchError;
use crate::progress::ProgressObserver;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Runtime transfer settings, converted from [`TransferConfig`].
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub connect_timeout: Duration,
    pub ftp_timeout: Duration,
    pub max_redirections: u32,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub user_agent: String,
}

pub fn default_user_agent() -> String {
    format!("srcstore/{}", env!("CARGO_PKG_VERSION"))
}

impl From<&TransferConfig> for TransferOptions {
    fn from(cfg: &TransferConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            ftp_timeout: Duration::from_secs(cfg.ftp_timeout_secs),
            max_redirections: cfg.max_redirections,
            low_speed_limit: cfg.low_speed_limit,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            user_agent: cfg
                .user_agent
                .clone()
                .unwrap_or_else(default_user_agent),
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// libcurl: http, https and whatever else the linked libcurl understands.
    Generic,
    Ftp,
}

impl Backend {
    /// Total mapping from scheme to backend; never fails.
    pub fn select(scheme: &str) -> Self {
        if scheme.eq_ignore_ascii_case("ftp") {
            Backend::Ftp
        } else {
            Backend::Generic
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Generic => "generic",
            Backend::Ftp => "ftp",
        }
    }

    /// Write the complete remote file to `destination`, truncating whatever
    /// was there. Returns the number of bytes written.
    pub fn fetch(
        self,
        url: &Url,
        destination: &Path,
        options: &TransferOptions,
        observer: &dyn ProgressObserver,
    ) -> Result<u64, FetchError> {
        match self {
            Backend::Generic => generic::download(url, destination, options, observer),
            Backend::Ftp => ftp::download(url, destination, options, observer),
        }
    }
}

/// Label shown to progress observers: the destination's file name.
pub(crate) fn display_name(destination: &Path) -> String {
    destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
