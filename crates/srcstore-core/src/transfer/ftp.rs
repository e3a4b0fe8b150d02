//! FTP backend: login, LIST the path, RETR it, quit.
//!
//! The LIST must name exactly one entry; anything else means the path is a
//! directory, a glob or missing, and nothing is downloaded. The listed size
//! seeds the progress total.

use super::{display_name, TransferOptions};
use crate::error::FetchError;
use crate::progress::{ProgressObserver, ProgressTracker, ProgressWriter};
use crate::source::decoded_path;
use crate::store::create_truncated;
use percent_encoding::percent_decode_str;
use std::io::{self, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_PORT: u16 = 21;
const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Userinfo from the URL. No user means anonymous/anonymous; a user
    /// without a password logs in with an empty one.
    pub fn from_url(url: &Url) -> Self {
        let user = decode(url.username());
        if user.is_empty() {
            return Self {
                user: ANONYMOUS.to_string(),
                password: ANONYMOUS.to_string(),
            };
        }
        let password = url.password().map(decode).unwrap_or_default();
        Self { user, password }
    }
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// `host:port` to dial; the port defaults to 21.
pub fn remote_address(url: &Url) -> Result<String, FetchError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| FetchError::invalid_uri(url.as_str(), "FTP URI has no host"))?;
    let port = url.port_or_known_default().unwrap_or(DEFAULT_PORT);
    Ok(format!("{}:{}", host, port))
}

/// One line of a LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub raw: String,
    /// Size parsed from the listing, when the server's format is recognised.
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn parse(raw: &str) -> Self {
        let size = suppaftp::list::File::from_str(raw)
            .ok()
            .map(|f| f.size() as u64);
        Self {
            raw: raw.to_string(),
            size,
        }
    }
}

/// The FTP commands the download needs, in the order it issues them.
pub trait FtpSession {
    fn login(&mut self, credentials: &Credentials) -> Result<(), FetchError>;
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, FetchError>;
    /// RETR `path` into `sink`. Returns the bytes copied.
    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
    fn quit(&mut self) -> Result<(), FetchError>;
}

/// [`FtpSession`] over a real control connection.
pub struct SuppaSession {
    stream: suppaftp::FtpStream,
    url: String,
}

impl SuppaSession {
    pub fn connect(url: &Url, options: &TransferOptions) -> Result<Self, FetchError> {
        let url_str = url.as_str();
        let address = remote_address(url)?;
        let addrs: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|e| FetchError::from_network_io(url_str, e))?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match suppaftp::FtpStream::connect_timeout(addr, options.ftp_timeout) {
                Ok(stream) => {
                    stream
                        .get_ref()
                        .set_read_timeout(Some(options.ftp_timeout))
                        .map_err(|e| FetchError::from_network_io(url_str, e))?;
                    tracing::debug!(%addr, "FTP control connection established");
                    return Ok(Self {
                        stream,
                        url: url_str.to_string(),
                    });
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "FTP connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(match last_err {
            Some(e) => FetchError::from_ftp(url_str, None, e),
            None => FetchError::from_network_io(
                url_str,
                io::Error::new(io::ErrorKind::NotFound, format!("{} resolved to no address", address)),
            ),
        })
    }
}

impl FtpSession for SuppaSession {
    fn login(&mut self, credentials: &Credentials) -> Result<(), FetchError> {
        self.stream
            .login(&credentials.user, &credentials.password)
            .map_err(|e| FetchError::from_ftp(&self.url, Some(&credentials.user), e))?;
        self.stream
            .transfer_type(suppaftp::types::FileType::Binary)
            .map_err(|e| FetchError::from_ftp(&self.url, None, e))
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, FetchError> {
        let lines = self
            .stream
            .list(Some(path))
            .map_err(|e| FetchError::from_ftp(&self.url, None, e))?;
        Ok(lines
            .iter()
            .map(|l| l.trim_end())
            .filter(|l| !l.is_empty())
            .map(RemoteEntry::parse)
            .collect())
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        let mut data = self
            .stream
            .retr_as_stream(path)
            .map_err(|e| FetchError::from_ftp(&self.url, None, e))?;
        let copied =
            io::copy(&mut data, sink).map_err(|e| FetchError::from_network_io(&self.url, e))?;
        self.stream
            .finalize_retr_stream(data)
            .map_err(|e| FetchError::from_ftp(&self.url, None, e))?;
        Ok(copied)
    }

    fn quit(&mut self) -> Result<(), FetchError> {
        self.stream
            .quit()
            .map_err(|e| FetchError::from_ftp(&self.url, None, e))
    }
}

/// Connect to the server named by `url` and download its path to `destination`.
pub fn download(
    url: &Url,
    destination: &Path,
    options: &TransferOptions,
    observer: &dyn ProgressObserver,
) -> Result<u64, FetchError> {
    let mut session = SuppaSession::connect(url, options)?;
    fetch_with_session(&mut session, url, destination, observer)
}

/// Run the LIST/RETR sequence on an open session. `quit` is sent whatever
/// the outcome; a failed quit is logged and does not change the result.
pub fn fetch_with_session(
    session: &mut dyn FtpSession,
    url: &Url,
    destination: &Path,
    observer: &dyn ProgressObserver,
) -> Result<u64, FetchError> {
    let result = run_session(session, url, destination, observer);
    if let Err(e) = session.quit() {
        tracing::warn!(url = %url, error = %e, "FTP quit failed");
    }
    result
}

fn run_session(
    session: &mut dyn FtpSession,
    url: &Url,
    destination: &Path,
    observer: &dyn ProgressObserver,
) -> Result<u64, FetchError> {
    let credentials = Credentials::from_url(url);
    let path = decoded_path(url)
        .ok_or_else(|| FetchError::invalid_uri(url.as_str(), "FTP path is not valid UTF-8"))?;

    session.login(&credentials)?;
    tracing::info!(user = %credentials.user, %path, "FTP logged in");

    let entries = session.list(&path)?;
    if entries.len() != 1 {
        return Err(FetchError::AmbiguousRemoteFile {
            path,
            found: entries.len(),
        });
    }
    let size = entries[0].size;
    tracing::debug!(%path, ?size, "FTP listing");

    let tracker = ProgressTracker::new(observer);
    tracker.start(&display_name(destination), size);
    let file = create_truncated(destination)?;
    let mut sink = ProgressWriter::new(file, &tracker);

    if let Err(e) = session.retrieve(&path, &mut sink) {
        return Err(match sink.take_error() {
            Some(io_err) => FetchError::io(destination, io_err),
            None => e,
        });
    }
    sink.flush().map_err(|e| FetchError::io(destination, e))?;
    sink.get_ref()
        .sync_all()
        .map_err(|e| FetchError::io(destination, e))?;

    let written = tracker.bytes_done();
    if let Some(expected) = size {
        if written != expected {
            return Err(FetchError::PartialTransfer {
                expected,
                received: written,
            });
        }
    }
    tracker.finish();
    Ok(written)
}
