//! Content-addressed cache of upstream build sources.
//!
//! A [`SourceDescriptor`] names an artifact by URI and expected hash; a
//! [`Fetcher`] downloads it once into `<root>/<sha256>/<file_name>` and
//! answers every later request from disk.

pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod progress;
pub mod source;
pub mod store;
pub mod transfer;

pub use error::{ErrorKind, FetchError};
pub use fetch::{FetchOutcome, Fetcher, NetworkTransport, Transport};
pub use source::{BindConfiguration, SourceDescriptor};
pub use store::ContentStore;
