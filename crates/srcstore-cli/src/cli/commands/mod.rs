//! CLI command handlers, one per file.

mod bind;
mod checksum;
mod fetch;
mod path;

pub use bind::run_bind;
pub use checksum::run_checksum;
pub use fetch::run_fetch;
pub use path::run_path;
