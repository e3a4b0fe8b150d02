//! File name extraction from a source URL path.

use percent_encoding::percent_decode_str;
use url::Url;

/// Extracts the last non-empty path segment, percent-decoded.
///
/// Returns `None` when the URL has no hierarchical path, the path is empty or
/// root, or the decoded segment could not be used as a single file name
/// (`.`, `..`, embedded `/` or NUL, invalid UTF-8).
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    if decoded == "." || decoded == ".." || decoded.contains(|c: char| c == '/' || c == '\0') {
        return None;
    }
    Some(decoded.into_owned())
}

/// The URL path, percent-decoded, as sent to servers that take literal paths (FTP).
pub fn decoded_path(url: &Url) -> Option<String> {
    percent_decode_str(url.path())
        .decode_utf8()
        .ok()
        .map(|p| p.into_owned())
}
