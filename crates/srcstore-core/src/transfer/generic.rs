//! Single-stream GET through libcurl.
//!
//! Writes the response body sequentially to the destination. The total size
//! is learned from curl's progress callback once the server announces it.

use super::{display_name, TransferOptions};
use crate::error::FetchError;
use crate::progress::{ProgressObserver, ProgressTracker, ProgressWriter};
use crate::store::create_truncated;
use std::io::Write;
use std::path::Path;
use url::Url;

/// Downloads `url` with one GET (following redirects), writing sequentially
/// to `destination`. Returns the number of bytes written.
pub fn download(
    url: &Url,
    destination: &Path,
    options: &TransferOptions,
    observer: &dyn ProgressObserver,
) -> Result<u64, FetchError> {
    let url_str = url.as_str();
    let curl_err = |e: curl::Error| FetchError::from_curl(url_str, e);

    let mut easy = curl::easy::Easy::new();
    easy.url(url_str).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(options.max_redirections)
        .map_err(curl_err)?;
    easy.useragent(&options.user_agent).map_err(curl_err)?;
    easy.connect_timeout(options.connect_timeout)
        .map_err(curl_err)?;
    // Abort a stalled transfer rather than imposing a wall-clock limit on large files.
    easy.low_speed_limit(options.low_speed_limit)
        .map_err(curl_err)?;
    easy.low_speed_time(options.low_speed_time)
        .map_err(curl_err)?;
    easy.progress(true).map_err(curl_err)?;

    let file = create_truncated(destination)?;
    let tracker = ProgressTracker::new(observer);
    tracker.start(&display_name(destination), None);
    let mut sink = ProgressWriter::new(file, &tracker);

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match sink.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(_) => Ok(0), // abort transfer; the error is kept in the sink
            })
            .map_err(curl_err)?;
        transfer
            .progress_function(|dltotal, _dlnow, _ultotal, _ulnow| {
                if dltotal > 0.0 {
                    tracker.set_total(dltotal as u64);
                }
                true
            })
            .map_err(curl_err)?;
        transfer.perform()
    };
    if let Err(e) = performed {
        if e.is_write_error() {
            if let Some(io_err) = sink.take_error() {
                return Err(FetchError::io(destination, io_err));
            }
        }
        return Err(FetchError::from_curl(url_str, e));
    }

    // 0 means the protocol has no response codes (file://, etc.).
    let code = easy.response_code().map_err(curl_err)?;
    if code != 0 && !(200..300).contains(&code) {
        return Err(FetchError::HttpStatus {
            url: url_str.to_string(),
            code,
        });
    }

    sink.flush().map_err(|e| FetchError::io(destination, e))?;
    sink.get_ref()
        .sync_all()
        .map_err(|e| FetchError::io(destination, e))?;

    // Size announced by the final response (after redirects); negative when unknown.
    let written = tracker.bytes_done();
    let announced = easy.content_length_download().map_err(curl_err)?;
    if announced >= 0.0 && written != announced as u64 {
        return Err(FetchError::PartialTransfer {
            expected: announced as u64,
            received: written,
        });
    }
    tracker.finish();
    Ok(written)
}
