//! Request header parsing for COPY and MOVE.

use crate::error::{ServerError, ServerResult};
use hyper::header::HeaderMap;
use hyper::Uri;
use objdav_tree::overwrite::OVERWRITE_HEADER;
use objdav_tree::{path, OverwritePolicy};
use percent_encoding::percent_decode_str;
use url::Url;

/// Name of the header carrying the target of a COPY or MOVE.
pub const DESTINATION_HEADER: &str = "Destination";

/// Overwrite policy for a request.
///
/// Only `Overwrite: Y` allows replacing an existing destination; any other
/// value, or no header at all, fails on conflict.
pub fn derive_overwrite(headers: &HeaderMap) -> OverwritePolicy {
    OverwritePolicy::from_hint(headers.get(OVERWRITE_HEADER).map(|v| v.as_bytes()))
}

/// Normalized virtual path named by the `Destination` header.
///
/// Accepts an absolute URI (`http://host/dir/name`) or an absolute path
/// (`/dir/name`). Segments are percent-decoded one at a time, so an encoded
/// `/` cannot split a name.
pub fn destination_path(headers: &HeaderMap) -> ServerResult<String> {
    let value = headers
        .get(DESTINATION_HEADER)
        .ok_or(ServerError::MissingDestination)?;
    let raw = value.to_str().map_err(|_| {
        ServerError::InvalidDestination(String::from_utf8_lossy(value.as_bytes()).into_owned())
    })?;
    let invalid = || ServerError::InvalidDestination(raw.to_string());

    let url = if raw.starts_with('/') {
        Url::parse(PATH_BASE).and_then(|base| base.join(raw))
    } else {
        Url::parse(raw)
    }
    .map_err(|_| invalid())?;
    if url.cannot_be_a_base() {
        return Err(invalid());
    }
    decode_path(url.path()).ok_or_else(invalid)
}

/// Normalized virtual path of the request target.
pub fn request_path(uri: &Uri) -> ServerResult<String> {
    decode_path(uri.path()).ok_or_else(|| ServerError::InvalidRequestPath(uri.path().to_string()))
}

const PATH_BASE: &str = "http://localhost/";

/// Decode each `/`-separated segment of an encoded path and normalize.
///
/// `None` if a segment is not UTF-8 once decoded or decodes to a name
/// containing `/`.
fn decode_path(encoded: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in encoded.split('/') {
        let name = percent_decode_str(segment).decode_utf8().ok()?;
        if name.contains('/') {
            return None;
        }
        segments.push(name);
    }
    Some(path::normalize(&segments.join("/")))
}
