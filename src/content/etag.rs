//! Content-hash entity tags.

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

/// Strong ETag for `body`: the quoted hex SHA-256 of its bytes.
pub fn etag_for(body: &[u8]) -> String {
    format!("\"{:x}\"", Sha256::digest(body))
}

/// True when the request's `If-None-Match` already names `etag`.
pub fn is_fresh(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == etag || candidate == "*")
}
