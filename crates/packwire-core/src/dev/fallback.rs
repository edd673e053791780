//! HTML5 history API fallback.
//!
//! Client-side routers use real paths (`/users/42`) that only exist in the
//! browser. Navigation requests for such paths get the index document.

use axum::http::{header, HeaderMap, Method};

/// Whether the request accepts an HTML response.
fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|accept| accept.contains("text/html") || accept.contains("*/*"))
}

/// Whether the last path segment looks like a file name.
fn has_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.contains('.')
}

/// Path to serve instead of `path`, if the request should fall back to `index`.
///
/// Only `GET`/`HEAD` navigations that accept HTML and whose last segment has
/// no dot are rewritten.
#[must_use]
pub fn history_rewrite(
    method: &Method,
    headers: &HeaderMap,
    path: &str,
    index: &str,
) -> Option<String> {
    if method != Method::GET && method != Method::HEAD {
        return None;
    }
    if !accepts_html(headers) || has_extension(path) || path == index {
        return None;
    }
    Some(index.to_string())
}
