//! Link cell navigation safety
//!
//! Absolute `http(s)` URLs open in a new context, same-origin relative paths
//! navigate in place, anything else is dropped.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Open in a new tab/window
    NewContext(String),
    /// Navigate the current context
    SameContext(String),
}

/// Only used to check that a relative path stays on the same origin
const PROBE_ORIGIN: &str = "http://same-origin.invalid";

pub fn classify_link(raw: &str) -> Option<Navigation> {
    let candidate = raw.trim();
    if candidate.is_empty() || candidate.chars().any(|c| c.is_control() || c == '\\') {
        return None;
    }

    match Url::parse(candidate) {
        Ok(url) => match url.scheme() {
            "http" | "https" if url.host_str().is_some() => {
                Some(Navigation::NewContext(url.to_string()))
            }
            _ => None,
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => relative_path(candidate),
        Err(_) => None,
    }
}

fn relative_path(path: &str) -> Option<Navigation> {
    // "//host" is protocol-relative, i.e. another origin
    if !path.starts_with('/') || path.starts_with("//") {
        return None;
    }
    let base = Url::parse(PROBE_ORIGIN).ok()?;
    let resolved = base.join(path).ok()?;
    if resolved.origin() != base.origin() {
        return None;
    }
    Some(Navigation::SameContext(path.to_string()))
}
