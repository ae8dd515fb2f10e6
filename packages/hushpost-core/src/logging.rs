//! Logging setup and redaction helpers.
//!
//! The core only emits `tracing` events; installing a subscriber is the
//! host's call. [`init_logging`] is the convenience used by the FFI layer
//! and the demos.
//!
//! Nothing secret is ever formatted into a log line. Values that are
//! useful to correlate but private (usernames, request paths, payloads) go
//! through the wrappers below.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,hushpost_core=debug";

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install a fmt subscriber filtered by `RUST_LOG`, else `default_filter`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(default_filter: Option<&str>) -> bool {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return false;
    }
    let fallback = default_filter.unwrap_or(DEFAULT_FILTER).to_string();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .try_init()
        .is_ok()
}

/// Hides the wrapped value entirely.
pub struct Redacted<T>(pub T);

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Shows only the length of a byte payload.
pub struct RedactedBytes<'a>(pub &'a [u8]);

impl fmt::Display for RedactedBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} bytes]", self.0.len())
    }
}

impl fmt::Debug for RedactedBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Shows the path of a URL but not its host or query.
pub struct RedactedUrl<'a>(pub &'a str);

impl fmt::Display for RedactedUrl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match reqwest::Url::parse(self.0) {
            Ok(url) => write!(f, "[host]{}", url.path()),
            Err(_) => f.write_str("[invalid url]"),
        }
    }
}

impl fmt::Debug for RedactedUrl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted() {
        assert_eq!(format!("{}", Redacted("alice")), "[REDACTED]");
        assert_eq!(format!("{:?}", Redacted(vec![1, 2, 3])), "[REDACTED]");
    }

    #[test]
    fn test_redacted_bytes() {
        assert_eq!(format!("{}", RedactedBytes(&[0u8; 48])), "[48 bytes]");
    }

    #[test]
    fn test_redacted_url() {
        let shown = format!("{}", RedactedUrl("http://abcdef.onion/api/login?u=alice"));
        assert_eq!(shown, "[host]/api/login");
        assert_eq!(format!("{}", RedactedUrl("::")), "[invalid url]");
    }

    #[test]
    fn test_init_is_idempotent() {
        let _ = init_logging(Some("warn"));
        assert!(!init_logging(None));
    }
}
