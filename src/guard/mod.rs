//! Payload Guard
//!
//! Classifies decoded QR text and screens it against heuristic threat
//! patterns. Everything here is pure and total: malformed input degrades to
//! a safe default instead of an error.

pub mod classify;
pub mod rules;
pub mod threat;

pub use classify::{classify, ClassificationResult, ContentType};
pub use rules::{HostRule, ThreatRules};
pub use threat::{assess, ThreatHeuristic, ThreatKind, ThreatVerdict};

use url::Url;

/// Parse text as an absolute link (scheme + non-empty host)
///
/// Follows WHATWG URL parsing, so spaces and backticks in the path are
/// percent-encoded and IDN hosts come back in punycode. Authority-only
/// strings like `example.com` are rejected.
pub(crate) fn parse_link(text: &str) -> Option<Url> {
    let url = Url::parse(text).ok()?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Some(url),
        _ => None,
    }
}
