//! Threat Heuristic
//!
//! Best-effort screening of decoded payloads. False positives are expected;
//! the verdict is an advisory shown before the user acts, never a gate.

use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

use super::parse_link;
use super::rules::{CompiledHostRule, CompiledRules, ThreatRules};
use crate::error::ConfigError;

static DEFAULT_HEURISTIC: Lazy<ThreatHeuristic> = Lazy::new(|| {
    ThreatHeuristic::new(&ThreatRules::default()).expect("default threat rules compile")
});

/// Which rule flagged the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    /// Host is a known URL shortener or a listed bad host
    SuspiciousLink,
    /// Host looks machine-generated
    SuspiciousDomain,
    /// Plain `http:` link
    InsecureConnection,
    /// Link points at a raw IPv4 address
    IpAddress,
    /// Script schemes, code execution keywords, executable downloads
    MaliciousCode,
    /// Credential-related wording outside a trusted link
    Phishing,
}

impl ThreatKind {
    /// Short warning label
    pub fn warning(&self) -> &'static str {
        match self {
            ThreatKind::SuspiciousLink => "Suspicious link",
            ThreatKind::SuspiciousDomain => "Suspicious domain",
            ThreatKind::InsecureConnection => "Insecure connection",
            ThreatKind::IpAddress => "IP address used directly",
            ThreatKind::MaliciousCode => "Malicious code",
            ThreatKind::Phishing => "Possible phishing",
        }
    }

    /// Longer explanation shown under the warning
    pub fn description(&self) -> &'static str {
        match self {
            ThreatKind::SuspiciousLink => {
                "This link may redirect to a phishing or malicious site."
            }
            ThreatKind::SuspiciousDomain => {
                "The domain name looks random and may be dangerous."
            }
            ThreatKind::InsecureConnection => {
                "This site does not use HTTPS and may be vulnerable."
            }
            ThreatKind::IpAddress => {
                "The link uses an IP address directly, which can be suspicious."
            }
            ThreatKind::MaliciousCode => {
                "The QR code contains code that could harm your device."
            }
            ThreatKind::Phishing => {
                "The QR code mentions sensitive data and may be an attempt to steal your credentials."
            }
        }
    }
}

/// Advisory danger classification of a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatVerdict {
    pub is_dangerous: bool,
    pub kind: Option<ThreatKind>,
    pub warning: String,
    pub description: String,
}

impl ThreatVerdict {
    pub fn safe() -> Self {
        Self {
            is_dangerous: false,
            kind: None,
            warning: String::new(),
            description: String::new(),
        }
    }

    pub fn dangerous(kind: ThreatKind) -> Self {
        Self {
            is_dangerous: true,
            kind: Some(kind),
            warning: kind.warning().to_string(),
            description: kind.description().to_string(),
        }
    }
}

/// Compiled threat rule set
#[derive(Debug, Clone)]
pub struct ThreatHeuristic {
    rules: CompiledRules,
}

impl ThreatHeuristic {
    pub fn new(rules: &ThreatRules) -> Result<Self, ConfigError> {
        Ok(Self {
            rules: rules.compile()?,
        })
    }

    /// Heuristic built from the stock rule table
    pub fn builtin() -> &'static ThreatHeuristic {
        &DEFAULT_HEURISTIC
    }

    /// Screen a payload; the first matching rule wins
    pub fn assess(&self, text: &str) -> ThreatVerdict {
        if text.is_empty() {
            return ThreatVerdict::safe();
        }

        if text.starts_with("http") {
            match parse_link(text) {
                Some(url) => {
                    if let Some(kind) = self.check_link(text, &url) {
                        return ThreatVerdict::dangerous(kind);
                    }
                }
                None => debug!("Payload starts with http but is not a URL: {:?}", text),
            }
        }

        if self.rules.malicious.iter().any(|re| re.is_match(text)) {
            return ThreatVerdict::dangerous(ThreatKind::MaliciousCode);
        }

        if let Some(ref sensitive) = self.rules.sensitive {
            if sensitive.is_match(text) && !self.rules.trusted_link.is_match(text) {
                return ThreatVerdict::dangerous(ThreatKind::Phishing);
            }
        }

        ThreatVerdict::safe()
    }

    /// Link-specific checks: host rules, scheme, raw IP
    fn check_link(&self, text: &str, url: &Url) -> Option<ThreatKind> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        for rule in &self.rules.host_rules {
            match rule {
                CompiledHostRule::Contains(domain) if host.contains(domain.as_str()) => {
                    return Some(ThreatKind::SuspiciousLink);
                }
                CompiledHostRule::Pattern(re) if re.is_match(&host) => {
                    return Some(ThreatKind::SuspiciousDomain);
                }
                _ => {}
            }
        }

        // Insecure scheme is checked before the raw IP rule, so plain-http
        // IP links report as insecure.
        if url.scheme() == "http" {
            return Some(ThreatKind::InsecureConnection);
        }

        if self.rules.ip_link.is_match(text) {
            return Some(ThreatKind::IpAddress);
        }

        None
    }
}

/// Screen a payload with the built-in rules
pub fn assess(text: &str) -> ThreatVerdict {
    ThreatHeuristic::builtin().assess(text)
}
