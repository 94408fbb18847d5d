//! Threat Rule Table
//!
//! The pattern lists behind the threat heuristic, kept as data so they can
//! be overridden from the settings file without touching match semantics.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One entry of the ordered hostname rule list
///
/// Rules are checked in table order; the first hit decides the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum HostRule {
    /// Host contains this domain (URL shorteners, known bad hosts)
    Contains(String),
    /// Host matches this case-insensitive pattern (random-looking domains)
    Pattern(String),
}

/// Serializable rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatRules {
    /// Hostname rules, in priority order
    pub host_rules: Vec<HostRule>,
    /// Raw dotted-IPv4 right after the scheme (case-sensitive, whole text)
    pub ip_link_pattern: String,
    /// Code execution, dangerous extensions, script schemes (case-insensitive)
    pub malicious_patterns: Vec<String>,
    /// Words that hint at credential harvesting (case-insensitive)
    pub sensitive_keywords: Vec<String>,
    /// Links exempt from the keyword rule (case-insensitive)
    pub trusted_link_pattern: String,
}

impl Default for ThreatRules {
    fn default() -> Self {
        Self {
            host_rules: vec![
                HostRule::Contains("bit.ly".to_string()),
                HostRule::Contains("tinyurl.com".to_string()),
                HostRule::Contains("shorte.st".to_string()),
                HostRule::Contains("cutt.ly".to_string()),
                HostRule::Pattern(r"[a-z0-9]{12,}\.(com|net|org)".to_string()),
                HostRule::Contains("login-form.com".to_string()),
                HostRule::Contains("account-verify.com".to_string()),
            ],
            ip_link_pattern: r"^https?://(\d{1,3}\.){3}\d{1,3}".to_string(),
            malicious_patterns: vec![
                r"(eval\(|system\()".to_string(),
                r"(\.exe|\.bat|\.sh|\.js)$".to_string(),
                r"(javascript:|data:text/html)".to_string(),
            ],
            sensitive_keywords: ["password", "login", "account", "verify", "bank", "paypal"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trusted_link_pattern: r"^https?://(www\.)?(paypal|bank\.com)".to_string(),
        }
    }
}

/// Host rule after pattern compilation
#[derive(Debug, Clone)]
pub(crate) enum CompiledHostRule {
    Contains(String),
    Pattern(Regex),
}

/// Compiled form of [`ThreatRules`]
#[derive(Debug, Clone)]
pub(crate) struct CompiledRules {
    pub host_rules: Vec<CompiledHostRule>,
    pub ip_link: Regex,
    pub malicious: Vec<Regex>,
    /// `None` when the keyword list is empty
    pub sensitive: Option<Regex>,
    pub trusted_link: Regex,
}

impl ThreatRules {
    /// Compile every pattern, reporting the first one that fails
    pub(crate) fn compile(&self) -> Result<CompiledRules, ConfigError> {
        let host_rules = self
            .host_rules
            .iter()
            .map(|rule| match rule {
                HostRule::Contains(domain) => {
                    Ok(CompiledHostRule::Contains(domain.to_ascii_lowercase()))
                }
                HostRule::Pattern(pattern) => {
                    compile_pattern(pattern, true).map(CompiledHostRule::Pattern)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let malicious = self
            .malicious_patterns
            .iter()
            .map(|p| compile_pattern(p, true))
            .collect::<Result<Vec<_>, _>>()?;

        let sensitive = if self.sensitive_keywords.is_empty() {
            None
        } else {
            let alternation = self
                .sensitive_keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile_pattern(&format!("({})", alternation), true)?)
        };

        Ok(CompiledRules {
            host_rules,
            ip_link: compile_pattern(&self.ip_link_pattern, false)?,
            malicious,
            sensitive,
            trusted_link: compile_pattern(&self.trusted_link_pattern, true)?,
        })
    }
}

fn compile_pattern(pattern: &str, case_insensitive: bool) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}
