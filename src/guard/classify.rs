//! Content Classifier

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::parse_link;

static LINK_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("link prefix pattern"));
static ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("alphanumeric pattern"));

/// Coarse payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Url,
    Text,
    /// Mail address; not produced by [`classify`]
    Email,
    /// Phone number; not produced by [`classify`]
    Phone,
    Unrecognized,
}

/// Outcome of [`classify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub valid: bool,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub message: String,
}

impl ClassificationResult {
    fn new(valid: bool, content_type: ContentType, message: &str) -> Self {
        Self {
            valid,
            content_type,
            message: message.to_string(),
        }
    }
}

/// Classify decoded QR text as a link, plain text, or unrecognized
pub fn classify(text: &str) -> ClassificationResult {
    if LINK_PREFIX.is_match(text) {
        return match parse_link(text) {
            Some(_) => ClassificationResult::new(true, ContentType::Url, "URL link"),
            None => ClassificationResult::new(false, ContentType::Unrecognized, "Invalid URL"),
        };
    }

    if ALPHANUMERIC.is_match(text) {
        return ClassificationResult::new(true, ContentType::Text, "Text");
    }

    ClassificationResult::new(false, ContentType::Unrecognized, "Unknown format")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url() {
        let result = classify("http://example.com");
        assert!(result.valid);
        assert_eq!(result.content_type, ContentType::Url);
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(classify("HTTPS://Example.com/x").content_type, ContentType::Url);
    }

    #[test]
    fn test_alphanumeric_text() {
        let result = classify("abc123");
        assert!(result.valid);
        assert_eq!(result.content_type, ContentType::Text);
    }

    #[test]
    fn test_punctuation_is_unrecognized() {
        let result = classify("!!!");
        assert!(!result.valid);
        assert_eq!(result.content_type, ContentType::Unrecognized);
        assert_eq!(result.message, "Unknown format");
    }

    #[test]
    fn test_browser_valid_urls() {
        for input in [
            "https://tinyurl.com/x y",
            "http://example.com/a b",
            "http://bücher.de/",
            "https://bit.ly/a`b",
        ] {
            let result = classify(input);
            assert!(result.valid, "{input}");
            assert_eq!(result.content_type, ContentType::Url);
            assert_eq!(result.message, "URL link");
        }
    }

    #[test]
    fn test_malformed_url_is_invalid_not_error() {
        let result = classify("http://");
        assert!(!result.valid);
        assert_eq!(result.message, "Invalid URL");

        let result = classify("https://bad host.com");
        assert!(!result.valid);
    }

    #[test]
    fn test_empty_and_non_ascii() {
        assert!(!classify("").valid);
        assert!(!classify("héllo").valid);
        assert!(!classify("hello world").valid);
    }

    #[test]
    fn test_total_over_odd_inputs() {
        for input in ["\0", "http", "https:/", "ftp://x.org", "\u{202e}abc", "12345"] {
            let result = classify(input);
            assert!(matches!(
                result.content_type,
                ContentType::Url | ContentType::Text | ContentType::Unrecognized
            ));
        }
    }

    #[test]
    fn test_serializes_type_key() {
        let json = serde_json::to_value(classify("abc")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["valid"], true);
    }
}
