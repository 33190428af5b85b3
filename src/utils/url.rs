// src/utils/url.rs

//! URL and text extraction helpers.

use url::Url;

/// Resolve a potentially relative href against a base URL.
///
/// Falls back to the raw href when the base cannot be parsed.
pub fn resolve_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the digits of a text fragment as a number.
///
/// Vote counters and sidebar counts render as text with decoration
/// around the number ("42 votes", "(42)").
pub fn parse_digits(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_href() {
        assert_eq!(
            resolve_url("https://example.com/listing/", "startup/acme"),
            "https://example.com/listing/startup/acme"
        );
    }

    #[test]
    fn test_resolve_absolute_path() {
        assert_eq!(
            resolve_url("https://example.com/listing/", "/startup/acme"),
            "https://example.com/startup/acme"
        );
    }

    #[test]
    fn test_resolve_keeps_absolute_href() {
        assert_eq!(
            resolve_url("https://example.com/", "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_parse_digits() {
        assert_eq!(parse_digits("42 votes"), Some(42));
        assert_eq!(parse_digits("(7)"), Some(7));
        assert_eq!(parse_digits("no digits"), None);
        assert_eq!(parse_digits(""), None);
    }
}
