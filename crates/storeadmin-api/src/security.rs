//! Input validation and sanitization.

use std::net::IpAddr;

use tracing::warn;
use url::{Host, Url};

/// Maximum URL length.
const MAX_URL_LENGTH: usize = 2048;

/// Maximum document id length.
pub const MAX_DOCUMENT_ID_LENGTH: usize = 128;

/// Maximum length of free-text query parameters.
pub const MAX_SEARCH_LENGTH: usize = 200;

/// Result of URL validation.
#[derive(Debug)]
pub enum UrlValidationResult {
    /// URL is valid; trimmed form.
    Valid(String),
    /// URL is malformed or uses an unsupported protocol.
    Invalid(String),
    /// URL points at an internal or metadata address.
    Blocked(String),
    TooLong,
}

impl UrlValidationResult {
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Valid(url) => Ok(url),
            Self::Invalid(msg) | Self::Blocked(msg) => Err(msg),
            Self::TooLong => Err(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )),
        }
    }
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
    }
}

fn is_blocked_host(host: &Host<&str>) -> bool {
    match host {
        Host::Ipv4(ip) => is_internal_ip(IpAddr::V4(*ip)),
        Host::Ipv6(ip) => is_internal_ip(IpAddr::V6(*ip)),
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost"
                || domain.ends_with(".localhost")
                || domain.starts_with("metadata.")
                || domain.ends_with(".internal")
        }
    }
}

/// Validate an image or avatar URL.
///
/// Only absolute http(s) URLs with a public host are accepted.
pub fn validate_image_url(url: &str) -> UrlValidationResult {
    if url.len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    let url = url.trim();
    if url.is_empty() {
        return UrlValidationResult::Invalid("URL cannot be empty".to_string());
    }

    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => return UrlValidationResult::Invalid(format!("Invalid URL format: {}", e)),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return UrlValidationResult::Invalid(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ))
        }
    }

    let Some(host) = parsed.host() else {
        return UrlValidationResult::Invalid("URL must have a valid host".to_string());
    };

    if is_blocked_host(&host) {
        warn!(url = %url, "Blocked internal image URL");
        return UrlValidationResult::Blocked(
            "URL appears to target an internal or restricted endpoint".to_string(),
        );
    }

    UrlValidationResult::Valid(url.to_string())
}

/// Validate an optional URL field where an empty string means "clear".
pub fn validate_optional_image_url(url: Option<&str>) -> Result<(), String> {
    match url.map(str::trim) {
        None | Some("") => Ok(()),
        Some(u) => validate_image_url(u).into_result().map(|_| ()),
    }
}

/// Firestore document id accepted in paths: 1..=128 of `[A-Za-z0-9_-]`.
pub fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_DOCUMENT_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Strip control characters and cap the length of user text.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_SEARCH_LENGTH)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_image_urls() {
        assert!(matches!(
            validate_image_url("https://cdn.example.com/products/mug.png"),
            UrlValidationResult::Valid(_)
        ));
        assert!(matches!(
            validate_image_url(" http://images.example.org/a.jpg "),
            UrlValidationResult::Valid(u) if u == "http://images.example.org/a.jpg"
        ));
    }

    #[test]
    fn test_blocked_internal_hosts() {
        for url in [
            "http://127.0.0.1/a.png",
            "http://localhost/a.png",
            "http://192.168.1.1/a.png",
            "http://10.0.0.8/a.png",
            "http://169.254.169.254/latest/meta-data/",
            "http://metadata.google.internal/computeMetadata/v1/",
            "http://[::1]/a.png",
        ] {
            assert!(
                matches!(validate_image_url(url), UrlValidationResult::Blocked(_)),
                "{} should be blocked",
                url
            );
        }
    }

    #[test]
    fn test_invalid_protocols() {
        assert!(matches!(
            validate_image_url("ftp://example.com/a.png"),
            UrlValidationResult::Invalid(_)
        ));
        assert!(matches!(
            validate_image_url("javascript:alert(1)"),
            UrlValidationResult::Invalid(_)
        ));
        assert!(matches!(validate_image_url("not a url"), UrlValidationResult::Invalid(_)));
    }

    #[test]
    fn test_optional_url_allows_clearing() {
        assert!(validate_optional_image_url(None).is_ok());
        assert!(validate_optional_image_url(Some("  ")).is_ok());
        assert!(validate_optional_image_url(Some("file:///etc/passwd")).is_err());
    }

    #[test]
    fn test_document_id_validation() {
        assert!(is_valid_document_id("aB3_x-9"));
        assert!(is_valid_document_id(&"a".repeat(128)));
        assert!(!is_valid_document_id(""));
        assert!(!is_valid_document_id(&"a".repeat(129)));
        assert!(!is_valid_document_id("has/slash"));
        assert!(!is_valid_document_id("has.dot"));
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("  mug\u{0000}\n "), "mug");
        assert_eq!(sanitize_string(&"x".repeat(500)).len(), MAX_SEARCH_LENGTH);
    }
}
