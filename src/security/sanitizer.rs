//! Data sanitization for logging, display and navigation targets
//!
//! Captured credentials must never reach the logs verbatim, and the display
//! surface can ask for a masked rendering. Navigation targets coming in over
//! the control interface are checked here before anything touches a tab.

use thiserror::Error;
use url::Url;

/// Errors that can occur during input validation
#[derive(Debug, Error, PartialEq)]
pub enum SanitizerError {
    /// Input is empty when it shouldn't be
    #[error("Input cannot be empty")]
    EmptyInput,

    /// Input is not a parseable absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL scheme other than http/https
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Sanitizer for sensitive data
///
/// Provides static methods to sanitize tokens and URLs before logging or
/// display.
pub struct Sanitizer;

impl Sanitizer {
    /// Sanitizes a token for safe logging
    ///
    /// Shows only the last 4 characters preceded by "***".
    ///
    /// # Examples
    ///
    /// ```
    /// use token_extractor_lib::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_token("eyJhbGciOiJSUzI1NiJ9.e30.sig1"), "***sig1");
    /// assert_eq!(Sanitizer::sanitize_token("abc"), "****");
    /// ```
    pub fn sanitize_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 4 {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("***{}", tail)
        } else {
            "****".to_string()
        }
    }

    /// Sanitizes a URL by removing query parameters and fragments
    ///
    /// # Examples
    ///
    /// ```
    /// use token_extractor_lib::security::Sanitizer;
    ///
    /// assert_eq!(
    ///     Sanitizer::sanitize_url("https://id.uipath.com/connect?code=secret#frag"),
    ///     "https://id.uipath.com/connect"
    /// );
    /// ```
    pub fn sanitize_url(url: &str) -> String {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        url[..end].to_string()
    }

    /// Masks a token for display when masking is enabled
    ///
    /// Keeps the first 8 and last 4 characters. Values too short to keep both
    /// ends hidden are fully masked.
    ///
    /// # Examples
    ///
    /// ```
    /// use token_extractor_lib::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::mask_token("eyJhbGciOiJSUzI1NiJ9.payload.signature"), "eyJhbGci...ture");
    /// assert_eq!(Sanitizer::mask_token("short"), "****");
    /// ```
    pub fn mask_token(token: &str) -> String {
        Self::mask_string(token, 8, 4)
    }

    /// Masks a string, showing only the first `head` and last `tail` characters
    pub fn mask_string(s: &str, head: usize, tail: usize) -> String {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() <= head + tail {
            "****".to_string()
        } else {
            let start: String = chars[..head].iter().collect();
            let end: String = chars[chars.len() - tail..].iter().collect();
            format!("{}...{}", start, end)
        }
    }

    /// Validates a navigation target
    ///
    /// Only absolute `http` and `https` URLs are accepted. Returns the parsed
    /// URL so callers navigate to exactly what was validated.
    ///
    /// # Examples
    ///
    /// ```
    /// use token_extractor_lib::security::Sanitizer;
    ///
    /// assert!(Sanitizer::validate_navigation_url("https://cloud.uipath.com").is_ok());
    /// assert!(Sanitizer::validate_navigation_url("javascript:alert(1)").is_err());
    /// ```
    pub fn validate_navigation_url(input: &str) -> Result<Url, SanitizerError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SanitizerError::EmptyInput);
        }

        let url = Url::parse(trimmed).map_err(|e| SanitizerError::InvalidUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SanitizerError::UnsupportedScheme(other.to_string())),
        }
    }
}
