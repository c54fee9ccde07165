//! Base URL constants, classification, and the validated [`BaseUrl`] type.
//!
//! A client may only talk to one of two kinds of endpoint: the production
//! Schwab API, or a SimSchwab instance on `http://localhost:<port>`. Any
//! other URL is rejected before a client is built.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::ConfigError;

/// The production Schwab API base URL.
pub const SCHWAB_API_URL: &str = "https://api.schwabapi.com";

/// The default SimSchwab base URL.
///
/// Any `http://localhost:<port>` URL is accepted; this is only a
/// convenient default.
pub const SIMSCHWAB_API_URL: &str = "http://localhost:9004";

// ASCII digits only; `$` in the regex crate anchors at the true end of input.
static SIMSCHWAB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^http://localhost:[0-9]+$").expect("SimSchwab URL pattern is valid")
});

/// Classification of a candidate base URL.
///
/// # Example
///
/// ```
/// use schwabdev_rs::UrlKind;
///
/// assert_eq!(UrlKind::classify("https://api.schwabapi.com"), UrlKind::Production);
/// assert_eq!(UrlKind::classify("http://localhost:8080"), UrlKind::Simulation);
/// assert_eq!(UrlKind::classify("https://localhost:8080"), UrlKind::Invalid);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    /// The production Schwab API.
    Production,
    /// A local SimSchwab instance.
    Simulation,
    /// Anything else.
    Invalid,
}

impl UrlKind {
    /// Classify a base URL.
    ///
    /// Production requires an exact match with [`SCHWAB_API_URL`].
    /// Simulation requires exactly `http://localhost:` followed by one or
    /// more ASCII digits, with no trailing slash, path, query, or fragment.
    pub fn classify(url: &str) -> Self {
        if url == SCHWAB_API_URL {
            UrlKind::Production
        } else if SIMSCHWAB_PATTERN.is_match(url) {
            UrlKind::Simulation
        } else {
            UrlKind::Invalid
        }
    }

    /// Returns `true` for a SimSchwab endpoint.
    pub fn is_simulation(&self) -> bool {
        matches!(self, UrlKind::Simulation)
    }

    /// Returns `true` unless the URL was rejected.
    pub fn is_valid(&self) -> bool {
        !matches!(self, UrlKind::Invalid)
    }
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlKind::Production => write!(f, "production"),
            UrlKind::Simulation => write!(f, "simulation"),
            UrlKind::Invalid => write!(f, "invalid"),
        }
    }
}

/// Returns `true` if `url` is a SimSchwab localhost URL.
pub fn is_simulation_url(url: &str) -> bool {
    UrlKind::classify(url).is_simulation()
}

/// Returns `true` if `url` is the production URL or a SimSchwab URL.
pub fn is_valid_base_url(url: &str) -> bool {
    UrlKind::classify(url).is_valid()
}

/// A base URL that has passed classification.
///
/// A `BaseUrl` is always either the production endpoint or a SimSchwab
/// endpoint; [`UrlKind::Invalid`] can never be stored in one.
///
/// # Example
///
/// ```
/// use schwabdev_rs::{BaseUrl, UrlKind};
///
/// let url = BaseUrl::parse("http://localhost:9004").expect("valid url");
/// assert_eq!(url.kind(), UrlKind::Simulation);
///
/// assert!(BaseUrl::parse("http://evil.com:9004").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseUrl {
    url: String,
    kind: UrlKind,
}

impl BaseUrl {
    /// Validate and wrap a base URL.
    ///
    /// The SimSchwab port is matched as digits only, not as a `u16`, so
    /// `http://localhost:99999999` is accepted here. Requests against such a
    /// URL fail in [`BaseUrl::join`] with [`Error::UrlParse`](crate::Error::UrlParse).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] naming the URL if it is
    /// neither production nor SimSchwab.
    pub fn parse(url: impl Into<String>) -> std::result::Result<Self, ConfigError> {
        let url = url.into();
        let kind = UrlKind::classify(&url);
        tracing::debug!(%url, %kind, "classified base url");

        if !kind.is_valid() {
            return Err(ConfigError::InvalidBaseUrl { url });
        }
        Ok(Self { url, kind })
    }

    /// The production base URL.
    pub fn production() -> Self {
        Self {
            url: SCHWAB_API_URL.to_string(),
            kind: UrlKind::Production,
        }
    }

    /// A SimSchwab base URL on the given port.
    pub fn simulation(port: u16) -> Self {
        Self {
            url: format!("http://localhost:{}", port),
            kind: UrlKind::Simulation,
        }
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Get the URL classification.
    pub fn kind(&self) -> UrlKind {
        self.kind
    }

    /// Returns `true` if this is a SimSchwab URL.
    pub fn is_simulation(&self) -> bool {
        self.kind.is_simulation()
    }

    /// Join an API path (e.g. `/trader/v1/accounts`) onto this base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the result is not a valid URL, e.g. when the
    /// SimSchwab port is outside the `u16` range.
    pub fn join(&self, path: &str) -> crate::Result<Url> {
        let base = Url::parse(&self.url)?;
        Ok(base.join(path)?)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl TryFrom<&str> for BaseUrl {
    type Error = ConfigError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = ConfigError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_url() {
        assert_eq!(UrlKind::classify(SCHWAB_API_URL), UrlKind::Production);
        assert_eq!(UrlKind::classify("https://api.schwabapi.com"), UrlKind::Production);
    }

    #[test]
    fn test_production_url_must_match_exactly() {
        assert_eq!(UrlKind::classify("https://api.schwabapi.com/"), UrlKind::Invalid);
        assert_eq!(UrlKind::classify("http://api.schwabapi.com"), UrlKind::Invalid);
        assert_eq!(UrlKind::classify("https://API.schwabapi.com"), UrlKind::Invalid);
        assert_eq!(UrlKind::classify(" https://api.schwabapi.com"), UrlKind::Invalid);
    }

    #[test]
    fn test_any_localhost_port_is_simulation() {
        for port in ["8080", "9004", "3000", "12345", "0", "0009004", "99999999"] {
            let url = format!("http://localhost:{}", port);
            assert_eq!(UrlKind::classify(&url), UrlKind::Simulation, "{}", url);
            assert!(is_simulation_url(&url));
            assert!(is_valid_base_url(&url));
        }
        assert!(is_simulation_url(SIMSCHWAB_API_URL));
    }

    #[test]
    fn test_invalid_urls() {
        let invalid = [
            "https://localhost:9004",
            "http://localhost",
            "http://localhost:",
            "http://evil.com:9004",
            "http://127.0.0.1:9004",
            "http://localhost:9004/",
            "http://localhost:9004/trader/v1",
            "http://localhost:9004?x=1",
            "http://localhost:abc",
            "http://localhost:90a4",
            "http://localhost:9004\n",
            "http://localhost:\u{0664}\u{0665}",
            "ftp://localhost:21",
            "",
        ];
        for url in invalid {
            assert_eq!(UrlKind::classify(url), UrlKind::Invalid, "{:?}", url);
            assert!(!is_valid_base_url(url));
            assert!(!is_simulation_url(url));
        }
    }

    #[test]
    fn test_base_url_parse() {
        let url = BaseUrl::parse(SCHWAB_API_URL).unwrap();
        assert_eq!(url.kind(), UrlKind::Production);
        assert_eq!(url, BaseUrl::production());

        let url = BaseUrl::parse("http://localhost:9004").unwrap();
        assert!(url.is_simulation());
        assert_eq!(url, BaseUrl::simulation(9004));
        assert_eq!(url.to_string(), "http://localhost:9004");
    }

    #[test]
    fn test_base_url_parse_rejects_with_url() {
        let err = BaseUrl::parse("http://evil.com:9004").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBaseUrl {
                url: "http://evil.com:9004".to_string()
            }
        );
    }

    #[test]
    fn test_base_url_join() {
        let url = BaseUrl::simulation(9004);
        let joined = url.join("/trader/v1/accounts").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:9004/trader/v1/accounts");

        let joined = BaseUrl::production().join("/marketdata/v1/quotes").unwrap();
        assert_eq!(joined.as_str(), "https://api.schwabapi.com/marketdata/v1/quotes");
    }

    #[test]
    fn test_base_url_join_out_of_range_port() {
        let url = BaseUrl::parse("http://localhost:99999999").unwrap();
        assert!(url.join("/trader/v1/accounts").is_err());
    }
}
