//! Error types for the Schwab API client.
//!
//! Configuration problems detected while building a client are reported
//! through [`ConfigError`]. Everything else that can go wrong at runtime
//! (transport, decoding, API rejections, token state) is an [`Error`].

use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for Schwab client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors raised while constructing a client.
///
/// All variants are fatal to construction: the caller must fix the
/// configuration and build a new client. No client value exists when
/// one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The base URL is neither the production endpoint nor a SimSchwab
    /// `http://localhost:<port>` URL.
    #[error(
        "Invalid base_url: {url}. Must be https://api.schwabapi.com or http://localhost:<port>"
    )]
    InvalidBaseUrl {
        /// The rejected URL, verbatim
        url: String,
    },

    /// A SimSchwab URL was supplied without a static token.
    #[error("SimSchwab URLs require static_token authentication")]
    MissingStaticToken,

    /// A static token was supplied together with the production URL.
    #[error("static_token can only be used with SimSchwab (http://localhost:<port>) URLs")]
    StaticTokenNotAllowed,

    /// The production URL was supplied without both app key and app secret.
    #[error("app_key and app_secret are required for the production Schwab API")]
    MissingCredentials,

    /// App key or app secret was supplied together with a SimSchwab URL.
    #[error("app_key and app_secret cannot be used with SimSchwab; supply only static_token")]
    CredentialsNotAllowed,

    /// The static token cannot be sent in an `Authorization` header.
    #[error("static_token must be a valid HTTP header value (no control characters)")]
    InvalidStaticToken,
}

/// The main error type for all Schwab client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Client configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: status={status}, message={message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Human-readable error message
        message: String,
        /// Raw response body for debugging
        body: Value,
    },

    /// Token refresh failed or is not possible
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No usable access token is held; a refresh is required
    #[error("Session expired; refresh required")]
    SessionExpired,

    /// Invalid input provided to a function
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rate limited by the API
    #[error("Rate limited; retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Number of seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Returns `true` if this error is potentially transient and the
    /// operation could be retried.
    ///
    /// Configuration errors are never retryable.
    ///
    /// # Example
    ///
    /// ```
    /// use schwabdev_rs::{ConfigError, Error};
    ///
    /// let err = Error::from(ConfigError::MissingStaticToken);
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_) | Error::RateLimited { .. })
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Authentication(_) | Error::SessionExpired)
    }

    /// Returns `true` if this error came from client configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Returns `true` if this error indicates a client-side issue
    /// (invalid input, bad configuration, bad request, etc.).
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status >= 400 && *status < 500,
            Error::InvalidInput(_) | Error::Config(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this error indicates a server-side issue.
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Create an API error from a response body.
    ///
    /// Schwab reports errors either as `{"message": ...}` or as
    /// `{"error": ..., "error_description": ...}`.
    pub(crate) fn from_api_response(status: u16, body: Value) -> Self {
        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| body.get("error_description").and_then(|m| m.as_str()))
            .or_else(|| body.get("error").and_then(|m| m.as_str()))
            .unwrap_or("Unknown API error")
            .to_string();

        Error::Api {
            status,
            message,
            body,
        }
    }
}
