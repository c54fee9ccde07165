//! Authentication mode resolution.

use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use super::tokens::TokenState;
use crate::error::ConfigError;
use crate::models::{BaseUrl, UrlKind};

/// Environment variable holding the OAuth app key.
pub const ENV_APP_KEY: &str = "SCHWAB_APP_KEY";
/// Environment variable holding the OAuth app secret.
pub const ENV_APP_SECRET: &str = "SCHWAB_APP_SECRET";
/// Environment variable holding a SimSchwab static token.
pub const ENV_STATIC_TOKEN: &str = "SCHWAB_STATIC_TOKEN";
/// Environment variable holding the base URL.
pub const ENV_BASE_URL: &str = "SCHWAB_BASE_URL";

/// Credentials supplied when constructing a client.
///
/// Either an app key/secret pair (production) or a static token
/// (SimSchwab). Empty strings count as absent.
///
/// # Example
///
/// ```
/// use schwabdev_rs::Credentials;
///
/// let production = Credentials::oauth("app-key", "app-secret");
/// let simulation = Credentials::static_token("sim-token");
/// ```
#[derive(Clone, Default)]
pub struct Credentials {
    app_key: Option<String>,
    app_secret: Option<SecretString>,
    static_token: Option<SecretString>,
}

impl Credentials {
    /// Create an empty set of credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials for the production OAuth flow.
    pub fn oauth(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self::new().with_app_key(app_key).with_app_secret(app_secret)
    }

    /// Credentials for a SimSchwab instance.
    pub fn static_token(token: impl Into<String>) -> Self {
        Self::new().with_static_token(token)
    }

    /// Read credentials from `SCHWAB_APP_KEY`, `SCHWAB_APP_SECRET`, and
    /// `SCHWAB_STATIC_TOKEN`. Unset variables are left absent.
    pub fn from_env() -> Self {
        let mut credentials = Self::new();
        if let Ok(key) = std::env::var(ENV_APP_KEY) {
            credentials = credentials.with_app_key(key);
        }
        if let Ok(secret) = std::env::var(ENV_APP_SECRET) {
            credentials = credentials.with_app_secret(secret);
        }
        if let Ok(token) = std::env::var(ENV_STATIC_TOKEN) {
            credentials = credentials.with_static_token(token);
        }
        credentials
    }

    /// Set the OAuth app key.
    pub fn with_app_key(mut self, app_key: impl Into<String>) -> Self {
        self.app_key = Some(app_key.into()).filter(|k| !k.is_empty());
        self
    }

    /// Set the OAuth app secret.
    pub fn with_app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.app_secret = Some(app_secret.into())
            .filter(|s| !s.is_empty())
            .map(SecretString::from);
        self
    }

    /// Set the SimSchwab static token.
    pub fn with_static_token(mut self, token: impl Into<String>) -> Self {
        self.static_token = Some(token.into())
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        self
    }

    /// Returns `true` if either half of the OAuth pair was supplied.
    pub fn has_oauth_credentials(&self) -> bool {
        self.app_key.is_some() || self.app_secret.is_some()
    }

    /// Returns `true` if a static token was supplied.
    pub fn has_static_token(&self) -> bool {
        self.static_token.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field("static_token", &self.static_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Read the base URL from `SCHWAB_BASE_URL`, falling back to the
/// production URL. The value is not validated here.
pub fn base_url_from_env() -> String {
    std::env::var(ENV_BASE_URL).unwrap_or_else(|_| crate::models::SCHWAB_API_URL.to_string())
}

/// The app key/secret pair of an OAuth-managed client.
#[derive(Clone)]
pub struct OAuthCredentials {
    app_key: String,
    app_secret: SecretString,
}

impl OAuthCredentials {
    /// Create a credential pair.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: SecretString::from(app_secret.into()),
        }
    }

    /// The app key.
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// The app secret.
    pub fn app_secret(&self) -> &SecretString {
        &self.app_secret
    }
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

/// How a client authenticates.
///
/// Resolved once when the client is built. `StaticToken` is always paired
/// with a SimSchwab URL and `OAuthManaged` with the production URL.
#[derive(Clone)]
pub enum AuthMode {
    /// Production OAuth with refreshable tokens.
    OAuthManaged {
        /// App key and secret
        credentials: OAuthCredentials,
        /// Token state, mutated by refreshes
        token_state: TokenState,
    },
    /// A fixed SimSchwab bearer token, never refreshed.
    StaticToken {
        /// The bearer token
        token: SecretString,
    },
}

impl AuthMode {
    /// Select the authentication mode for `base_url` and `credentials`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingStaticToken`] for a SimSchwab URL without a
    ///   static token
    /// - [`ConfigError::CredentialsNotAllowed`] for a SimSchwab URL with an
    ///   app key or secret
    /// - [`ConfigError::InvalidStaticToken`] for a static token that is not
    ///   a legal header value
    /// - [`ConfigError::StaticTokenNotAllowed`] for the production URL with
    ///   a static token
    /// - [`ConfigError::MissingCredentials`] for the production URL without
    ///   both app key and app secret
    pub fn resolve(
        base_url: &BaseUrl,
        credentials: Credentials,
    ) -> std::result::Result<Self, ConfigError> {
        let mode = match base_url.kind() {
            UrlKind::Simulation => {
                let has_oauth = credentials.has_oauth_credentials();
                let token = credentials
                    .static_token
                    .ok_or(ConfigError::MissingStaticToken)?;
                if has_oauth {
                    return Err(ConfigError::CredentialsNotAllowed);
                }
                if HeaderValue::from_str(token.expose_secret()).is_err() {
                    return Err(ConfigError::InvalidStaticToken);
                }
                AuthMode::StaticToken { token }
            }
            UrlKind::Production => {
                if credentials.has_static_token() {
                    return Err(ConfigError::StaticTokenNotAllowed);
                }
                match (credentials.app_key, credentials.app_secret) {
                    (Some(app_key), Some(app_secret)) => AuthMode::OAuthManaged {
                        credentials: OAuthCredentials {
                            app_key,
                            app_secret,
                        },
                        token_state: TokenState::new(),
                    },
                    _ => return Err(ConfigError::MissingCredentials),
                }
            }
            // BaseUrl::parse never yields an invalid kind
            UrlKind::Invalid => {
                return Err(ConfigError::InvalidBaseUrl {
                    url: base_url.as_str().to_string(),
                })
            }
        };

        tracing::debug!(base_url = %base_url, mode = mode.name(), "resolved auth mode");
        Ok(mode)
    }

    /// Returns `true` for a static-token mode.
    pub fn is_static_token(&self) -> bool {
        matches!(self, AuthMode::StaticToken { .. })
    }

    /// Returns `true` for an OAuth-managed mode.
    pub fn is_oauth_managed(&self) -> bool {
        matches!(self, AuthMode::OAuthManaged { .. })
    }

    /// Short name of the mode, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::OAuthManaged { .. } => "oauth_managed",
            AuthMode::StaticToken { .. } => "static_token",
        }
    }

    /// The static token, if this is a static-token mode.
    pub fn static_token(&self) -> Option<&str> {
        match self {
            AuthMode::StaticToken { token } => Some(token.expose_secret()),
            AuthMode::OAuthManaged { .. } => None,
        }
    }
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::OAuthManaged {
                credentials,
                token_state,
            } => f
                .debug_struct("OAuthManaged")
                .field("credentials", credentials)
                .field("token_state", token_state)
                .finish(),
            AuthMode::StaticToken { .. } => f
                .debug_struct("StaticToken")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Validate `base_url` and resolve the authentication mode in one step.
///
/// The URL is checked first, so an invalid URL is reported as
/// [`ConfigError::InvalidBaseUrl`] whatever credentials are supplied.
///
/// # Example
///
/// ```
/// use schwabdev_rs::{resolve_auth_mode, ConfigError, Credentials};
///
/// let (url, mode) = resolve_auth_mode("http://localhost:9004", Credentials::static_token("t1"))
///     .expect("valid configuration");
/// assert!(url.is_simulation());
/// assert_eq!(mode.static_token(), Some("t1"));
///
/// let err = resolve_auth_mode("http://localhost:9004", Credentials::new()).unwrap_err();
/// assert_eq!(err, ConfigError::MissingStaticToken);
/// ```
pub fn resolve_auth_mode(
    base_url: &str,
    credentials: Credentials,
) -> std::result::Result<(BaseUrl, AuthMode), ConfigError> {
    let base_url = BaseUrl::parse(base_url)?;
    let mode = AuthMode::resolve(&base_url, credentials)?;
    Ok((base_url, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SCHWAB_API_URL, SIMSCHWAB_API_URL};

    #[test]
    fn test_simulation_with_static_token() {
        let (url, mode) =
            resolve_auth_mode(SIMSCHWAB_API_URL, Credentials::static_token("test-token-123"))
                .unwrap();
        assert!(url.is_simulation());
        assert!(mode.is_static_token());
        assert_eq!(mode.static_token(), Some("test-token-123"));
    }

    #[test]
    fn test_simulation_without_static_token() {
        let err = resolve_auth_mode(SIMSCHWAB_API_URL, Credentials::new()).unwrap_err();
        assert_eq!(err, ConfigError::MissingStaticToken);
    }

    #[test]
    fn test_simulation_empty_static_token_is_missing() {
        let err = resolve_auth_mode(SIMSCHWAB_API_URL, Credentials::static_token("")).unwrap_err();
        assert_eq!(err, ConfigError::MissingStaticToken);
    }

    #[test]
    fn test_simulation_rejects_oauth_credentials() {
        let credentials = Credentials::static_token("t1").with_app_key("key");
        let err = resolve_auth_mode(SIMSCHWAB_API_URL, credentials).unwrap_err();
        assert_eq!(err, ConfigError::CredentialsNotAllowed);

        let credentials = Credentials::oauth("key", "secret").with_static_token("t1");
        let err = resolve_auth_mode(SIMSCHWAB_API_URL, credentials).unwrap_err();
        assert_eq!(err, ConfigError::CredentialsNotAllowed);
    }

    #[test]
    fn test_simulation_with_only_oauth_credentials_is_missing_token() {
        let err =
            resolve_auth_mode(SIMSCHWAB_API_URL, Credentials::oauth("key", "secret")).unwrap_err();
        assert_eq!(err, ConfigError::MissingStaticToken);
    }

    #[test]
    fn test_simulation_rejects_header_illegal_token() {
        for token in ["t1\n", "t\u{7f}", "a\rb", "\0"] {
            let err =
                resolve_auth_mode(SIMSCHWAB_API_URL, Credentials::static_token(token)).unwrap_err();
            assert_eq!(err, ConfigError::InvalidStaticToken, "{:?}", token);
        }

        let (_, mode) =
            resolve_auth_mode(SIMSCHWAB_API_URL, Credentials::static_token("abc.DEF-123_~+/="))
                .unwrap();
        assert_eq!(mode.static_token(), Some("abc.DEF-123_~+/="));
    }

    #[test]
    fn test_credential_presence() {
        assert!(!Credentials::new().has_static_token());
        assert!(!Credentials::new().has_oauth_credentials());
        assert!(!Credentials::static_token("").has_static_token());
        assert!(Credentials::static_token("t1").has_static_token());
        assert!(Credentials::new().with_app_secret("secret").has_oauth_credentials());
        assert!(!Credentials::new().with_app_key("").has_oauth_credentials());
    }

    #[test]
    fn test_production_with_static_token() {
        let err =
            resolve_auth_mode(SCHWAB_API_URL, Credentials::static_token("bad-token")).unwrap_err();
        assert_eq!(err, ConfigError::StaticTokenNotAllowed);

        let credentials = Credentials::oauth("key", "secret").with_static_token("bad-token");
        let err = resolve_auth_mode(SCHWAB_API_URL, credentials).unwrap_err();
        assert_eq!(err, ConfigError::StaticTokenNotAllowed);
    }

    #[test]
    fn test_production_without_credentials() {
        let err = resolve_auth_mode(SCHWAB_API_URL, Credentials::new()).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials);
    }

    #[test]
    fn test_production_with_partial_credentials() {
        let err =
            resolve_auth_mode(SCHWAB_API_URL, Credentials::new().with_app_key("key")).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials);

        let err = resolve_auth_mode(SCHWAB_API_URL, Credentials::new().with_app_secret("secret"))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials);
    }

    #[test]
    fn test_production_with_credentials() {
        let (url, mode) =
            resolve_auth_mode(SCHWAB_API_URL, Credentials::oauth("key", "secret")).unwrap();
        assert_eq!(url.kind(), UrlKind::Production);
        match mode {
            AuthMode::OAuthManaged {
                credentials,
                token_state,
            } => {
                assert_eq!(credentials.app_key(), "key");
                assert_eq!(credentials.app_secret().expose_secret(), "secret");
                assert!(!token_state.is_initialized());
            }
            AuthMode::StaticToken { .. } => panic!("Expected OAuthManaged"),
        }
    }

    #[test]
    fn test_invalid_url_wins_over_credentials() {
        let cases = [
            Credentials::new(),
            Credentials::static_token("x"),
            Credentials::oauth("key", "secret"),
        ];
        for credentials in cases {
            for url in ["http://evil.com:9004", "https://localhost:9004", "http://localhost"] {
                let err = resolve_auth_mode(url, credentials.clone()).unwrap_err();
                assert_eq!(
                    err,
                    ConfigError::InvalidBaseUrl {
                        url: url.to_string()
                    }
                );
            }
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::oauth("key", "super-secret").with_static_token("tok-secret");
        let debug_str = format!("{:?}", credentials);
        assert!(!debug_str.contains("super-secret"));
        assert!(!debug_str.contains("tok-secret"));

        let (_, mode) =
            resolve_auth_mode(SIMSCHWAB_API_URL, Credentials::static_token("tok-secret")).unwrap();
        assert!(!format!("{:?}", mode).contains("tok-secret"));
    }
}
