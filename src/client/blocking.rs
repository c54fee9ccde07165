//! Blocking HTTP client for the Schwab API and SimSchwab.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use secrecy::SecretString;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::auth::{resolve_auth_mode, AuthMode, Credentials, OAuthCredentials, TokenRefresher, TokenState};
use crate::models::BaseUrl;
use crate::{Error, Result};

use super::config::ClientConfig;
use super::http::{bearer, decode_body, default_headers, error_for_status, retry_after};

/// The blocking client for the Schwab API.
///
/// Resolution semantics are identical to [`AsyncClient`](super::AsyncClient).
/// Like `reqwest::blocking::Client`, this client must not be created or
/// dropped from within an async runtime.
///
/// # Example
///
/// ```no_run
/// use schwabdev_rs::{Client, SIMSCHWAB_API_URL};
///
/// # fn example() -> schwabdev_rs::Result<()> {
/// let client = Client::builder(SIMSCHWAB_API_URL)
///     .static_token("sim-token")
///     .build()?;
///
/// assert!(!client.update_tokens()?);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::blocking::Client,
    base_url: BaseUrl,
    auth: BlockingAuth,
    default_headers: HeaderMap,
    config: ClientConfig,
}

enum BlockingAuth {
    Static {
        token: SecretString,
    },
    OAuth {
        credentials: OAuthCredentials,
        tokens: Mutex<TokenState>,
        refresher: Option<Box<dyn TokenRefresher>>,
    },
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    base_url: String,
    credentials: Credentials,
    token_state: Option<TokenState>,
    refresher: Option<Box<dyn TokenRefresher>>,
    config: ClientConfig,
}

impl ClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::new(),
            token_state: None,
            refresher: None,
            config: ClientConfig::default(),
        }
    }

    /// Set the OAuth app key.
    pub fn app_key(mut self, app_key: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_app_key(app_key);
        self
    }

    /// Set the OAuth app secret.
    pub fn app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_app_secret(app_secret);
        self
    }

    /// Set the SimSchwab static token.
    pub fn static_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_static_token(token);
        self
    }

    /// Replace all credentials at once.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Seed an OAuth client with previously issued tokens.
    ///
    /// Ignored for static-token clients.
    pub fn token_state(mut self, tokens: TokenState) -> Self {
        self.token_state = Some(tokens);
        self
    }

    /// Set the collaborator that performs OAuth token refreshes.
    ///
    /// Ignored for static-token clients.
    pub fn refresher(mut self, refresher: impl TokenRefresher + 'static) -> Self {
        self.refresher = Some(Box::new(refresher));
        self
    }

    /// Set the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL or credentials are
    /// rejected. Nothing is allocated in that case.
    pub fn build(self) -> Result<Client> {
        let (base_url, mode) = resolve_auth_mode(&self.base_url, self.credentials)?;
        let default_headers = default_headers(&mode)?;

        let http = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(&self.config.user_agent)
            .default_headers(default_headers.clone())
            .build()?;

        tracing::info!(base_url = %base_url, mode = mode.name(), "built blocking client");

        let auth = match mode {
            AuthMode::StaticToken { token } => BlockingAuth::Static { token },
            AuthMode::OAuthManaged {
                credentials,
                token_state,
            } => BlockingAuth::OAuth {
                credentials,
                tokens: Mutex::new(self.token_state.unwrap_or(token_state)),
                refresher: self.refresher,
            },
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                auth,
                default_headers,
                config: self.config,
            }),
        })
    }
}

impl Client {
    /// Start building a client for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Build a SimSchwab client authenticated with `token`.
    pub fn simulation(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::builder(base_url).static_token(token).build()
    }

    /// The validated base URL.
    pub fn base_url(&self) -> &BaseUrl {
        &self.inner.base_url
    }

    /// Returns `true` if this client targets SimSchwab.
    pub fn is_simulation(&self) -> bool {
        self.inner.base_url.is_simulation()
    }

    /// Returns `true` if this client uses a static token.
    pub fn is_static_token(&self) -> bool {
        matches!(self.inner.auth, BlockingAuth::Static { .. })
    }

    /// Headers sent with every request.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Snapshot of the resolved authentication mode.
    pub fn auth_mode(&self) -> AuthMode {
        match &self.inner.auth {
            BlockingAuth::Static { token } => AuthMode::StaticToken {
                token: token.clone(),
            },
            BlockingAuth::OAuth {
                credentials,
                tokens,
                ..
            } => AuthMode::OAuthManaged {
                credentials: credentials.clone(),
                token_state: lock(tokens).clone(),
            },
        }
    }

    /// Snapshot of the OAuth token state, or `None` for static-token clients.
    pub fn token_state(&self) -> Option<TokenState> {
        match &self.inner.auth {
            BlockingAuth::Static { .. } => None,
            BlockingAuth::OAuth { tokens, .. } => Some(lock(tokens).clone()),
        }
    }

    /// Get the access token to send with requests.
    ///
    /// See [`AsyncClient::get_access_token`](super::AsyncClient::get_access_token).
    pub fn get_access_token(&self) -> Result<SecretString> {
        match &self.inner.auth {
            BlockingAuth::Static { token } => Ok(token.clone()),
            BlockingAuth::OAuth { tokens, .. } => {
                if self.inner.config.auto_refresh_session {
                    self.update_tokens()?;
                }
                lock(tokens)
                    .access_token()
                    .cloned()
                    .ok_or(Error::SessionExpired)
            }
        }
    }

    /// Refresh OAuth tokens if the access token is missing or near expiry.
    ///
    /// See [`AsyncClient::update_tokens`](super::AsyncClient::update_tokens).
    pub fn update_tokens(&self) -> Result<bool> {
        let BlockingAuth::OAuth {
            credentials,
            tokens,
            refresher,
        } = &self.inner.auth
        else {
            return Ok(false);
        };

        let mut tokens = lock(tokens);
        if !tokens.access_token_expires_within(self.inner.config.refresh_buffer()) {
            return Ok(false);
        }

        let Some(refresher) = refresher else {
            return Err(Error::Authentication(
                "access token needs refresh but no token refresher is configured".to_string(),
            ));
        };
        if tokens.is_initialized() && tokens.refresh_token_expired(Utc::now()) {
            tracing::warn!("refresh token expired; refresher must re-authorize");
        }

        let refreshed = refresher.refresh(credentials, &mut tokens)?;
        tracing::info!(refreshed, "access token refresh");
        Ok(refreshed)
    }

    /// Make a GET request.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers()?;

        let response = self.inner.http.get(url).headers(headers).send()?;

        handle_response(response)
    }

    /// Make a GET request with query parameters.
    pub fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers()?;

        let response = self
            .inner
            .http
            .get(url)
            .headers(headers)
            .query(query)
            .send()?;

        handle_response(response)
    }

    /// Make a POST request.
    pub fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers()?;

        let response = self.inner.http.post(url).headers(headers).json(body).send()?;

        handle_response(response)
    }

    /// Make a PUT request.
    pub fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers()?;

        let response = self.inner.http.put(url).headers(headers).json(body).send()?;

        handle_response(response)
    }

    /// Make a DELETE request.
    pub fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers()?;

        let response = self.inner.http.delete(url).headers(headers).send()?;

        handle_response(response)
    }

    fn request_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let BlockingAuth::OAuth { .. } = self.inner.auth {
            let token = self.get_access_token()?;
            headers.insert(AUTHORIZATION, bearer(&token)?);
        }
        Ok(headers)
    }
}

// A panicking refresher must not wedge the client.
fn lock(tokens: &Mutex<TokenState>) -> MutexGuard<'_, TokenState> {
    tokens.lock().unwrap_or_else(PoisonError::into_inner)
}

fn handle_response<T: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        let bytes = response.bytes()?;
        decode_body(&bytes)
    } else {
        let retry_after = retry_after(response.headers());
        let body: Value = response.json().unwrap_or_default();
        Err(error_for_status(status.as_u16(), body, retry_after))
    }
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.inner.auth {
            BlockingAuth::Static { .. } => "static_token",
            BlockingAuth::OAuth { .. } => "oauth_managed",
        };
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("mode", &mode)
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SCHWAB_API_URL, SIMSCHWAB_API_URL};
    use crate::ConfigError;
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_simulation_with_static_token_succeeds() {
        let client = Client::builder(SIMSCHWAB_API_URL)
            .static_token("test-token-123")
            .build()
            .unwrap();

        assert!(client.is_simulation());
        assert!(client.is_static_token());
        assert!(client.token_state().is_none());
        assert_eq!(client.auth_mode().static_token(), Some("test-token-123"));
        assert_eq!(client.get_access_token().unwrap().expose_secret(), "test-token-123");
    }

    #[test]
    fn test_update_tokens_noop_for_static_token() {
        let client = Client::simulation(SIMSCHWAB_API_URL, "test-token").unwrap();

        for _ in 0..3 {
            assert!(!client.update_tokens().unwrap());
            assert_eq!(client.get_access_token().unwrap().expose_secret(), "test-token");
        }
    }

    #[test]
    fn test_session_header_uses_static_token() {
        let client = Client::simulation(SIMSCHWAB_API_URL, "my-bearer-token").unwrap();
        let auth_header = client.default_headers().get(AUTHORIZATION).unwrap();
        assert_eq!(auth_header, "Bearer my-bearer-token");
    }

    #[test]
    fn test_construction_errors() {
        let err = Client::builder(SIMSCHWAB_API_URL).build().unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingStaticToken)));

        let err = Client::simulation(SCHWAB_API_URL, "bad-token").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::StaticTokenNotAllowed)));

        let err = Client::builder(SCHWAB_API_URL).build().unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingCredentials)));

        let err = Client::simulation("http://localhost", "token").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_header_illegal_static_token_is_config_error() {
        for token in ["t1\n", "t\u{7f}"] {
            let err = Client::simulation(SIMSCHWAB_API_URL, token).unwrap_err();
            assert!(err.is_config_error(), "{:?}", err);
            assert!(matches!(err, Error::Config(ConfigError::InvalidStaticToken)));
        }
    }

    #[test]
    fn test_oauth_client_without_refresher() {
        let client = Client::builder(SCHWAB_API_URL)
            .app_key("key")
            .app_secret("secret")
            .build()
            .unwrap();

        assert!(!client.is_static_token());
        assert!(client.default_headers().get(AUTHORIZATION).is_none());
        assert!(!client.token_state().unwrap().is_initialized());
        assert!(matches!(client.update_tokens(), Err(Error::Authentication(_))));
    }

    #[test]
    fn test_oauth_client_refreshes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let client = Client::builder(SCHWAB_API_URL)
            .app_key("key")
            .app_secret("secret")
            .refresher(move |credentials: &OAuthCredentials, tokens: &mut TokenState| -> Result<bool> {
                assert_eq!(credentials.app_key(), "key");
                counter.fetch_add(1, Ordering::SeqCst);
                tokens.record_access_token("fresh-access", Utc::now());
                tokens.record_refresh_token("fresh-refresh", Utc::now());
                Ok(true)
            })
            .build()
            .unwrap();

        assert!(client.update_tokens().unwrap());
        assert!(!client.update_tokens().unwrap());
        assert_eq!(client.get_access_token().unwrap().expose_secret(), "fresh-access");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_oauth_client_with_seeded_tokens() {
        let client = Client::builder(SCHWAB_API_URL)
            .credentials(Credentials::oauth("key", "secret"))
            .token_state(TokenState::with_tokens("seeded", "refresh", Utc::now()))
            .build()
            .unwrap();

        assert!(!client.update_tokens().unwrap());
        assert_eq!(client.get_access_token().unwrap().expose_secret(), "seeded");
    }

    #[test]
    fn test_oauth_client_without_auto_refresh() {
        let client = Client::builder(SCHWAB_API_URL)
            .credentials(Credentials::oauth("key", "secret"))
            .config(ClientConfig::default().with_auto_refresh(false))
            .build()
            .unwrap();

        assert!(matches!(client.get_access_token(), Err(Error::SessionExpired)));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let client = Client::simulation(SIMSCHWAB_API_URL, "leaky-token").unwrap();
        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("leaky-token"));
        assert!(debug_str.contains("static_token"));
    }
}
