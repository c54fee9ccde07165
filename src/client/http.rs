//! Async HTTP client for the Schwab API and SimSchwab.

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::auth::{
    resolve_auth_mode, AsyncTokenRefresher, AuthMode, Credentials, OAuthCredentials, TokenState,
};
use crate::models::BaseUrl;
use crate::{Error, Result};

use super::config::ClientConfig;

/// The async client for the Schwab API.
///
/// Building a client validates the base URL and resolves the
/// authentication mode before any HTTP resources are created. A
/// misconfigured client is never returned.
///
/// # Example
///
/// ```no_run
/// use schwabdev_rs::{AsyncClient, SIMSCHWAB_API_URL};
///
/// # async fn example() -> schwabdev_rs::Result<()> {
/// let client = AsyncClient::builder(SIMSCHWAB_API_URL)
///     .static_token("sim-token")
///     .build()?;
///
/// let accounts: serde_json::Value = client.get("/trader/v1/accounts").await?;
/// # Ok(())
/// # }
/// ```
pub struct AsyncClient {
    pub(crate) inner: Arc<AsyncClientInner>,
}

pub(crate) struct AsyncClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: BaseUrl,
    pub(crate) auth: AsyncAuth,
    pub(crate) default_headers: HeaderMap,
    pub(crate) config: ClientConfig,
}

pub(crate) enum AsyncAuth {
    Static {
        token: SecretString,
    },
    OAuth {
        credentials: OAuthCredentials,
        tokens: RwLock<TokenState>,
        refresher: Option<Arc<dyn AsyncTokenRefresher>>,
    },
}

/// Builder for [`AsyncClient`].
pub struct AsyncClientBuilder {
    base_url: String,
    credentials: Credentials,
    token_state: Option<TokenState>,
    refresher: Option<Arc<dyn AsyncTokenRefresher>>,
    config: ClientConfig,
}

impl AsyncClientBuilder {
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
    pub fn refresher(mut self, refresher: impl AsyncTokenRefresher + 'static) -> Self {
        self.refresher = Some(Arc::new(refresher));
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
    pub fn build(self) -> Result<AsyncClient> {
        let (base_url, mode) = resolve_auth_mode(&self.base_url, self.credentials)?;
        let default_headers = default_headers(&mode)?;

        let http = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(&self.config.user_agent)
            .default_headers(default_headers.clone())
            .build()?;

        tracing::info!(base_url = %base_url, mode = mode.name(), "built async client");

        let auth = match mode {
            AuthMode::StaticToken { token } => AsyncAuth::Static { token },
            AuthMode::OAuthManaged {
                credentials,
                token_state,
            } => AsyncAuth::OAuth {
                credentials,
                tokens: RwLock::new(self.token_state.unwrap_or(token_state)),
                refresher: self.refresher,
            },
        };

        Ok(AsyncClient {
            inner: Arc::new(AsyncClientInner {
                http,
                base_url,
                auth,
                default_headers,
                config: self.config,
            }),
        })
    }
}

impl AsyncClient {
    /// Start building a client for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> AsyncClientBuilder {
        AsyncClientBuilder::new(base_url)
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
        matches!(self.inner.auth, AsyncAuth::Static { .. })
    }

    /// Headers sent with every request.
    ///
    /// For static-token clients this includes `Authorization: Bearer <token>`.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Snapshot of the resolved authentication mode.
    pub async fn auth_mode(&self) -> AuthMode {
        match &self.inner.auth {
            AsyncAuth::Static { token } => AuthMode::StaticToken {
                token: token.clone(),
            },
            AsyncAuth::OAuth {
                credentials,
                tokens,
                ..
            } => AuthMode::OAuthManaged {
                credentials: credentials.clone(),
                token_state: tokens.read().await.clone(),
            },
        }
    }

    /// Snapshot of the OAuth token state, or `None` for static-token clients.
    pub async fn token_state(&self) -> Option<TokenState> {
        match &self.inner.auth {
            AsyncAuth::Static { .. } => None,
            AsyncAuth::OAuth { tokens, .. } => Some(tokens.read().await.clone()),
        }
    }

    /// Get the access token to send with requests.
    ///
    /// Static-token clients return their token unchanged. OAuth clients
    /// refresh first when auto-refresh is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionExpired`] if an OAuth client holds no access
    /// token, or any error from the refresher.
    pub async fn get_access_token(&self) -> Result<SecretString> {
        match &self.inner.auth {
            AsyncAuth::Static { token } => Ok(token.clone()),
            AsyncAuth::OAuth { tokens, .. } => {
                if self.inner.config.auto_refresh_session {
                    self.update_tokens().await?;
                }
                tokens
                    .read()
                    .await
                    .access_token()
                    .cloned()
                    .ok_or(Error::SessionExpired)
            }
        }
    }

    /// Refresh OAuth tokens if the access token is missing or near expiry.
    ///
    /// Returns `Ok(true)` if the refresher recorded new tokens. Static-token
    /// clients always return `Ok(false)` without contacting any endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if a refresh is needed but no
    /// refresher was configured.
    pub async fn update_tokens(&self) -> Result<bool> {
        let AsyncAuth::OAuth {
            credentials,
            tokens,
            refresher,
        } = &self.inner.auth
        else {
            return Ok(false);
        };

        let buffer = self.inner.config.refresh_buffer();
        if !tokens.read().await.access_token_expires_within(buffer) {
            return Ok(false);
        }

        let Some(refresher) = refresher else {
            return Err(Error::Authentication(
                "access token needs refresh but no token refresher is configured".to_string(),
            ));
        };

        let mut tokens = tokens.write().await;
        // Another task may have refreshed while we waited for the lock
        if !tokens.access_token_expires_within(buffer) {
            return Ok(false);
        }
        if tokens.is_initialized() && tokens.refresh_token_expired(Utc::now()) {
            tracing::warn!("refresh token expired; refresher must re-authorize");
        }

        let refreshed = refresher.refresh(credentials, &mut tokens).await?;
        tracing::info!(refreshed, "access token refresh");
        Ok(refreshed)
    }

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers().await?;

        let response = self.inner.http.get(url).headers(headers).send().await?;

        handle_response(response).await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers().await?;

        let response = self
            .inner
            .http
            .get(url)
            .headers(headers)
            .query(query)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Make a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers().await?;

        let response = self
            .inner
            .http
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Make a PUT request.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers().await?;

        let response = self
            .inner
            .http
            .put(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Make a DELETE request.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.inner.base_url.join(path)?;
        let headers = self.request_headers().await?;

        let response = self.inner.http.delete(url).headers(headers).send().await?;

        handle_response(response).await
    }

    /// Per-request headers. Static-token auth is already in the defaults.
    async fn request_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let AsyncAuth::OAuth { .. } = self.inner.auth {
            let token = self.get_access_token().await?;
            headers.insert(AUTHORIZATION, bearer(&token)?);
        }
        Ok(headers)
    }
}

/// Default session headers for a resolved mode.
pub(crate) fn default_headers(mode: &AuthMode) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let AuthMode::StaticToken { token } = mode {
        headers.insert(AUTHORIZATION, bearer(token)?);
    }
    Ok(headers)
}

/// `Bearer <token>` header value, marked sensitive.
pub(crate) fn bearer(token: &SecretString) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
        .map_err(|_| Error::InvalidInput("Invalid token format".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Decode a response body, treating an empty body as JSON `null`.
pub(crate) fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        Ok(serde_json::from_value(Value::Null)?)
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Map a non-success status and body to an error.
pub(crate) fn error_for_status(status: u16, body: Value, retry_after: Option<u64>) -> Error {
    match status {
        429 => Error::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        401 => Error::SessionExpired,
        404 => {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Resource not found")
                .to_string();
            Error::NotFound(message)
        }
        _ => Error::from_api_response(status, body),
    }
}

/// `Retry-After` header in seconds, if present.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        let bytes = response.bytes().await?;
        decode_body(&bytes)
    } else {
        let retry_after = retry_after(response.headers());
        let body: Value = response.json().await.unwrap_or_default();
        Err(error_for_status(status.as_u16(), body, retry_after))
    }
}

impl Clone for AsyncClient {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for AsyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.inner.auth {
            AsyncAuth::Static { .. } => "static_token",
            AsyncAuth::OAuth { .. } => "oauth_managed",
        };
        f.debug_struct("AsyncClient")
            .field("base_url", &self.inner.base_url)
            .field("mode", &mode)
            .field("config", &self.inner.config)
            .finish()
    }
}
