//! OAuth token state and the refresh collaborators that mutate it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;

use super::mode::OAuthCredentials;
use crate::Result;

/// Lifetime in seconds of an access token issued by the production API.
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 30 * 60;

/// Lifetime in seconds of a refresh token issued by the production API.
pub const REFRESH_TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

/// Mutable token state of an OAuth-managed client.
///
/// A freshly resolved client starts with an uninitialized state; a
/// [`TokenRefresher`] fills it in. Previously persisted tokens can be
/// seeded with [`TokenState::with_tokens`].
#[derive(Clone, Default)]
pub struct TokenState {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    id_token: Option<SecretString>,
    access_token_issued: Option<DateTime<Utc>>,
    refresh_token_issued: Option<DateTime<Utc>>,
}

impl TokenState {
    /// Create an uninitialized token state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state seeded with an existing token pair, both issued at
    /// `issued_at`.
    pub fn with_tokens(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Some(SecretString::from(access_token.into())),
            refresh_token: Some(SecretString::from(refresh_token.into())),
            id_token: None,
            access_token_issued: Some(issued_at),
            refresh_token_issued: Some(issued_at),
        }
    }

    /// Returns `true` once an access token has been recorded.
    pub fn is_initialized(&self) -> bool {
        self.access_token.is_some()
    }

    /// The current access token, if any.
    pub fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }

    /// The current refresh token, if any.
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    /// The current id token, if any.
    pub fn id_token(&self) -> Option<&SecretString> {
        self.id_token.as_ref()
    }

    /// Record a newly issued access token.
    pub fn record_access_token(&mut self, token: impl Into<String>, issued_at: DateTime<Utc>) {
        self.access_token = Some(SecretString::from(token.into()));
        self.access_token_issued = Some(issued_at);
    }

    /// Record a newly issued refresh token.
    pub fn record_refresh_token(&mut self, token: impl Into<String>, issued_at: DateTime<Utc>) {
        self.refresh_token = Some(SecretString::from(token.into()));
        self.refresh_token_issued = Some(issued_at);
    }

    /// Record the id token returned alongside an access token.
    pub fn set_id_token(&mut self, token: impl Into<String>) {
        self.id_token = Some(SecretString::from(token.into()));
    }

    /// When the current access token expires.
    pub fn access_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_token_issued
            .map(|issued| issued + Duration::seconds(ACCESS_TOKEN_LIFETIME_SECS))
    }

    /// When the current refresh token expires.
    pub fn refresh_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.refresh_token_issued
            .map(|issued| issued + Duration::seconds(REFRESH_TOKEN_LIFETIME_SECS))
    }

    /// Check if the access token is missing or will expire within `buffer`.
    pub fn access_token_expires_within(&self, buffer: Duration) -> bool {
        match (&self.access_token, self.access_token_expires_at()) {
            (Some(_), Some(expires_at)) => Utc::now() + buffer >= expires_at,
            _ => true,
        }
    }

    /// Check if the refresh token is missing or expired at `now`.
    pub fn refresh_token_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_token_expires_at()) {
            (Some(_), Some(expires_at)) => now >= expires_at,
            _ => true,
        }
    }
}

impl std::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<SecretString>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("TokenState")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("id_token", &redact(&self.id_token))
            .field("access_token_issued", &self.access_token_issued)
            .field("refresh_token_issued", &self.refresh_token_issued)
            .finish()
    }
}

/// Performs the OAuth token exchange for a blocking client.
///
/// Implementations talk to the Schwab OAuth endpoint and write the new
/// tokens into `tokens`. They are only invoked when the access token is
/// missing or about to expire.
pub trait TokenRefresher: Send + Sync {
    /// Refresh `tokens`, returning `true` if new tokens were recorded.
    fn refresh(&self, credentials: &OAuthCredentials, tokens: &mut TokenState) -> Result<bool>;
}

/// Performs the OAuth token exchange for an async client.
#[async_trait]
pub trait AsyncTokenRefresher: Send + Sync {
    /// Refresh `tokens`, returning `true` if new tokens were recorded.
    async fn refresh(&self, credentials: &OAuthCredentials, tokens: &mut TokenState)
        -> Result<bool>;
}

impl<F> TokenRefresher for F
where
    F: Fn(&OAuthCredentials, &mut TokenState) -> Result<bool> + Send + Sync,
{
    fn refresh(&self, credentials: &OAuthCredentials, tokens: &mut TokenState) -> Result<bool> {
        self(credentials, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_uninitialized_state() {
        let state = TokenState::new();
        assert!(!state.is_initialized());
        assert!(state.access_token().is_none());
        assert!(state.access_token_expires_within(Duration::zero()));
        assert!(state.refresh_token_expired(Utc::now()));
    }

    #[test]
    fn test_seeded_state_is_fresh() {
        let state = TokenState::with_tokens("access", "refresh", Utc::now());
        assert!(state.is_initialized());
        assert_eq!(state.access_token().unwrap().expose_secret(), "access");
        assert!(!state.access_token_expires_within(Duration::seconds(60)));
        assert!(!state.refresh_token_expired(Utc::now()));
    }

    #[test]
    fn test_access_token_expiry() {
        let issued = Utc::now() - Duration::minutes(29) - Duration::seconds(30);
        let state = TokenState::with_tokens("access", "refresh", issued);
        assert!(!state.access_token_expires_within(Duration::zero()));
        assert!(state.access_token_expires_within(Duration::seconds(60)));
        assert_eq!(
            state.access_token_expires_at(),
            Some(issued + Duration::seconds(ACCESS_TOKEN_LIFETIME_SECS))
        );
    }

    #[test]
    fn test_refresh_token_expiry() {
        let issued = Utc::now() - Duration::days(8);
        let state = TokenState::with_tokens("access", "refresh", issued);
        assert!(state.refresh_token_expired(Utc::now()));
        assert!(!state.refresh_token_expired(issued + Duration::days(6)));
    }

    #[test]
    fn test_record_tokens() {
        let mut state = TokenState::new();
        let now = Utc::now();
        state.record_access_token("new-access", now);
        state.record_refresh_token("new-refresh", now);
        state.set_id_token("id");

        assert_eq!(state.access_token().unwrap().expose_secret(), "new-access");
        assert_eq!(state.refresh_token().unwrap().expose_secret(), "new-refresh");
        assert_eq!(state.id_token().unwrap().expose_secret(), "id");
        assert_eq!(state.refresh_token_expires_at(), Some(now + Duration::days(7)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let state = TokenState::with_tokens("super-secret-access", "super-secret-refresh", Utc::now());
        let debug_str = format!("{:?}", state);
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_closure_refresher() {
        let refresher = |_: &OAuthCredentials, tokens: &mut TokenState| -> Result<bool> {
            tokens.record_access_token("from-closure", Utc::now());
            Ok(true)
        };
        let credentials = OAuthCredentials::new("key", "secret");
        let mut state = TokenState::new();

        assert!(refresher.refresh(&credentials, &mut state).unwrap());
        assert_eq!(state.access_token().unwrap().expose_secret(), "from-closure");
    }
}
