//! Authentication mode selection and token management.
//!
//! A client authenticates in exactly one of two ways, chosen from its base
//! URL when it is built:
//!
//! 1. **OAuth** - the production API. Requires an app key and app secret;
//!    access tokens are refreshed through a [`TokenRefresher`] or
//!    [`AsyncTokenRefresher`].
//! 2. **Static token** - a SimSchwab instance on `http://localhost:<port>`.
//!    A fixed bearer token is sent with every request and never refreshed.
//!
//! Mixing the two (a static token against production, or OAuth
//! credentials against SimSchwab) is a [`ConfigError`](crate::ConfigError).
//!
//! ```
//! use schwabdev_rs::{AuthMode, BaseUrl, Credentials};
//!
//! let url = BaseUrl::parse("http://localhost:9004")?;
//! let mode = AuthMode::resolve(&url, Credentials::static_token("sim-token"))?;
//! assert!(mode.is_static_token());
//! # Ok::<(), schwabdev_rs::ConfigError>(())
//! ```

mod mode;
mod tokens;

pub use mode::{
    base_url_from_env, resolve_auth_mode, AuthMode, Credentials, OAuthCredentials,
    ENV_APP_KEY, ENV_APP_SECRET, ENV_BASE_URL, ENV_STATIC_TOKEN,
};
pub use tokens::{
    AsyncTokenRefresher, TokenRefresher, TokenState, ACCESS_TOKEN_LIFETIME_SECS,
    REFRESH_TOKEN_LIFETIME_SECS,
};
