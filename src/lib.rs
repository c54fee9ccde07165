//! # schwabdev-rs
//!
//! A Rust client for the Schwab trading API, with first-class support for
//! SimSchwab, a local stand-in service for testing trading code.
//!
//! ## Authentication Modes
//!
//! Every client authenticates in exactly one of two ways, decided when it
//! is built:
//!
//! - **Production** (`https://api.schwabapi.com`): OAuth with an app key
//!   and app secret. Access tokens are refreshed through a pluggable
//!   refresher.
//! - **SimSchwab** (`http://localhost:<port>`): a fixed bearer token sent
//!   with every request and never refreshed.
//!
//! Any other base URL, or a mismatched combination of URL and credentials,
//! is rejected with a [`ConfigError`] before any HTTP resources are
//! created.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schwabdev_rs::{AsyncClient, SIMSCHWAB_API_URL};
//!
//! #[tokio::main]
//! async fn main() -> schwabdev_rs::Result<()> {
//!     let client = AsyncClient::builder(SIMSCHWAB_API_URL)
//!         .static_token("sim-token")
//!         .build()?;
//!
//!     let accounts: serde_json::Value = client.get("/trader/v1/accounts").await?;
//!     println!("{}", accounts);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## URL Validation
//!
//! ```rust
//! use schwabdev_rs::{is_simulation_url, is_valid_base_url};
//!
//! assert!(is_valid_base_url("https://api.schwabapi.com"));
//! assert!(is_simulation_url("http://localhost:8080"));
//! assert!(!is_valid_base_url("https://localhost:8080"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

// Re-export primary types at crate root for convenience
pub use auth::{resolve_auth_mode, AuthMode, Credentials, TokenState};
pub use client::{AsyncClient, Client, ClientConfig};
pub use error::{ConfigError, Error, Result};
pub use models::{
    is_simulation_url, is_valid_base_url, BaseUrl, UrlKind, SCHWAB_API_URL, SIMSCHWAB_API_URL,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use schwabdev_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::{
        AsyncTokenRefresher, AuthMode, Credentials, OAuthCredentials, TokenRefresher, TokenState,
    };
    pub use crate::client::{AsyncClient, Client, ClientConfig};
    pub use crate::error::{ConfigError, Error, Result};
    pub use crate::models::{BaseUrl, UrlKind, SCHWAB_API_URL, SIMSCHWAB_API_URL};
}
