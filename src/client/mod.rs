//! Blocking and async clients for the Schwab API.
//!
//! Both clients run the same construction-time checks: the base URL is
//! classified, the authentication mode is resolved, and only then is an
//! HTTP session created.
//!
//! # Example
//!
//! ```no_run
//! use schwabdev_rs::{AsyncClient, SCHWAB_API_URL};
//!
//! # async fn example() -> schwabdev_rs::Result<()> {
//! let client = AsyncClient::builder(SCHWAB_API_URL)
//!     .app_key("app-key")
//!     .app_secret("app-secret")
//!     .build()?;
//!
//! let refreshed = client.update_tokens().await;
//! # Ok(())
//! # }
//! ```

mod blocking;
mod config;
mod http;

pub use blocking::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use http::{AsyncClient, AsyncClientBuilder};
