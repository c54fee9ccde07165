//! Production example with a pluggable token refresher.
//!
//! The refresher here only reuses tokens from the environment; a real
//! application would perform the OAuth token exchange inside it.
//!
//! Run with: cargo run --example production

use chrono::Utc;
use schwabdev_rs::auth::{base_url_from_env, OAuthCredentials, TokenState};
use schwabdev_rs::{Client, Credentials, Error};

fn main() -> schwabdev_rs::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let client = Client::builder(base_url_from_env())
        .credentials(Credentials::from_env())
        .refresher(|credentials: &OAuthCredentials, tokens: &mut TokenState| -> schwabdev_rs::Result<bool> {
            let access = std::env::var("SCHWAB_ACCESS_TOKEN").map_err(|_| {
                Error::Authentication(format!(
                    "no access token available for app key {}",
                    credentials.app_key()
                ))
            })?;
            tokens.record_access_token(access, Utc::now());
            Ok(true)
        })
        .build()?;

    println!("Client: {:?}", client);

    let accounts: serde_json::Value = client.get("/trader/v1/accounts/accountNumbers")?;
    println!("Accounts: {:#}", accounts);

    Ok(())
}
