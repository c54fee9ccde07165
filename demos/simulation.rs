//! SimSchwab example.
//!
//! Connects to a local SimSchwab instance with a static bearer token and
//! lists the account numbers it knows about.
//!
//! Run with: SCHWAB_STATIC_TOKEN=... cargo run --example simulation

use schwabdev_rs::auth::{Credentials, ENV_BASE_URL};
use schwabdev_rs::{AsyncClient, SIMSCHWAB_API_URL};

#[tokio::main]
async fn main() -> schwabdev_rs::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let base_url = std::env::var(ENV_BASE_URL).unwrap_or_else(|_| SIMSCHWAB_API_URL.to_string());

    println!("Connecting to SimSchwab at {}...", base_url);

    let client = AsyncClient::builder(base_url)
        .credentials(Credentials::from_env())
        .build()?;

    // Static tokens never refresh
    assert!(!client.update_tokens().await?);

    let accounts: serde_json::Value = client.get("/trader/v1/accounts/accountNumbers").await?;
    println!("Accounts: {:#}", accounts);

    Ok(())
}
