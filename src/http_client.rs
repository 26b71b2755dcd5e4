use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Connect timeout applied to every outbound request
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build the shared HTTP client used for the OAuth and Telegram calls
pub fn build_client(request_timeout: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("authctl/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(request_timeout))
        .build()
        .context("Failed to create HTTP client")?;

    tracing::debug!(timeout_secs = request_timeout, "HTTP client initialized");
    Ok(client)
}
