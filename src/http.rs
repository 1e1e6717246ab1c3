use crate::ebay::config::{HTTP_CONNECT_TIMEOUT_SECS, HTTP_TIMEOUT_SECS};
use reqwest::Client;
use std::time::Duration;

pub fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(*HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(*HTTP_CONNECT_TIMEOUT_SECS))
        .user_agent(concat!("ebay-sync-rs/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}
