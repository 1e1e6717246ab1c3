use once_cell::sync::Lazy;
use std::env;

pub static PRODUCTION_ENDPOINT: Lazy<String> = Lazy::new(|| {
    env::var("EBAY_TRADING_ENDPOINT").unwrap_or_else(|_| "https://api.ebay.com/ws/api.dll".into())
});

pub static SANDBOX_ENDPOINT: Lazy<String> = Lazy::new(|| {
    env::var("EBAY_SANDBOX_TRADING_ENDPOINT")
        .unwrap_or_else(|_| "https://api.sandbox.ebay.com/ws/api.dll".into())
});

pub static COMPATIBILITY_LEVEL: Lazy<String> =
    Lazy::new(|| env::var("EBAY_COMPATIBILITY_LEVEL").unwrap_or_else(|_| "967".to_string()));

pub static HTTP_TIMEOUT_SECS: Lazy<u64> =
    Lazy::new(|| parse_secs("EBAY_HTTP_TIMEOUT_SECS").unwrap_or(30));

pub static HTTP_CONNECT_TIMEOUT_SECS: Lazy<u64> =
    Lazy::new(|| parse_secs("EBAY_HTTP_CONNECT_TIMEOUT_SECS").unwrap_or(5));

pub const XML_NAMESPACE: &str = "urn:ebay:apis:eBLBaseComponents";

pub fn endpoint(sandbox: bool) -> &'static str {
    if sandbox {
        SANDBOX_ENDPOINT.as_str()
    } else {
        PRODUCTION_ENDPOINT.as_str()
    }
}

fn parse_secs(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
}
