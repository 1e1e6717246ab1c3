use crate::ebay::trading::TradingApi;
use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub status: String,
    pub expiration_time: Option<DateTime<Utc>>,
}

impl TokenStatus {
    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }
}

/// Asks eBay whether the account's auth token is still usable.
pub async fn token_status<A: TradingApi>(api: &A) -> SyncResult<TokenStatus> {
    let response = api.execute("GetTokenStatus", json!({})).await?;
    let root = response.root();
    let status = root.required_text(&["TokenStatus", "Status"])?.to_string();
    let expiration_time = root
        .text_at(&["TokenStatus", "ExpirationTime"])
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc));

    info!(target = "ebay_sync.auth", status = %status, expires = ?expiration_time, "token_status");
    Ok(TokenStatus {
        status,
        expiration_time,
    })
}
