use crate::ebay::response::Node;
use crate::ebay::trading::TradingApi;
use crate::error::{SyncError, SyncResult};
use crate::models::{ContactKind, NewParty, Party};
use crate::store::Store;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

/// Finds the party for an eBay user id, fetching the user only when no
/// local party carries that id yet.
pub async fn find_or_create_party<S: Store, A: TradingApi>(
    store: &mut S,
    api: &A,
    external_user_id: &str,
    item_hint: Option<&str>,
) -> SyncResult<Party> {
    if let Some(existing) = store.parties_by_user_id(external_user_id)?.into_iter().next() {
        debug!(target = "ebay_sync.party", user = external_user_id, party = %existing.id, "party_found");
        crate::metrics::reconcile_outcome("party", "found");
        return Ok(existing);
    }

    let mut params = Map::new();
    params.insert("UserID".into(), json!(external_user_id));
    if let Some(item_id) = item_hint {
        params.insert("ItemID".into(), json!(item_id));
    }
    params.insert("DetailLevel".into(), json!("ReturnAll"));

    let response = api.execute("GetUser", Value::Object(params)).await?;
    create_from_payload(store, response.root())
}

/// Creates a party from a `GetUser` response body.
pub fn create_from_payload<S: Store>(store: &mut S, payload: Node<'_>) -> SyncResult<Party> {
    let user = payload.require(&["User"])?;
    let user_id = user.required_text(&["UserID"])?;

    let party = store.insert_party(NewParty {
        name: user_id.to_string(),
        external_user_id: Some(user_id.to_string()),
    })?;
    if let Some(email) = user.text_at(&["Email"]).filter(|e| !e.trim().is_empty()) {
        store.insert_contact_mechanism(party.id, ContactKind::Email, email)?;
    }

    let holders = store.parties_by_user_id(user_id)?;
    if holders.len() > 1 {
        return Err(SyncError::duplicate(
            "duplicate_party",
            format!("A party already exists for eBay user {user_id}."),
        ));
    }

    info!(target = "ebay_sync.party", user = user_id, party = %party.id, "party_created");
    crate::metrics::reconcile_outcome("party", "created");
    Ok(party)
}
