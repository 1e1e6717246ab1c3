use crate::ebay::listing::{AddItemRequest, InventoryStatus, ReviseInventoryStatusRequest};
use crate::ebay::response::Node;
use crate::ebay::trading::{TradingApi, TradingError};
use crate::error::{SyncError, SyncResult};
use crate::models::{
    Account, FlatShipping, ListingAttributes, ListingDuration, NewProduct, Product,
    ProductValues, ReturnPolicy,
};
use crate::store::{Database, Store};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

/// Items per `ReviseInventoryStatus` call; eBay accepts at most four.
pub const INVENTORY_BATCH_SIZE: usize = 4;

const DEFAULT_RETURN_DESCRIPTION: &str = "No Description";

pub async fn find_or_create_product<S: Store, A: TradingApi>(
    store: &mut S,
    api: &A,
    account: &Account,
    external_item_id: &str,
) -> SyncResult<Product> {
    if let Some(existing) = store.products_by_item_id(external_item_id)?.into_iter().next() {
        crate::metrics::reconcile_outcome("product", "found");
        return Ok(existing);
    }

    let response = api
        .execute(
            "GetItem",
            json!({"ItemID": external_item_id, "DetailLevel": "ReturnAll"}),
        )
        .await?;
    create_from_payload(store, response.root(), account)
}

/// Maps a `GetItem` body onto product values, filling the gaps from the
/// account defaults.
pub fn extract_values(payload: Node<'_>, account: &Account) -> SyncResult<ProductValues> {
    let item = payload.require(&["Item"])?;
    let start_price = item.required_decimal(&["StartPrice"])?;
    let list_price = item
        .decimal_at(&["BuyItNowPrice"])?
        .filter(|price| !price.is_zero())
        .unwrap_or(start_price);

    Ok(ProductValues {
        name: item.required_text(&["Title"])?.to_string(),
        list_price,
        cost_price: start_price,
        default_uom: account.default_uom.clone(),
        sale_uom: account.default_uom.clone(),
        account_expense: account.default_account_expense.clone(),
        account_revenue: account.default_account_revenue.clone(),
        salable: true,
        exportable: true,
        listing: listing_attributes(item)?,
    })
}

fn listing_attributes(item: Node<'_>) -> SyncResult<Option<ListingAttributes>> {
    let Some(category_id) = item.text_at(&["PrimaryCategory", "CategoryID"]) else {
        return Ok(None);
    };
    let Some(listing_duration) = item
        .text_at(&["ListingDuration"])
        .and_then(ListingDuration::from_raw)
    else {
        return Ok(None);
    };

    let dispatch_time_max = match item.text_at(&["DispatchTimeMax"]) {
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            SyncError::invalid_payload(
                "invalid_integer",
                format!("Item.DispatchTimeMax is not a whole number: {raw}"),
            )
        })?,
        None => 0,
    };

    let policy = item.path(&["ReturnPolicy"]);
    let policy_text = |key: &str| {
        policy
            .and_then(|p| p.text_at(&[key]))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let return_policy = ReturnPolicy {
        returns_accepted_option: policy_text("ReturnsAcceptedOption")
            .unwrap_or_else(|| "ReturnsNotAccepted".to_string()),
        refund_option: policy_text("RefundOption"),
        returns_within_option: policy_text("ReturnsWithinOption"),
        description: policy_text("Description")
            .unwrap_or_else(|| DEFAULT_RETURN_DESCRIPTION.to_string()),
        shipping_cost_paid_by_option: policy_text("ShippingCostPaidByOption"),
    };

    let shipping = match item.text_at(&["ShippingDetails", "ShippingType"]) {
        Some("Flat") => {
            match item
                .items_at(&["ShippingDetails", "ShippingServiceOptions"])
                .first()
            {
                Some(option) => Some(FlatShipping {
                    service: option.required_text(&["ShippingService"])?.to_string(),
                    cost: option
                        .decimal_at(&["ShippingServiceCost"])?
                        .unwrap_or(Decimal::ZERO),
                }),
                None => None,
            }
        }
        _ => None,
    };

    let picture_urls = item
        .items_at(&["PictureDetails", "PictureURL"])
        .into_iter()
        .filter_map(|node| node.text().map(str::to_string))
        .collect();

    Ok(Some(ListingAttributes {
        dispatch_time_max,
        listing_duration,
        return_policy,
        shipping,
        category_id: category_id.to_string(),
        picture_urls,
    }))
}

pub fn create_from_payload<S: Store>(
    store: &mut S,
    payload: Node<'_>,
    account: &Account,
) -> SyncResult<Product> {
    let values = extract_values(payload, account)?;
    let item_id = payload.required_text(&["Item", "ItemID"])?;

    let product = store.insert_product(NewProduct {
        values,
        external_item_id: Some(item_id.to_string()),
        description: payload.text_at(&["Item", "Description"]).map(str::to_string),
        code: payload.text_at(&["Item", "SKU"]).map(str::to_string),
    })?;

    if store.products_by_item_id(item_id)?.len() > 1 {
        return Err(SyncError::duplicate(
            "duplicate_product",
            format!("A product already exists for eBay item {item_id}."),
        ));
    }

    info!(target = "ebay_sync.product", item = item_id, product = %product.id, "product_created");
    crate::metrics::reconcile_outcome("product", "created");
    Ok(product)
}

/// Pushes storage quantities of listed products to eBay, four items per call.
/// Returns the number of items updated.
pub async fn export_inventory<S: Store, A: TradingApi>(
    store: &S,
    api: &A,
    account: &Account,
    products: &[Product],
) -> SyncResult<usize> {
    let mut statuses = Vec::with_capacity(products.len());
    for product in products {
        let Some(item_id) = product.external_item_id.as_deref() else {
            warn!(
                target = "ebay_sync.product",
                product = %product.id,
                name = %product.name,
                "product_not_listed_skipping_inventory"
            );
            continue;
        };
        let quantity = store.storage_quantity(product.id)?.trunc();
        statuses.push(InventoryStatus {
            item_id: item_id.to_string(),
            quantity: quantity.to_string(),
        });
    }

    let mut exported = 0;
    for batch in statuses.chunks(INVENTORY_BATCH_SIZE) {
        let request = ReviseInventoryStatusRequest {
            inventory_status: batch.to_vec(),
        };
        let params = serde_json::to_value(&request)
            .map_err(|err| SyncError::invalid_payload("encode", err.to_string()))?;
        api.execute("ReviseInventoryStatus", params).await?;
        exported += batch.len();
    }

    info!(target = "ebay_sync.product", account = %account.id, exported, "inventory_exported");
    Ok(exported)
}

/// Lists every exportable product that has no eBay item yet. `limit` caps
/// how many listings are created in one run.
///
/// Each accepted listing is committed in its own session before the next
/// `AddItem`, so a later rejection never discards item ids eBay has issued.
pub async fn export_catalog<D: Database, A: TradingApi>(
    db: &D,
    api: &A,
    account: &Account,
    limit: Option<usize>,
) -> SyncResult<Vec<Product>> {
    let candidates = db.begin()?.products()?;
    let mut listed = Vec::new();
    for candidate in candidates {
        if limit.is_some_and(|max| listed.len() >= max) {
            break;
        }
        let mut session = db.begin()?;
        let Some(product) = session.product(candidate.id)? else {
            continue;
        };
        if product.external_item_id.is_some() || !product.exportable {
            continue;
        }
        let Some(listing) = product.listing.as_ref() else {
            continue;
        };

        let quantity = session.storage_quantity(product.id)?;
        let request = AddItemRequest::new(&product, listing, account, quantity);
        let params = serde_json::to_value(&request)
            .map_err(|err| SyncError::invalid_payload("encode", err.to_string()))?;
        let response = match api.execute("AddItem", params).await {
            Ok(response) => response,
            Err(TradingError::Rejected { messages, .. }) => {
                warn!(
                    target = "ebay_sync.product",
                    product = %product.id,
                    listed = listed.len(),
                    errors = ?messages,
                    "listing_rejected"
                );
                return Err(SyncError::remote_rejection(
                    "listing_rejected",
                    messages.join(", "),
                ));
            }
            Err(other) => return Err(other.into()),
        };

        let item_id = response.root().required_text(&["ItemID"])?.to_string();
        session.set_product_item_id(product.id, &item_id)?;
        db.commit(session)?;
        info!(target = "ebay_sync.product", product = %product.id, item = %item_id, "product_listed");

        let mut updated = product;
        updated.external_item_id = Some(item_id);
        listed.push(updated);
    }
    Ok(listed)
}
