//! Order reconciliation: the orchestration point that pulls in the buyer,
//! their address, every purchased item and the seller account.

use crate::ebay::response::Node;
use crate::ebay::trading::TradingApi;
use crate::error::{SyncError, SyncResult};
use crate::models::{Account, NewOrder, Order, OrderLine, OrderState};
use crate::reconcile::{address, party, product};
use crate::store::Store;
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info};

pub const SHIPPING_LINE_DESCRIPTION: &str = "eBay Shipping and Handling";
const LINE_UNIT: &str = "Unit";

/// Local order for an eBay order id, fetched with `GetOrders` on a miss.
pub async fn find_or_create_order<S: Store, A: TradingApi>(
    store: &mut S,
    api: &A,
    account: &Account,
    external_order_id: &str,
) -> SyncResult<Order> {
    if let Some(existing) = find_existing(store, external_order_id)? {
        return Ok(existing);
    }

    let response = api
        .execute(
            "GetOrders",
            json!({
                "OrderIDArray": {"OrderID": external_order_id},
                "DetailLevel": "ReturnAll",
            }),
        )
        .await?;
    let Some(payload) = response.root().items_at(&["OrderArray", "Order"]).into_iter().next()
    else {
        return Err(SyncError::not_found(
            "order_not_found",
            format!("Order {external_order_id} was not returned by eBay."),
        ));
    };
    create_from_payload(store, api, account, payload).await
}

/// Same as [`find_or_create_order`] for a payload that was already fetched,
/// as the batch import does.
pub async fn find_or_create_from_payload<S: Store, A: TradingApi>(
    store: &mut S,
    api: &A,
    account: &Account,
    payload: Node<'_>,
) -> SyncResult<(Order, bool)> {
    let order_id = payload.required_text(&["OrderID"])?;
    if let Some(existing) = find_existing(store, order_id)? {
        return Ok((existing, false));
    }
    let created = create_from_payload(store, api, account, payload).await?;
    Ok((created, true))
}

fn find_existing<S: Store>(store: &S, external_order_id: &str) -> SyncResult<Option<Order>> {
    let existing = store.orders_by_order_id(external_order_id)?.into_iter().next();
    if existing.is_some() {
        crate::metrics::reconcile_outcome("order", "found");
    }
    Ok(existing)
}

/// `TransactionArray` arrives as a bare transaction or a list, and either the
/// array or each of its entries may be wrapped in a `Transaction` key.
pub fn transactions<'a>(order: Node<'a>) -> Vec<Node<'a>> {
    let Some(array) = order.child("TransactionArray") else {
        return Vec::new();
    };
    array
        .items()
        .into_iter()
        .flat_map(|entry| match entry.child("Transaction") {
            Some(wrapped) => wrapped.items(),
            None => vec![entry],
        })
        .collect()
}

fn order_date(raw: &str) -> SyncResult<NaiveDate> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.date_naive());
    }
    raw.get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        .ok_or_else(|| {
            SyncError::invalid_payload("invalid_date", format!("CreatedTime is not a date: {raw}"))
        })
}

pub async fn create_from_payload<S: Store, A: TradingApi>(
    store: &mut S,
    api: &A,
    account: &Account,
    payload: Node<'_>,
) -> SyncResult<Order> {
    let order_id = payload.required_text(&["OrderID"])?.to_string();
    let transactions = transactions(payload);
    let anchor_item = transactions
        .first()
        .and_then(|t| t.text_at(&["Item", "ItemID"]));

    let buyer_id = payload.required_text(&["BuyerUserID"])?;
    let buyer = party::find_or_create_party(store, api, buyer_id, anchor_item).await?;
    let shipping_address = payload.require(&["ShippingAddress"])?;
    let address = address::find_or_create_address(store, &buyer, shipping_address)?;

    let currency_code = payload.required_text(&["Total", "currencyID"])?;
    let currency = store
        .currencies_by_code(currency_code)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            SyncError::not_found(
                "currency_not_found",
                format!("Currency {currency_code} does not exist."),
            )
        })?;
    if store.uoms_by_name(LINE_UNIT)?.is_empty() {
        return Err(SyncError::not_found(
            "uom_not_found",
            format!("Unit of measure {LINE_UNIT} does not exist."),
        ));
    }

    let mut lines = Vec::with_capacity(transactions.len() + 1);
    for transaction in &transactions {
        let item_id = transaction.required_text(&["Item", "ItemID"])?;
        let item = product::find_or_create_product(store, api, account, item_id).await?;
        let description = transaction
            .text_at(&["Item", "Title"])
            .map(str::to_string)
            .unwrap_or_else(|| item.name.clone());
        lines.push(OrderLine {
            description,
            product_id: Some(item.id),
            unit_price: transaction.required_decimal(&["TransactionPrice"])?,
            quantity: transaction.required_decimal(&["QuantityPurchased"])?,
            unit: LINE_UNIT.to_string(),
            note: None,
        });
    }

    let selected = payload.path(&["ShippingServiceSelected"]);
    let shipping_cost = match selected {
        Some(service) => service
            .decimal_at(&["ShippingServiceCost"])?
            .unwrap_or(Decimal::ZERO),
        None => Decimal::ZERO,
    };
    lines.push(OrderLine {
        description: SHIPPING_LINE_DESCRIPTION.to_string(),
        product_id: None,
        unit_price: shipping_cost,
        quantity: Decimal::ONE,
        unit: LINE_UNIT.to_string(),
        note: selected
            .and_then(|s| s.text_at(&["ShippingService"]))
            .map(str::to_string),
    });

    let order = store.insert_order(NewOrder {
        reference: order_id.clone(),
        external_order_id: Some(order_id.clone()),
        order_date: order_date(payload.required_text(&["CreatedTime"])?)?,
        currency: currency.code,
        party_id: buyer.id,
        invoice_address_id: address.id,
        shipment_address_id: address.id,
        seller_account_id: account.id,
        lines,
    })?;

    let reported = payload.required_decimal(&["Total"])?;
    let computed = order.total();
    if computed != reported {
        error!(
            target = "ebay_sync.order",
            order = %order_id,
            %computed,
            %reported,
            "order_total_mismatch"
        );
        return Err(SyncError::integrity(
            "total_mismatch",
            format!("Order {order_id} totals {computed} locally but eBay reports {reported}."),
        ));
    }

    let mut state = order.state;
    for target in [OrderState::Quotation, OrderState::Confirmed] {
        state = state.advance(target)?;
        store.set_order_state(order.id, state)?;
    }

    let holders = store.orders_by_order_id(&order_id)?;
    if holders.iter().any(|other| other.id != order.id) {
        return Err(SyncError::duplicate(
            "duplicate_order",
            format!("An order already exists for eBay order {order_id}."),
        ));
    }

    info!(
        target = "ebay_sync.order",
        order = %order_id,
        local = %order.id,
        lines = order.lines.len(),
        total = %computed,
        "order_created"
    );
    crate::metrics::reconcile_outcome("order", "created");
    Ok(Order { state, ..order })
}
