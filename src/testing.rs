//! Shared fixtures for unit tests: a scripted Trading API, a seeded database
//! and payload builders shaped like real Trading responses.

use crate::ebay::response::Response;
use crate::ebay::trading::{TradingApi, TradingError};
use crate::models::{
    Account, FlatShipping, ListingAttributes, ListingDuration, Product, ProductValues,
    ReturnPolicy,
};
use crate::store::{Database, MemoryDatabase, Store};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

/// Turns plain JSON into the wrapped response shape: scalars become
/// `{"value": ..}`, keys literally named `value` are kept as they are.
pub fn wrap(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let value = if key == "value" {
                    value
                } else {
                    wrap(value)
                };
                out.insert(key, value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(wrap).collect()),
        Value::Null => Value::Null,
        Value::String(s) => json!({ "value": s }),
        other => json!({ "value": other.to_string() }),
    }
}

type Fixture = Result<Value, Vec<String>>;

/// Scripted [`TradingApi`]: responses are keyed by call name plus the
/// `UserID`, `ItemID`, `OrderID` or listing title in the request, `*`
/// matching anything.
#[derive(Debug, Clone, Default)]
pub struct FakeTradingApi {
    fixtures: Arc<HashMap<(String, String), Fixture>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeTradingApi {
    pub fn with(self, call: &str, key: &str, payload: Value) -> Self {
        self.insert(call, key, Ok(wrap(payload)))
    }

    pub fn with_error(self, call: &str, key: &str, messages: &[&str]) -> Self {
        let messages = messages.iter().map(|m| m.to_string()).collect();
        self.insert(call, key, Err(messages))
    }

    fn insert(self, call: &str, key: &str, fixture: Fixture) -> Self {
        let mut fixtures = (*self.fixtures).clone();
        fixtures.insert((call.to_string(), key.to_string()), fixture);
        Self {
            fixtures: Arc::new(fixtures),
            calls: self.calls,
        }
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls().iter().filter(|(name, _)| name == call).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }
}

fn request_key(params: &Value) -> String {
    ["/UserID", "/ItemID", "/OrderIDArray/OrderID", "/Item/Title"]
        .iter()
        .find_map(|pointer| params.pointer(pointer).and_then(Value::as_str))
        .unwrap_or("*")
        .to_string()
}

impl TradingApi for FakeTradingApi {
    async fn execute(&self, call: &str, params: Value) -> Result<Response, TradingError> {
        let key = request_key(&params);
        self.calls.lock().unwrap().push((call.to_string(), params));
        let fixture = self
            .fixtures
            .get(&(call.to_string(), key.clone()))
            .or_else(|| self.fixtures.get(&(call.to_string(), "*".to_string())));
        match fixture {
            Some(Ok(value)) => Ok(Response::new(value.clone())),
            Some(Err(messages)) => Err(TradingError::Rejected {
                call: call.to_string(),
                messages: messages.clone(),
            }),
            None => Err(TradingError::Rejected {
                call: call.to_string(),
                messages: vec![format!("no fixture for {call} {key}")],
            }),
        }
    }
}

pub fn account() -> Account {
    Account {
        id: Uuid::new_v4(),
        name: "Main store".into(),
        app_id: "app".into(),
        dev_id: "dev".into(),
        cert_id: "cert".into(),
        token: "token".into(),
        sandbox: true,
        site_id: 0,
        default_uom: "Unit".into(),
        default_account_expense: "5000".into(),
        default_account_revenue: "4000".into(),
        listing_country: "US".into(),
        currency: "USD".into(),
        postal_code: "33101".into(),
        paypal_email: "seller@example.com".into(),
        last_import_watermark: Utc.with_ymd_and_hms(2013, 5, 1, 0, 0, 0).unwrap(),
    }
}

/// Database holding US and IN with a few subdivisions, USD, `Unit` and the
/// given account.
pub fn seeded_db_with(account: &Account) -> MemoryDatabase {
    let db = MemoryDatabase::new();
    let mut session = db.begin().unwrap();
    let us = session.insert_country("US", "United States").unwrap();
    session.insert_subdivision(us.id, "US-FL", "Florida").unwrap();
    session
        .insert_subdivision(us.id, "US-WA", "Washington")
        .unwrap();
    let india = session.insert_country("IN", "India").unwrap();
    session
        .insert_subdivision(india.id, "IN-UP", "Uttar Pradesh")
        .unwrap();
    session.insert_currency("USD", "US Dollar").unwrap();
    session.insert_uom("Unit", "u").unwrap();
    session.insert_account(account.clone()).unwrap();
    db.commit(session).unwrap();
    db
}

pub fn seeded_db() -> (MemoryDatabase, Account) {
    let account = account();
    (seeded_db_with(&account), account)
}

pub fn listing_attributes() -> ListingAttributes {
    ListingAttributes {
        dispatch_time_max: 3,
        listing_duration: ListingDuration::Days30,
        return_policy: ReturnPolicy {
            returns_accepted_option: "ReturnsAccepted".into(),
            refund_option: None,
            returns_within_option: Some("Days_14".into()),
            description: "No Description".into(),
            shipping_cost_paid_by_option: None,
        },
        shipping: Some(FlatShipping {
            service: "USPSPriority".into(),
            cost: dec("4.00"),
        }),
        category_id: "20625".into(),
        picture_urls: Vec::new(),
    }
}

pub fn listed_product_values(name: &str) -> ProductValues {
    ProductValues {
        name: name.into(),
        list_price: dec("12.50"),
        cost_price: dec("12.50"),
        default_uom: "Unit".into(),
        sale_uom: "Unit".into(),
        account_expense: "5000".into(),
        account_revenue: "4000".into(),
        salable: true,
        exportable: true,
        listing: Some(listing_attributes()),
    }
}

pub fn listed_product(name: &str, item_id: Option<&str>) -> Product {
    let values = listed_product_values(name);
    Product {
        id: Uuid::new_v4(),
        external_item_id: item_id.map(str::to_string),
        name: values.name,
        description: None,
        code: None,
        list_price: values.list_price,
        cost_price: values.cost_price,
        default_uom: values.default_uom,
        sale_uom: values.sale_uom,
        account_expense: values.account_expense,
        account_revenue: values.account_revenue,
        salable: values.salable,
        exportable: values.exportable,
        listing: values.listing,
    }
}

pub fn user_payload(user_id: &str, email: Option<&str>) -> Value {
    let mut user = json!({ "UserID": user_id });
    if let Some(email) = email {
        user["Email"] = json!(email);
    }
    json!({ "Ack": "Success", "User": user })
}

pub fn item_payload(item_id: &str, title: &str, price: &str) -> Value {
    json!({
        "Ack": "Success",
        "Item": {
            "ItemID": item_id,
            "Title": title,
            "Description": format!("{title} description"),
            "SKU": format!("SKU-{item_id}"),
            "StartPrice": {"value": price, "currencyID": "USD"},
            "BuyItNowPrice": {"value": "0.0", "currencyID": "USD"},
            "DispatchTimeMax": "3",
            "ListingDuration": "Days_30",
            "PrimaryCategory": {"CategoryID": "20625", "CategoryName": "Kitchen"},
            "ReturnPolicy": {
                "ReturnsAcceptedOption": "ReturnsAccepted",
                "RefundOption": "MoneyBack",
                "ReturnsWithinOption": "Days_14",
                "ShippingCostPaidByOption": "Buyer",
            },
            "ShippingDetails": {
                "ShippingType": "Flat",
                "ShippingServiceOptions": {
                    "ShippingService": "USPSPriority",
                    "ShippingServiceCost": {"value": "3.0", "currencyID": "USD"},
                },
            },
            "PictureDetails": {"PictureURL": "https://i.ebayimg.com/1.jpg"},
        },
    })
}

pub fn address_payload() -> Value {
    json!({
        "Name": "Sharoon Thomas",
        "Street1": "100 Biscayne Blvd",
        "Street2": "",
        "CityName": "Miami",
        "StateOrProvince": "FL",
        "Country": "US",
        "CountryName": "United States",
        "Phone": "305-555-0100",
        "PostalCode": "33132",
    })
}

/// A transaction entry as it appears inside `TransactionArray.Transaction`.
pub fn transaction(item_id: &str, title: &str, price: &str, quantity: &str) -> Value {
    json!({
        "Item": {"ItemID": item_id, "Title": title},
        "TransactionPrice": {"value": price, "currencyID": "USD"},
        "QuantityPurchased": quantity,
    })
}

pub fn order(order_id: &str, transactions: Value, shipping_cost: &str, total: &str) -> Value {
    json!({
        "OrderID": order_id,
        "OrderStatus": "Completed",
        "BuyerUserID": "buyer-1",
        "CreatedTime": "2013-05-21T08:15:30.000Z",
        "ShippingAddress": address_payload(),
        "ShippingServiceSelected": {
            "ShippingService": "USPSPriority",
            "ShippingServiceCost": {"value": shipping_cost, "currencyID": "USD"},
        },
        "Total": {"value": total, "currencyID": "USD"},
        "TransactionArray": {"Transaction": transactions},
    })
}

pub fn orders_response(orders: Vec<Value>) -> Value {
    if orders.is_empty() {
        return json!({ "Ack": "Success", "OrderArray": null });
    }
    json!({ "Ack": "Success", "OrderArray": {"Order": orders} })
}

/// Fake pre-loaded with the buyer and the items used by [`order`] fixtures.
pub fn marketplace() -> FakeTradingApi {
    FakeTradingApi::default()
        .with("GetUser", "buyer-1", user_payload("buyer-1", Some("buyer@example.com")))
        .with("GetItem", "110", item_payload("110", "Blue Mug", "10.00"))
        .with("GetItem", "111", item_payload("111", "Red Mug", "5.00"))
        .with("GetItem", "112", item_payload("112", "Green Mug", "2.00"))
}
