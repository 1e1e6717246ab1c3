use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// An eBay seller account and the defaults used for records it produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub app_id: String,
    pub dev_id: String,
    pub cert_id: String,
    pub token: String,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default)]
    pub site_id: u32,
    pub default_uom: String,
    pub default_account_expense: String,
    pub default_account_revenue: String,
    pub listing_country: String,
    pub currency: String,
    pub postal_code: String,
    pub paypal_email: String,
    pub last_import_watermark: DateTime<Utc>,
}

impl Account {
    pub fn credentials(&self) -> (&str, &str, &str, &str) {
        (&self.app_id, &self.dev_id, &self.cert_id, &self.token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Country {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subdivision {
    pub id: Uuid,
    pub country_id: Uuid,
    /// Canonical form `"{country_code}-{region_code}"`.
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Currency {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Uom {
    pub id: Uuid,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Party {
    pub id: Uuid,
    pub name: String,
    pub external_user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewParty {
    pub name: String,
    pub external_user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: Uuid,
    pub party_id: Uuid,
    pub name: String,
    pub street: String,
    pub street2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country_id: Uuid,
    pub subdivision_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewAddress {
    pub party_id: Uuid,
    pub name: String,
    pub street: String,
    pub street2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country_id: Uuid,
    pub subdivision_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Email,
    Phone,
    Mobile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactMechanism {
    pub id: Uuid,
    pub party_id: Uuid,
    pub kind: ContactKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ListingDuration {
    #[serde(rename = "Days_1")]
    Days1,
    #[serde(rename = "Days_3")]
    Days3,
    #[serde(rename = "Days_5")]
    Days5,
    #[serde(rename = "Days_7")]
    Days7,
    #[serde(rename = "Days_10")]
    Days10,
    #[serde(rename = "Days_14")]
    Days14,
    #[serde(rename = "Days_21")]
    Days21,
    #[serde(rename = "Days_30")]
    Days30,
    #[serde(rename = "Days_60")]
    Days60,
    #[serde(rename = "Days_90")]
    Days90,
    #[serde(rename = "Days_120")]
    Days120,
    #[serde(rename = "GTC")]
    GoodTillCancelled,
}

impl ListingDuration {
    pub fn from_raw(value: &str) -> Option<Self> {
        match value.trim() {
            "Days_1" => Some(Self::Days1),
            "Days_3" => Some(Self::Days3),
            "Days_5" => Some(Self::Days5),
            "Days_7" => Some(Self::Days7),
            "Days_10" => Some(Self::Days10),
            "Days_14" => Some(Self::Days14),
            "Days_21" => Some(Self::Days21),
            "Days_30" => Some(Self::Days30),
            "Days_60" => Some(Self::Days60),
            "Days_90" => Some(Self::Days90),
            "Days_120" => Some(Self::Days120),
            "GTC" => Some(Self::GoodTillCancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days1 => "Days_1",
            Self::Days3 => "Days_3",
            Self::Days5 => "Days_5",
            Self::Days7 => "Days_7",
            Self::Days10 => "Days_10",
            Self::Days14 => "Days_14",
            Self::Days21 => "Days_21",
            Self::Days30 => "Days_30",
            Self::Days60 => "Days_60",
            Self::Days90 => "Days_90",
            Self::Days120 => "Days_120",
            Self::GoodTillCancelled => "GTC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReturnPolicy {
    pub returns_accepted_option: String,
    pub refund_option: Option<String>,
    pub returns_within_option: Option<String>,
    pub description: String,
    pub shipping_cost_paid_by_option: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlatShipping {
    pub service: String,
    pub cost: Decimal,
}

/// Marketplace listing attributes, only present on export-eligible products.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingAttributes {
    pub dispatch_time_max: u32,
    pub listing_duration: ListingDuration,
    pub return_policy: ReturnPolicy,
    /// Populated only for `Flat` shipping.
    pub shipping: Option<FlatShipping>,
    pub category_id: String,
    #[serde(default)]
    pub picture_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub external_item_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub code: Option<String>,
    pub list_price: Decimal,
    pub cost_price: Decimal,
    pub default_uom: String,
    pub sale_uom: String,
    pub account_expense: String,
    pub account_revenue: String,
    pub salable: bool,
    pub exportable: bool,
    pub listing: Option<ListingAttributes>,
}

/// Flat value set extracted from a `GetItem` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductValues {
    pub name: String,
    pub list_price: Decimal,
    pub cost_price: Decimal,
    pub default_uom: String,
    pub sale_uom: String,
    pub account_expense: String,
    pub account_revenue: String,
    pub salable: bool,
    pub exportable: bool,
    pub listing: Option<ListingAttributes>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub values: ProductValues,
    pub external_item_id: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Storage,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub location: LocationKind,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Draft,
    Quotation,
    Confirmed,
}

impl OrderState {
    /// Next state in `draft -> quotation -> confirmed`.
    pub fn advance(self, target: OrderState) -> SyncResult<OrderState> {
        match (self, target) {
            (Self::Draft, Self::Quotation) | (Self::Quotation, Self::Confirmed) => Ok(target),
            (from, to) => Err(SyncError::invalid_transition(
                "invalid_transition",
                format!("order cannot move from {from:?} to {to:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    pub description: String,
    pub product_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub unit: String,
    pub note: Option<String>,
}

impl OrderLine {
    pub fn amount(&self) -> Decimal {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: Uuid,
    pub reference: String,
    pub external_order_id: Option<String>,
    pub order_date: NaiveDate,
    pub currency: String,
    pub party_id: Uuid,
    pub invoice_address_id: Uuid,
    pub shipment_address_id: Uuid,
    pub seller_account_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub state: OrderState,
}

impl Order {
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(OrderLine::amount).sum()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub reference: String,
    pub external_order_id: Option<String>,
    pub order_date: NaiveDate,
    pub currency: String,
    pub party_id: Uuid,
    pub invoice_address_id: Uuid,
    pub shipment_address_id: Uuid,
    pub seller_account_id: Uuid,
    pub lines: Vec<OrderLine>,
}
