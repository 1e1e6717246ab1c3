//! Request bodies for the listing calls (`AddItem`, `ReviseInventoryStatus`).

use crate::models::{Account, ListingAttributes, Product};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddItemRequest {
    pub item: ItemPayload,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemPayload {
    pub title: String,
    pub description: String,
    pub primary_category: PrimaryCategory,
    pub start_price: String,
    pub category_mapping_allowed: &'static str,
    pub country: String,
    #[serde(rename = "ConditionID")]
    pub condition_id: &'static str,
    pub currency: String,
    pub dispatch_time_max: u32,
    pub listing_duration: &'static str,
    pub listing_type: &'static str,
    pub payment_methods: &'static str,
    pub pay_pal_email_address: String,
    pub picture_details: Option<PictureDetails>,
    pub postal_code: String,
    pub quantity: String,
    pub listing_details: ListingDetails,
    pub return_policy: ReturnPolicyPayload,
    pub shipping_details: Option<ShippingDetails>,
    #[serde(rename = "SKU")]
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrimaryCategory {
    #[serde(rename = "CategoryID")]
    pub category_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PictureDetails {
    #[serde(rename = "PictureURL")]
    pub picture_url: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListingDetails {
    pub buy_it_now_available: bool,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReturnPolicyPayload {
    pub returns_accepted_option: String,
    pub refund_option: Option<String>,
    pub returns_within_option: Option<String>,
    pub description: String,
    pub shipping_cost_paid_by_option: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShippingDetails {
    pub shipping_type: &'static str,
    pub shipping_service_options: ShippingServiceOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShippingServiceOptions {
    pub shipping_service_priority: &'static str,
    pub shipping_service: String,
    pub shipping_service_cost: String,
}

impl AddItemRequest {
    /// Fixed-price listing for one product, quantity taken from storage stock.
    pub fn new(
        product: &Product,
        listing: &ListingAttributes,
        account: &Account,
        quantity: Decimal,
    ) -> Self {
        let policy = &listing.return_policy;
        let picture_details = (!listing.picture_urls.is_empty()).then(|| PictureDetails {
            picture_url: listing.picture_urls.clone(),
        });
        let shipping_details = listing.shipping.as_ref().map(|flat| ShippingDetails {
            shipping_type: "Flat",
            shipping_service_options: ShippingServiceOptions {
                shipping_service_priority: "1",
                shipping_service: flat.service.clone(),
                shipping_service_cost: flat.cost.normalize().to_string(),
            },
        });

        Self {
            item: ItemPayload {
                title: product.name.clone(),
                description: product
                    .description
                    .clone()
                    .unwrap_or_else(|| product.name.clone()),
                primary_category: PrimaryCategory {
                    category_id: listing.category_id.clone(),
                },
                start_price: product.list_price.normalize().to_string(),
                category_mapping_allowed: "true",
                country: account.listing_country.clone(),
                condition_id: "1000",
                currency: account.currency.clone(),
                dispatch_time_max: listing.dispatch_time_max,
                listing_duration: listing.listing_duration.as_str(),
                listing_type: "FixedPriceItem",
                payment_methods: "PayPal",
                pay_pal_email_address: account.paypal_email.clone(),
                picture_details,
                postal_code: account.postal_code.clone(),
                quantity: quantity.trunc().to_string(),
                listing_details: ListingDetails {
                    buy_it_now_available: true,
                },
                return_policy: ReturnPolicyPayload {
                    returns_accepted_option: policy.returns_accepted_option.clone(),
                    refund_option: policy.refund_option.clone(),
                    returns_within_option: policy.returns_within_option.clone(),
                    description: policy.description.clone(),
                    shipping_cost_paid_by_option: policy.shipping_cost_paid_by_option.clone(),
                },
                shipping_details,
                sku: product.code.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReviseInventoryStatusRequest {
    pub inventory_status: Vec<InventoryStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryStatus {
    #[serde(rename = "ItemID")]
    pub item_id: String,
    #[serde(rename = "Quantity")]
    pub quantity: String,
}
