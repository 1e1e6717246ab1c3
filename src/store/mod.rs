//! Local storage seen by the reconcilers.
//!
//! A [`Database`] hands out sessions; every write made through a session is
//! either committed as a whole or discarded when the session is dropped.

pub mod memory;

use crate::models::{
    Account, Address, ContactKind, ContactMechanism, Country, Currency, NewAddress, NewOrder,
    NewParty, NewProduct, Order, OrderState, Party, Product, StockLevel, Subdivision, Uom,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryDatabase;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} does not exist")]
    Missing(Uuid),
    #[error("concurrent commit detected, session is stale")]
    Conflict,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("state file io failed: {0}")]
    Io(String),
    #[error("state file is not valid: {0}")]
    Serde(String),
}

pub trait Database {
    type Session: Store;

    fn begin(&self) -> Result<Self::Session, StoreError>;

    fn commit(&self, session: Self::Session) -> Result<(), StoreError>;
}

/// Typed search/create/write operations scoped to one session.
pub trait Store {
    fn countries_by_code(&self, code: &str) -> Result<Vec<Country>, StoreError>;
    fn insert_country(&mut self, code: &str, name: &str) -> Result<Country, StoreError>;

    fn subdivision_by_code(
        &self,
        country_id: Uuid,
        code: &str,
    ) -> Result<Option<Subdivision>, StoreError>;
    /// Subdivisions of a country in insertion order.
    fn subdivisions_of(&self, country_id: Uuid) -> Result<Vec<Subdivision>, StoreError>;
    fn insert_subdivision(
        &mut self,
        country_id: Uuid,
        code: &str,
        name: &str,
    ) -> Result<Subdivision, StoreError>;

    fn currencies_by_code(&self, code: &str) -> Result<Vec<Currency>, StoreError>;
    fn insert_currency(&mut self, code: &str, name: &str) -> Result<Currency, StoreError>;

    fn uoms_by_name(&self, name: &str) -> Result<Vec<Uom>, StoreError>;
    fn insert_uom(&mut self, name: &str, symbol: &str) -> Result<Uom, StoreError>;

    fn accounts(&self) -> Result<Vec<Account>, StoreError>;
    fn account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;
    fn accounts_by_credentials(
        &self,
        app_id: &str,
        dev_id: &str,
        cert_id: &str,
        token: &str,
    ) -> Result<Vec<Account>, StoreError>;
    fn insert_account(&mut self, account: Account) -> Result<Account, StoreError>;
    fn set_import_watermark(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    fn parties_by_user_id(&self, external_user_id: &str) -> Result<Vec<Party>, StoreError>;
    fn insert_party(&mut self, party: NewParty) -> Result<Party, StoreError>;

    /// Addresses of a party in creation order.
    fn addresses_of(&self, party_id: Uuid) -> Result<Vec<Address>, StoreError>;
    fn insert_address(&mut self, address: NewAddress) -> Result<Address, StoreError>;

    fn contact_mechanisms_of(&self, party_id: Uuid)
    -> Result<Vec<ContactMechanism>, StoreError>;
    fn insert_contact_mechanism(
        &mut self,
        party_id: Uuid,
        kind: ContactKind,
        value: &str,
    ) -> Result<ContactMechanism, StoreError>;

    /// Every product in creation order.
    fn products(&self) -> Result<Vec<Product>, StoreError>;
    fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    fn products_by_item_id(&self, external_item_id: &str) -> Result<Vec<Product>, StoreError>;
    fn insert_product(&mut self, product: NewProduct) -> Result<Product, StoreError>;
    /// Stores the marketplace item id on an existing product.
    fn set_product_item_id(&mut self, id: Uuid, external_item_id: &str)
    -> Result<(), StoreError>;

    fn insert_stock_level(&mut self, level: StockLevel) -> Result<(), StoreError>;
    /// Quantity on hand in storage-type locations.
    fn storage_quantity(&self, product_id: Uuid) -> Result<Decimal, StoreError>;

    fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    fn orders_by_order_id(&self, external_order_id: &str) -> Result<Vec<Order>, StoreError>;
    fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError>;
    fn set_order_state(&mut self, id: Uuid, state: OrderState) -> Result<(), StoreError>;
}
