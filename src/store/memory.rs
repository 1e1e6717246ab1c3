use super::{Database, Store, StoreError};
use crate::models::{
    Account, Address, ContactKind, ContactMechanism, Country, Currency, LocationKind, NewAddress,
    NewOrder, NewParty, NewProduct, Order, OrderState, Party, Product, StockLevel, Subdivision,
    Uom,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    countries: Vec<Country>,
    #[serde(default)]
    subdivisions: Vec<Subdivision>,
    #[serde(default)]
    currencies: Vec<Currency>,
    #[serde(default)]
    uoms: Vec<Uom>,
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    parties: Vec<Party>,
    #[serde(default)]
    addresses: Vec<Address>,
    #[serde(default)]
    contact_mechanisms: Vec<ContactMechanism>,
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    stock: Vec<StockLevel>,
    #[serde(default)]
    orders: Vec<Order>,
}

#[derive(Debug, Default)]
struct Snapshot {
    version: u64,
    tables: Tables,
}

/// Process-local database. Sessions work on a copy of the tables and
/// replace them on commit, so a dropped session leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Snapshot>>,
}

#[derive(Debug)]
pub struct MemorySession {
    base_version: u64,
    tables: Tables,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON state file, starting empty when the file does not exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(target = "ebay_sync.store", path = %path.display(), "state_file_missing");
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path).map_err(|err| StoreError::Io(err.to_string()))?;
        let tables: Tables =
            serde_json::from_str(&raw).map_err(|err| StoreError::Serde(err.to_string()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Snapshot { version: 0, tables })),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let json = serde_json::to_string_pretty(&guard.tables)
            .map_err(|err| StoreError::Serde(err.to_string()))?;
        drop(guard);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
        }
        std::fs::write(path, json).map_err(|err| StoreError::Io(err.to_string()))
    }
}

impl Database for MemoryDatabase {
    type Session = MemorySession;

    fn begin(&self) -> Result<MemorySession, StoreError> {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(MemorySession {
            base_version: guard.version,
            tables: guard.tables.clone(),
        })
    }

    fn commit(&self, session: MemorySession) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        if guard.version != session.base_version {
            return Err(StoreError::Conflict);
        }
        guard.tables = session.tables;
        guard.version += 1;
        Ok(())
    }
}

fn eq_opt(value: &Option<String>, expected: &str) -> bool {
    value.as_deref() == Some(expected)
}

impl Store for MemorySession {
    fn countries_by_code(&self, code: &str) -> Result<Vec<Country>, StoreError> {
        Ok(self
            .tables
            .countries
            .iter()
            .filter(|c| c.code == code)
            .cloned()
            .collect())
    }

    fn insert_country(&mut self, code: &str, name: &str) -> Result<Country, StoreError> {
        let country = Country {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
        };
        self.tables.countries.push(country.clone());
        Ok(country)
    }

    fn subdivision_by_code(
        &self,
        country_id: Uuid,
        code: &str,
    ) -> Result<Option<Subdivision>, StoreError> {
        Ok(self
            .tables
            .subdivisions
            .iter()
            .find(|s| s.country_id == country_id && s.code == code)
            .cloned())
    }

    fn subdivisions_of(&self, country_id: Uuid) -> Result<Vec<Subdivision>, StoreError> {
        Ok(self
            .tables
            .subdivisions
            .iter()
            .filter(|s| s.country_id == country_id)
            .cloned()
            .collect())
    }

    fn insert_subdivision(
        &mut self,
        country_id: Uuid,
        code: &str,
        name: &str,
    ) -> Result<Subdivision, StoreError> {
        let subdivision = Subdivision {
            id: Uuid::new_v4(),
            country_id,
            code: code.to_string(),
            name: name.to_string(),
        };
        self.tables.subdivisions.push(subdivision.clone());
        Ok(subdivision)
    }

    fn currencies_by_code(&self, code: &str) -> Result<Vec<Currency>, StoreError> {
        Ok(self
            .tables
            .currencies
            .iter()
            .filter(|c| c.code == code)
            .cloned()
            .collect())
    }

    fn insert_currency(&mut self, code: &str, name: &str) -> Result<Currency, StoreError> {
        let currency = Currency {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
        };
        self.tables.currencies.push(currency.clone());
        Ok(currency)
    }

    fn uoms_by_name(&self, name: &str) -> Result<Vec<Uom>, StoreError> {
        Ok(self
            .tables
            .uoms
            .iter()
            .filter(|u| u.name == name)
            .cloned()
            .collect())
    }

    fn insert_uom(&mut self, name: &str, symbol: &str) -> Result<Uom, StoreError> {
        let uom = Uom {
            id: Uuid::new_v4(),
            name: name.to_string(),
            symbol: symbol.to_string(),
        };
        self.tables.uoms.push(uom.clone());
        Ok(uom)
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.tables.accounts.clone())
    }

    fn account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.tables.accounts.iter().find(|a| a.id == id).cloned())
    }

    fn accounts_by_credentials(
        &self,
        app_id: &str,
        dev_id: &str,
        cert_id: &str,
        token: &str,
    ) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .tables
            .accounts
            .iter()
            .filter(|a| a.credentials() == (app_id, dev_id, cert_id, token))
            .cloned()
            .collect())
    }

    fn insert_account(&mut self, account: Account) -> Result<Account, StoreError> {
        self.tables.accounts.push(account.clone());
        Ok(account)
    }

    fn set_import_watermark(&mut self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let account = self
            .tables
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::Missing(id))?;
        account.last_import_watermark = at;
        Ok(())
    }

    fn parties_by_user_id(&self, external_user_id: &str) -> Result<Vec<Party>, StoreError> {
        Ok(self
            .tables
            .parties
            .iter()
            .filter(|p| eq_opt(&p.external_user_id, external_user_id))
            .cloned()
            .collect())
    }

    fn insert_party(&mut self, party: NewParty) -> Result<Party, StoreError> {
        let party = Party {
            id: Uuid::new_v4(),
            name: party.name,
            external_user_id: party.external_user_id,
        };
        self.tables.parties.push(party.clone());
        Ok(party)
    }

    fn addresses_of(&self, party_id: Uuid) -> Result<Vec<Address>, StoreError> {
        Ok(self
            .tables
            .addresses
            .iter()
            .filter(|a| a.party_id == party_id)
            .cloned()
            .collect())
    }

    fn insert_address(&mut self, address: NewAddress) -> Result<Address, StoreError> {
        if !self.tables.parties.iter().any(|p| p.id == address.party_id) {
            return Err(StoreError::Missing(address.party_id));
        }
        let address = Address {
            id: Uuid::new_v4(),
            party_id: address.party_id,
            name: address.name,
            street: address.street,
            street2: address.street2,
            postal_code: address.postal_code,
            city: address.city,
            country_id: address.country_id,
            subdivision_id: address.subdivision_id,
        };
        self.tables.addresses.push(address.clone());
        Ok(address)
    }

    fn contact_mechanisms_of(
        &self,
        party_id: Uuid,
    ) -> Result<Vec<ContactMechanism>, StoreError> {
        Ok(self
            .tables
            .contact_mechanisms
            .iter()
            .filter(|c| c.party_id == party_id)
            .cloned()
            .collect())
    }

    fn insert_contact_mechanism(
        &mut self,
        party_id: Uuid,
        kind: ContactKind,
        value: &str,
    ) -> Result<ContactMechanism, StoreError> {
        let mechanism = ContactMechanism {
            id: Uuid::new_v4(),
            party_id,
            kind,
            value: value.to_string(),
        };
        self.tables.contact_mechanisms.push(mechanism.clone());
        Ok(mechanism)
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.tables.products.clone())
    }

    fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.products.iter().find(|p| p.id == id).cloned())
    }

    fn products_by_item_id(&self, external_item_id: &str) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .tables
            .products
            .iter()
            .filter(|p| eq_opt(&p.external_item_id, external_item_id))
            .cloned()
            .collect())
    }

    fn insert_product(&mut self, product: NewProduct) -> Result<Product, StoreError> {
        let values = product.values;
        let product = Product {
            id: Uuid::new_v4(),
            external_item_id: product.external_item_id,
            name: values.name,
            description: product.description,
            code: product.code,
            list_price: values.list_price,
            cost_price: values.cost_price,
            default_uom: values.default_uom,
            sale_uom: values.sale_uom,
            account_expense: values.account_expense,
            account_revenue: values.account_revenue,
            salable: values.salable,
            exportable: values.exportable,
            listing: values.listing,
        };
        self.tables.products.push(product.clone());
        Ok(product)
    }

    fn set_product_item_id(
        &mut self,
        id: Uuid,
        external_item_id: &str,
    ) -> Result<(), StoreError> {
        let product = self
            .tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::Missing(id))?;
        product.external_item_id = Some(external_item_id.to_string());
        Ok(())
    }

    fn insert_stock_level(&mut self, level: StockLevel) -> Result<(), StoreError> {
        self.tables.stock.push(level);
        Ok(())
    }

    fn storage_quantity(&self, product_id: Uuid) -> Result<Decimal, StoreError> {
        Ok(self
            .tables
            .stock
            .iter()
            .filter(|s| s.product_id == product_id && s.location == LocationKind::Storage)
            .map(|s| s.quantity)
            .sum())
    }

    fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.orders.iter().find(|o| o.id == id).cloned())
    }

    fn orders_by_order_id(&self, external_order_id: &str) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .tables
            .orders
            .iter()
            .filter(|o| eq_opt(&o.external_order_id, external_order_id))
            .cloned()
            .collect())
    }

    fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        let order = Order {
            id: Uuid::new_v4(),
            reference: order.reference,
            external_order_id: order.external_order_id,
            order_date: order.order_date,
            currency: order.currency,
            party_id: order.party_id,
            invoice_address_id: order.invoice_address_id,
            shipment_address_id: order.shipment_address_id,
            seller_account_id: order.seller_account_id,
            lines: order.lines,
            state: OrderState::Draft,
        };
        self.tables.orders.push(order.clone());
        Ok(order)
    }

    fn set_order_state(&mut self, id: Uuid, state: OrderState) -> Result<(), StoreError> {
        let order = self
            .tables
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::Missing(id))?;
        order.state = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewParty;

    fn new_party(user_id: &str) -> NewParty {
        NewParty {
            name: user_id.to_string(),
            external_user_id: Some(user_id.to_string()),
        }
    }

    #[test]
    fn committed_session_is_visible_to_next_session() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().unwrap();
        session.insert_party(new_party("buyer_1")).unwrap();
        db.commit(session).unwrap();

        let session = db.begin().unwrap();
        assert_eq!(session.parties_by_user_id("buyer_1").unwrap().len(), 1);
    }

    #[test]
    fn dropped_session_discards_writes() {
        let db = MemoryDatabase::new();
        {
            let mut session = db.begin().unwrap();
            session.insert_party(new_party("buyer_1")).unwrap();
        }
        let session = db.begin().unwrap();
        assert!(session.parties_by_user_id("buyer_1").unwrap().is_empty());
    }

    #[test]
    fn stale_session_commit_is_rejected() {
        let db = MemoryDatabase::new();
        let mut first = db.begin().unwrap();
        let mut second = db.begin().unwrap();
        first.insert_party(new_party("buyer_1")).unwrap();
        second.insert_party(new_party("buyer_1")).unwrap();
        db.commit(first).unwrap();

        let err = db.commit(second).expect_err("stale");
        assert!(matches!(err, StoreError::Conflict));
        let session = db.begin().unwrap();
        assert_eq!(session.parties_by_user_id("buyer_1").unwrap().len(), 1);
    }

    #[test]
    fn address_requires_existing_party() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().unwrap();
        let orphan = NewAddress {
            party_id: Uuid::new_v4(),
            name: "n".into(),
            street: "s".into(),
            street2: None,
            postal_code: "p".into(),
            city: "c".into(),
            country_id: Uuid::new_v4(),
            subdivision_id: Uuid::new_v4(),
        };
        assert!(matches!(
            session.insert_address(orphan),
            Err(StoreError::Missing(_))
        ));
    }

    #[test]
    fn storage_quantity_ignores_other_locations() {
        let db = MemoryDatabase::new();
        let mut session = db.begin().unwrap();
        let product_id = Uuid::new_v4();
        for (location, quantity) in [
            (LocationKind::Storage, "4.5"),
            (LocationKind::Storage, "2"),
            (LocationKind::Other, "10"),
        ] {
            session
                .insert_stock_level(StockLevel {
                    product_id,
                    location,
                    quantity: quantity.parse().unwrap(),
                })
                .unwrap();
        }
        assert_eq!(
            session.storage_quantity(product_id).unwrap(),
            "6.5".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn state_file_round_trip() {
        let path = std::env::temp_dir().join(format!("ebay-sync-{}.json", Uuid::new_v4()));
        let db = MemoryDatabase::new();
        let mut session = db.begin().unwrap();
        let us = session.insert_country("US", "United States").unwrap();
        session.insert_subdivision(us.id, "US-FL", "Florida").unwrap();
        db.commit(session).unwrap();
        db.save(&path).unwrap();

        let reopened = MemoryDatabase::open(&path).unwrap();
        let session = reopened.begin().unwrap();
        let countries = session.countries_by_code("US").unwrap();
        assert_eq!(countries, vec![us.clone()]);
        assert_eq!(session.subdivisions_of(us.id).unwrap().len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_state_file_opens_empty() {
        let path = std::env::temp_dir().join(format!("ebay-sync-{}.json", Uuid::new_v4()));
        let db = MemoryDatabase::open(&path).unwrap();
        assert!(db.begin().unwrap().accounts().unwrap().is_empty());
    }
}
