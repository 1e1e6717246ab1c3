use crate::ebay::response::Node;
use crate::error::{SyncError, SyncResult};
use crate::models::{Address, ContactKind, Country, NewAddress, Party, Subdivision};
use crate::store::Store;
use tracing::debug;

/// eBay masks buyer phone numbers with this literal on some sites.
const MASKED_PHONE: &str = "Invalid Request";

pub fn resolve_country<S: Store>(store: &S, code: &str) -> SyncResult<Country> {
    let mut countries = store.countries_by_code(code)?;
    if countries.len() != 1 {
        return Err(SyncError::not_found(
            "country_not_found",
            format!("Country {code} does not exist."),
        ));
    }
    Ok(countries.remove(0))
}

/// Resolves a region given either as a code (`FL`) or a name (`Florida`).
pub fn resolve_subdivision<S: Store>(
    store: &S,
    region: &str,
    country: &Country,
) -> SyncResult<Subdivision> {
    let code = format!("{}-{}", country.code, region);
    if let Some(found) = store.subdivision_by_code(country.id, &code)? {
        return Ok(found);
    }

    let needle = region.trim().to_lowercase();
    if !needle.is_empty() {
        let candidates = store.subdivisions_of(country.id)?;
        let by_name = candidates
            .iter()
            .position(|s| s.name.to_lowercase() == needle)
            .or_else(|| {
                candidates
                    .iter()
                    .position(|s| s.name.to_lowercase().contains(&needle))
            });
        if let Some(index) = by_name {
            return Ok(candidates[index].clone());
        }
    }

    Err(SyncError::not_found(
        "state_not_found",
        format!("State {region} does not exist in country {}.", country.name),
    ))
}

struct AddressFields<'a> {
    name: &'a str,
    street: &'a str,
    street2: &'a str,
    postal_code: &'a str,
    city: &'a str,
    country: &'a str,
    region: &'a str,
}

impl<'a> AddressFields<'a> {
    fn read(payload: Node<'a>) -> SyncResult<Self> {
        let street = payload
            .text_at(&["Street1"])
            .or_else(|| payload.text_at(&["Street"]))
            .unwrap_or_default();
        Ok(Self {
            name: payload.text_at(&["Name"]).unwrap_or_default(),
            street,
            street2: payload.text_at(&["Street2"]).unwrap_or_default(),
            postal_code: payload.text_at(&["PostalCode"]).unwrap_or_default(),
            city: payload.text_at(&["CityName"]).unwrap_or_default(),
            country: payload.required_text(&["Country"])?,
            region: payload.text_at(&["StateOrProvince"]).unwrap_or_default(),
        })
    }
}

/// Whether a stored address is the one described by the payload.
pub fn matches<S: Store>(store: &S, address: &Address, payload: Node<'_>) -> SyncResult<bool> {
    let fields = AddressFields::read(payload)?;
    let stored_street2 = address.street2.as_deref().unwrap_or_default();

    if address.name != fields.name
        || address.street != fields.street
        || stored_street2 != fields.street2
        || address.postal_code != fields.postal_code
        || address.city != fields.city
    {
        return Ok(false);
    }

    let country = resolve_country(store, fields.country)?;
    if address.country_id != country.id {
        return Ok(false);
    }
    let subdivision = resolve_subdivision(store, fields.region, &country)?;
    Ok(address.subdivision_id == subdivision.id)
}

/// Returns the party's first address matching the payload, creating it (and
/// a phone contact) when none does. Existing addresses are never modified.
pub fn find_or_create_address<S: Store>(
    store: &mut S,
    party: &Party,
    payload: Node<'_>,
) -> SyncResult<Address> {
    for address in store.addresses_of(party.id)? {
        if matches(store, &address, payload)? {
            debug!(target = "ebay_sync.address", party = %party.id, address = %address.id, "address_matched");
            return Ok(address);
        }
    }

    let fields = AddressFields::read(payload)?;
    let country = resolve_country(store, fields.country)?;
    let subdivision = resolve_subdivision(store, fields.region, &country)?;
    let address = store.insert_address(NewAddress {
        party_id: party.id,
        name: fields.name.to_string(),
        street: fields.street.to_string(),
        street2: Some(fields.street2)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        postal_code: fields.postal_code.to_string(),
        city: fields.city.to_string(),
        country_id: country.id,
        subdivision_id: subdivision.id,
    })?;

    let phone = payload
        .text_at(&["Phone"])
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != MASKED_PHONE);
    if let Some(phone) = phone {
        let known = store.contact_mechanisms_of(party.id)?.into_iter().any(|m| {
            matches!(m.kind, ContactKind::Phone | ContactKind::Mobile) && m.value == phone
        });
        if !known {
            store.insert_contact_mechanism(party.id, ContactKind::Phone, phone)?;
        }
    }

    debug!(target = "ebay_sync.address", party = %party.id, address = %address.id, "address_created");
    crate::metrics::reconcile_outcome("address", "created");
    Ok(address)
}
