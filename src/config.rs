//! YAML configuration: reference data the reconcilers resolve against and
//! the seller accounts to sync.

use crate::error::{SyncError, SyncResult};
use crate::models::Account;
use crate::store::{Database, Store};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("invalid config {path}: {reason}")]
    Yaml { path: String, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub reference: ReferenceData,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub countries: Vec<CountryConfig>,
    #[serde(default)]
    pub currencies: Vec<CurrencyConfig>,
    #[serde(default)]
    pub uoms: Vec<UomConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryConfig {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub subdivisions: Vec<SubdivisionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubdivisionConfig {
    /// Region code, with or without the `{country}-` prefix.
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UomConfig {
    pub name: String,
    pub symbol: String,
}

fn default_uom() -> String {
    "Unit".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub app_id: String,
    pub dev_id: String,
    pub cert_id: String,
    pub token: String,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default)]
    pub site_id: u32,
    #[serde(default = "default_uom")]
    pub default_uom: String,
    pub default_account_expense: String,
    pub default_account_revenue: String,
    pub listing_country: String,
    pub currency: String,
    pub postal_code: String,
    pub paypal_email: String,
    /// First import starts here; defaults to the bootstrap time.
    pub import_from: Option<DateTime<Utc>>,
}

impl AccountConfig {
    fn into_account(self, now: DateTime<Utc>) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: self.name,
            app_id: self.app_id,
            dev_id: self.dev_id,
            cert_id: self.cert_id,
            token: self.token,
            sandbox: self.sandbox,
            site_id: self.site_id,
            default_uom: self.default_uom,
            default_account_expense: self.default_account_expense,
            default_account_revenue: self.default_account_revenue,
            listing_country: self.listing_country,
            currency: self.currency,
            postal_code: self.postal_code,
            paypal_email: self.paypal_email,
            last_import_watermark: self.import_from.unwrap_or(now),
        }
    }
}

impl SyncConfig {
    pub fn from_yaml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|err| ConfigError::Yaml {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }

    /// Reads the config file; a missing file means nothing to bootstrap.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(target = "ebay_sync.config", path = %path.display(), "config_file_missing");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_yaml(&raw, path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub countries: usize,
    pub subdivisions: usize,
    pub currencies: usize,
    pub uoms: usize,
    pub accounts: usize,
}

/// Inserts configured reference data and accounts that are not stored yet.
/// Stored accounts keep their watermark.
pub fn bootstrap<D: Database>(
    db: &D,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> SyncResult<BootstrapSummary> {
    let mut session = db.begin()?;
    let mut summary = BootstrapSummary::default();

    for country in &config.reference.countries {
        let stored = match session.countries_by_code(&country.code)?.into_iter().next() {
            Some(existing) => existing,
            None => {
                summary.countries += 1;
                session.insert_country(&country.code, &country.name)?
            }
        };
        for subdivision in &country.subdivisions {
            let prefix = format!("{}-", stored.code);
            let code = if subdivision.code.starts_with(&prefix) {
                subdivision.code.clone()
            } else {
                format!("{prefix}{}", subdivision.code)
            };
            if session.subdivision_by_code(stored.id, &code)?.is_none() {
                session.insert_subdivision(stored.id, &code, &subdivision.name)?;
                summary.subdivisions += 1;
            }
        }
    }

    for currency in &config.reference.currencies {
        if session.currencies_by_code(&currency.code)?.is_empty() {
            session.insert_currency(&currency.code, &currency.name)?;
            summary.currencies += 1;
        }
    }

    for uom in &config.reference.uoms {
        if session.uoms_by_name(&uom.name)?.is_empty() {
            session.insert_uom(&uom.name, &uom.symbol)?;
            summary.uoms += 1;
        }
    }

    for entry in &config.accounts {
        let known = session.accounts_by_credentials(
            &entry.app_id,
            &entry.dev_id,
            &entry.cert_id,
            &entry.token,
        )?;
        if let Some(holder) = known.iter().find(|a| a.name != entry.name) {
            return Err(SyncError::duplicate(
                "duplicate_account",
                format!(
                    "Account {} reuses the credentials of account {}.",
                    entry.name, holder.name
                ),
            ));
        }
        if !known.is_empty() {
            continue;
        }
        session.insert_account(entry.clone().into_account(now))?;
        summary.accounts += 1;
    }

    db.commit(session)?;
    info!(
        target = "ebay_sync.config",
        countries = summary.countries,
        subdivisions = summary.subdivisions,
        currencies = summary.currencies,
        uoms = summary.uoms,
        accounts = summary.accounts,
        "bootstrap_done"
    );
    Ok(summary)
}
