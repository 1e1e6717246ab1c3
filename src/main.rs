mod config;
mod ebay;
mod error;
mod http;
mod import;
mod metrics;
mod models;
mod reconcile;
mod store;
#[cfg(test)]
mod testing;

use chrono::Utc;
use clap::{Parser, Subcommand};
use config::SyncConfig;
use ebay::{TradingClient, token_status};
use error::{SyncError, SyncResult};
use eyre::eyre;
use models::Account;
use serde_json::json;
use std::path::PathBuf;
use store::{Database, MemoryDatabase, Store};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

/// Keeps local parties, products and orders in step with eBay seller accounts.
#[derive(Debug, Parser)]
#[command(name = "ebay-sync", version, about)]
struct Cli {
    /// Reference data and accounts to bootstrap.
    #[arg(long, env = "EBAY_SYNC_CONFIG", default_value = "ebay-sync.yaml")]
    config: PathBuf,
    /// JSON file holding the local store between runs.
    #[arg(long, env = "EBAY_SYNC_STATE", default_value = "ebay-sync-state.json")]
    state: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import completed orders since each account's last import.
    ImportOrders {
        /// Account name or id; repeat to select several. Defaults to all.
        #[arg(long = "account")]
        accounts: Vec<String>,
    },
    /// Import a single order by its eBay order id.
    ImportOrder {
        #[arg(long)]
        account: String,
        #[arg(long)]
        order_id: String,
    },
    /// Push storage quantities of listed products.
    ExportInventory {
        #[arg(long)]
        account: String,
    },
    /// List exportable products that are not on eBay yet.
    ExportCatalog {
        #[arg(long)]
        account: String,
        /// Stop after this many new listings.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show whether the account's auth token is still valid.
    TokenStatus {
        #[arg(long)]
        account: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "ebay_sync.cli", "run failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let db = MemoryDatabase::open(&cli.state)?;
    let config = SyncConfig::load(&cli.config)?;
    config::bootstrap(&db, &config, Utc::now())?;

    let outcome = execute(&db, cli.command).await;
    db.save(&cli.state)?;
    info!(target = "ebay_sync.cli", state = %cli.state.display(), "state_saved");
    outcome
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Looks an account up by id first, then by name.
fn resolve_account<S: Store>(store: &S, key: &str) -> SyncResult<Account> {
    let by_id = match Uuid::parse_str(key) {
        Ok(id) => store.account(id)?,
        Err(_) => None,
    };
    if let Some(account) = by_id {
        return Ok(account);
    }
    store
        .accounts()?
        .into_iter()
        .find(|a| a.name == key)
        .ok_or_else(|| {
            SyncError::not_found("account_not_found", format!("Account {key} is not configured."))
        })
}

fn print_json(value: &serde_json::Value) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(db: &MemoryDatabase, command: Command) -> eyre::Result<()> {
    match command {
        Command::ImportOrders { accounts } => {
            let selected = if accounts.is_empty() {
                None
            } else {
                let session = db.begin()?;
                let ids = accounts
                    .iter()
                    .map(|key| resolve_account(&session, key).map(|a| a.id))
                    .collect::<SyncResult<Vec<_>>>()?;
                Some(ids)
            };

            let results =
                import::import_orders(db, TradingClient::for_account, selected.as_deref(), Utc::now())
                    .await?;
            let mut failed_accounts = 0;
            for result in &results {
                match &result.outcome {
                    Ok(report) => print_json(&json!({
                        "account": result.account_name,
                        "report": report,
                    }))?,
                    Err(err) => {
                        failed_accounts += 1;
                        print_json(&json!({
                            "account": result.account_name,
                            "account_id": result.account_id,
                            "code": err.code(),
                            "kind": format!("{:?}", err.kind()),
                            "error": err.detail(),
                        }))?;
                    }
                }
            }
            if failed_accounts > 0 {
                return Err(eyre!("{failed_accounts} account(s) failed to import"));
            }
            Ok(())
        }
        Command::ImportOrder { account, order_id } => {
            let mut session = db.begin()?;
            let account = resolve_account(&session, &account)?;
            let api = TradingClient::for_account(&account);
            let order =
                reconcile::find_or_create_order(&mut session, &api, &account, &order_id).await?;
            db.commit(session)?;
            print_json(&serde_json::to_value(&order)?)
        }
        Command::ExportInventory { account } => {
            let session = db.begin()?;
            let account = resolve_account(&session, &account)?;
            let products: Vec<_> = session
                .products()?
                .into_iter()
                .filter(|p| p.exportable)
                .collect();
            let api = TradingClient::for_account(&account);
            let exported =
                reconcile::export_inventory(&session, &api, &account, &products).await?;
            print_json(&json!({ "account": account.name, "exported": exported }))
        }
        Command::ExportCatalog { account, limit } => {
            let account = resolve_account(&db.begin()?, &account)?;
            let api = TradingClient::for_account(&account);
            let listed = reconcile::export_catalog(db, &api, &account, limit).await?;
            let items: Vec<_> = listed
                .iter()
                .map(|p| json!({ "product": p.id, "name": p.name, "item_id": p.external_item_id }))
                .collect();
            print_json(&json!({ "account": account.name, "listed": items }))
        }
        Command::TokenStatus { account } => {
            let session = db.begin()?;
            let account = resolve_account(&session, &account)?;
            let api = TradingClient::for_account(&account);
            let status = token_status(&api).await?;
            print_json(&json!({
                "account": account.name,
                "active": status.is_active(),
                "token": status,
            }))
        }
    }
}
