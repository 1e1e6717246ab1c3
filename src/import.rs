use crate::ebay::trading::TradingApi;
use crate::error::{SyncError, SyncResult};
use crate::models::Account;
use crate::reconcile::order;
use crate::store::{Database, Store};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub fetched: usize,
    pub created: usize,
    pub existing: usize,
    /// `(order id, error)` for every order that could not be reconciled.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct AccountImport {
    pub account_id: Uuid,
    pub account_name: String,
    pub outcome: SyncResult<ImportReport>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Imports completed orders created since each account's watermark.
///
/// `accounts` restricts the run to the given ids; `None` means every
/// configured account. A failing account never stops the others.
pub async fn import_orders<D, A, F>(
    db: &D,
    make_api: F,
    accounts: Option<&[Uuid]>,
    now: DateTime<Utc>,
) -> SyncResult<Vec<AccountImport>>
where
    D: Database,
    A: TradingApi,
    F: Fn(&Account) -> A,
{
    let configured = db.begin()?.accounts()?;
    let selected: Vec<(Uuid, Option<Account>)> = match accounts {
        None => configured.into_iter().map(|a| (a.id, Some(a))).collect(),
        Some(ids) => ids
            .iter()
            .map(|id| (*id, configured.iter().find(|a| a.id == *id).cloned()))
            .collect(),
    };

    let mut results = Vec::with_capacity(selected.len());
    for (account_id, account) in selected {
        let Some(account) = account else {
            results.push(AccountImport {
                account_id,
                account_name: String::new(),
                outcome: Err(SyncError::not_found(
                    "account_not_found",
                    format!("Account {account_id} is not configured."),
                )),
            });
            continue;
        };

        let api = make_api(&account);
        let outcome = import_account(db, &api, &account, now).await;
        match &outcome {
            Ok(report) => info!(
                target = "ebay_sync.import",
                account = %account.name,
                fetched = report.fetched,
                created = report.created,
                existing = report.existing,
                failed = report.failed.len(),
                "account_imported"
            ),
            Err(err) => error!(
                target = "ebay_sync.import",
                account = %account.name,
                error = %err,
                "account_import_failed"
            ),
        }
        results.push(AccountImport {
            account_id,
            account_name: account.name.clone(),
            outcome,
        });
    }
    Ok(results)
}

async fn import_account<D: Database, A: TradingApi>(
    db: &D,
    api: &A,
    account: &Account,
    now: DateTime<Utc>,
) -> SyncResult<ImportReport> {
    let response = api
        .execute(
            "GetOrders",
            json!({
                "CreateTimeFrom": timestamp(account.last_import_watermark),
                "CreateTimeTo": timestamp(now),
                "OrderStatus": "Completed",
                "DetailLevel": "ReturnAll",
            }),
        )
        .await?;

    // Orders already returned must not be fetched again, even if one of
    // them fails below.
    let mut session = db.begin()?;
    session.set_import_watermark(account.id, now)?;
    db.commit(session)?;

    let orders = response.root().items_at(&["OrderArray", "Order"]);
    let mut report = ImportReport {
        fetched: orders.len(),
        ..ImportReport::default()
    };

    for payload in orders {
        let order_id = payload.text_at(&["OrderID"]).unwrap_or_default().to_string();
        let mut session = db.begin()?;
        let outcome = match order::find_or_create_from_payload(&mut session, api, account, payload)
            .await
        {
            Ok((_, created)) => db.commit(session).map(|()| created).map_err(SyncError::from),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(true) => report.created += 1,
            Ok(false) => report.existing += 1,
            Err(err) => {
                warn!(
                    target = "ebay_sync.import",
                    account = %account.name,
                    order = %order_id,
                    error = %err,
                    "order_import_failed"
                );
                report.failed.push((order_id, err.to_string()));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeTradingApi};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 6, 1, 12, 0, 0).unwrap()
    }

    fn order(order_id: &str, total: &str) -> serde_json::Value {
        testing::order(
            order_id,
            testing::transaction("110", "Blue Mug", "10.00", "1"),
            "2.00",
            total,
        )
    }

    fn watermark<D: Database>(db: &D, id: Uuid) -> DateTime<Utc> {
        db.begin()
            .unwrap()
            .account(id)
            .unwrap()
            .unwrap()
            .last_import_watermark
    }

    #[tokio::test]
    async fn imports_orders_and_advances_watermark() {
        let (db, account) = testing::seeded_db();
        let api = testing::marketplace().with(
            "GetOrders",
            "*",
            testing::orders_response(vec![order("A-1", "12.00"), order("A-2", "12.00")]),
        );

        let results = import_orders(&db, |_| api.clone(), None, now()).await.unwrap();
        assert_eq!(results.len(), 1);
        let report = results[0].outcome.as_ref().unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.created, 2);
        assert!(report.failed.is_empty());
        assert_eq!(watermark(&db, account.id), now());

        let (_, params) = &api.calls()[0];
        assert_eq!(params["CreateTimeFrom"], "2013-05-01T00:00:00.000Z");
        assert_eq!(params["CreateTimeTo"], "2013-06-01T12:00:00.000Z");
        assert_eq!(params["OrderStatus"], "Completed");

        let again = import_orders(&db, |_| api.clone(), None, now()).await.unwrap();
        let report = again[0].outcome.as_ref().unwrap();
        assert_eq!(report.existing, 2);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn failed_order_keeps_the_rest_and_the_watermark() {
        let (db, account) = testing::seeded_db();
        let api = testing::marketplace().with(
            "GetOrders",
            "*",
            testing::orders_response(vec![order("A-1", "99.00"), order("A-2", "12.00")]),
        );

        let results = import_orders(&db, |_| api.clone(), None, now()).await.unwrap();
        let report = results[0].outcome.as_ref().unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "A-1");
        assert!(report.failed[0].1.contains("total_mismatch"));
        assert_eq!(watermark(&db, account.id), now());

        let session = db.begin().unwrap();
        assert!(session.orders_by_order_id("A-1").unwrap().is_empty());
        assert_eq!(session.orders_by_order_id("A-2").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_fetch_still_advances_watermark() {
        let (db, account) = testing::seeded_db();
        let api = FakeTradingApi::default().with("GetOrders", "*", testing::orders_response(vec![]));
        let results = import_orders(&db, |_| api.clone(), None, now()).await.unwrap();
        assert_eq!(results[0].outcome.as_ref().unwrap(), &ImportReport::default());
        assert_eq!(watermark(&db, account.id), now());
        assert_eq!(api.total_calls(), 1);
    }

    #[tokio::test]
    async fn one_failing_account_does_not_stop_the_next() {
        let (db, good) = testing::seeded_db();
        let mut broken = testing::account();
        broken.name = "Broken".into();
        broken.token = "expired".into();
        let mut session = db.begin().unwrap();
        session.insert_account(broken.clone()).unwrap();
        db.commit(session).unwrap();

        let healthy = testing::marketplace().with(
            "GetOrders",
            "*",
            testing::orders_response(vec![order("A-1", "12.00")]),
        );
        let failing = FakeTradingApi::default().with_error("GetOrders", "*", &["Auth token is invalid."]);

        let results = import_orders(
            &db,
            |account| {
                if account.name == "Broken" {
                    failing.clone()
                } else {
                    healthy.clone()
                }
            },
            None,
            now(),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        let broken_result = results.iter().find(|r| r.account_id == broken.id).unwrap();
        assert!(broken_result.outcome.is_err());
        assert_eq!(watermark(&db, broken.id), broken.last_import_watermark);

        let good_result = results.iter().find(|r| r.account_id == good.id).unwrap();
        assert_eq!(good_result.outcome.as_ref().unwrap().created, 1);
        assert_eq!(watermark(&db, good.id), now());
    }

    #[tokio::test]
    async fn unknown_account_is_reported() {
        let (db, _) = testing::seeded_db();
        let api = FakeTradingApi::default();
        let missing = Uuid::new_v4();
        let results = import_orders(&db, |_| api.clone(), Some(&[missing][..]), now())
            .await
            .unwrap();
        let err = results[0].outcome.as_ref().unwrap_err();
        assert_eq!(err.code(), "account_not_found");
        assert_eq!(api.total_calls(), 0);
    }
}
