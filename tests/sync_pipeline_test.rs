//! End-to-end sync tests against a temporary SQLite database and a mock ledger.
//!
//! Covers filtering, mapping, anomaly recording, cursor handling and
//! idempotency across repeated runs.

use chrono::{TimeZone, Utc};
use fundsync::datasource::{LedgerClient, MockLedgerClient};
use fundsync::db::init_db;
use fundsync::domain::{
    Address, ClassReason, CounterpartyType, Decimal, Direction, FundAccount, MappingMethod,
    RawPayment, CLASS_DIVIDEND, CLASS_FUNDING,
};
use fundsync::engine::{ClassificationRules, MappingRules};
use fundsync::orchestration::{ReferenceContext, SyncOptions, Syncer};
use fundsync::Repository;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const FUND: &str = "GFUND";
const SIDE_FUND: &str = "GSIDE";

struct Harness {
    _dir: TempDir,
    repo: Arc<Repository>,
    context: Arc<ReferenceContext>,
}

async fn harness(funds: Vec<FundAccount>) -> Harness {
    let dir = TempDir::new().unwrap();
    let projects = dir.path().join("projects.csv");
    let residents = dir.path().join("residents.csv");
    let accounts = dir.path().join("accounts.csv");
    fs::write(
        &projects,
        "project_id,clickup_task_id,account,issuer,token_symbol,is_active\n\
         101,abc,GRES1,,BAKE,TRUE\n\
         303,,,,,TRUE\n\
         404,,GRES2,,,FALSE\n",
    )
    .unwrap();
    fs::write(
        &residents,
        "label,accounts,issuers\n\
         Bakery,GRES1,\n\
         Farm,GRES2;not-an-address,\n",
    )
    .unwrap();
    fs::write(&accounts, "account,label\nGFUND,Main treasury\n").unwrap();

    let context = ReferenceContext::load(
        funds,
        &projects,
        &residents,
        Some(accounts.as_path()),
        MappingRules::default(),
        ClassificationRules::default(),
    )
    .unwrap();

    let db_path = dir.path().join("ledger.db");
    let pool = init_db(db_path.to_str().unwrap()).await.unwrap();
    Harness {
        _dir: dir,
        repo: Arc::new(Repository::new(pool)),
        context: Arc::new(context),
    }
}

fn main_fund() -> Vec<FundAccount> {
    vec![FundAccount {
        key: "MAIN".to_string(),
        address: Address::new(FUND),
    }]
}

fn payment(token: &str, from: &str, to: &str, amount: &str, tx: &str) -> RawPayment {
    RawPayment {
        id: format!("op{}", token),
        paging_token: token.to_string(),
        op_type: "payment".to_string(),
        from: Some(from.to_string()),
        to: Some(to.to_string()),
        asset_type: Some("credit_alphanum12".to_string()),
        asset_code: Some("EURMTL".to_string()),
        asset_issuer: Some("GISSUER".to_string()),
        amount: Some(amount.to_string()),
        created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        transaction_hash: Some(tx.to_string()),
    }
}

fn history() -> Vec<RawPayment> {
    let create_account = RawPayment {
        op_type: "create_account".to_string(),
        ..payment("2", FUND, "GNEW", "5.0000000", "tx2")
    };
    let native = RawPayment {
        asset_type: Some("native".to_string()),
        asset_code: None,
        asset_issuer: None,
        ..payment("6", "GRES2", FUND, "10.0000000", "tx6")
    };
    vec![
        payment("1", "GRES1", FUND, "100.0000000", "tx1"),
        create_account,
        payment("3", FUND, "GRES2", "50.0000000", "tx3"),
        payment("4", "GEXTERNAL", FUND, "20.0000000", "tx4"),
        payment("5", "GRES2", FUND, "0.0010000", "tx5"),
        native,
        payment("7", "GRES2", FUND, "7.5000000", "tx7"),
    ]
}

fn options() -> SyncOptions {
    SyncOptions {
        page_limit: 2,
        ..SyncOptions::default()
    }
}

fn syncer(h: &Harness, client: MockLedgerClient) -> Syncer {
    let client: Arc<dyn LedgerClient> = Arc::new(client);
    Syncer::new(client, h.repo.clone(), h.context.clone(), options())
}

#[tokio::test]
async fn test_sync_filters_maps_and_records() {
    let h = harness(main_fund()).await;
    let client = MockLedgerClient::new().with_payments(FUND, history());

    let report = syncer(&h, client).run().await.unwrap();
    let stats = &report.funds[0];
    assert_eq!(stats.fetched, 7);
    assert_eq!(stats.drop_type, 1);
    assert_eq!(stats.drop_scope, 1);
    assert_eq!(stats.drop_min_amount, 1);
    assert_eq!(stats.drop_native, 1);
    assert_eq!(stats.rows_appended, 3);
    assert_eq!(stats.unmapped, 2);
    assert_eq!(stats.anomalies_recorded, 2);
    assert_eq!(stats.memo_queued, 3);
    assert_eq!(stats.cursor_before, None);
    assert_eq!(stats.cursor_after.as_deref(), Some("7"));
    assert!(stats.error.is_none());

    let rows = h.repo.load_transfers().await.unwrap();
    assert_eq!(rows.len(), 3);

    let first = &rows[0].row;
    assert_eq!(first.tx_hash, "tx1");
    assert_eq!(first.op_id, "op1");
    assert_eq!(first.direction, Direction::In);
    assert_eq!(first.counterparty_type, CounterpartyType::Resident);
    assert_eq!(first.project_id, "101");
    assert_eq!(first.mapping_method, Some(MappingMethod::ResidentsAccount));
    assert_eq!(first.class, CLASS_DIVIDEND);
    assert_eq!(first.class_reason, Some(ClassReason::InFromResidentDefault));
    assert_eq!(first.from_label, "Bakery");
    assert_eq!(first.to_label, "Main treasury");
    assert_eq!(first.amount, Decimal::from_str_canonical("100").unwrap());

    let outgoing = &rows[1].row;
    assert_eq!(outgoing.direction, Direction::Out);
    assert_eq!(outgoing.class, CLASS_FUNDING);
    assert_eq!(outgoing.class_reason, Some(ClassReason::OutToResident));
    assert_eq!(outgoing.project_id, "UNMAPPED");

    assert_eq!(h.repo.get_cursor("MAIN").await.unwrap().as_deref(), Some("7"));
    assert_eq!(h.repo.memo_queue_len().await.unwrap(), 3);

    let changes = h
        .repo
        .query_balance_changes(&Address::new(FUND))
        .await
        .unwrap();
    assert_eq!(changes.len(), 3);
    assert_eq!(
        changes[1].change_amount,
        Decimal::from_str_canonical("-50").unwrap()
    );

    let log = h.repo.query_sync_log(&report.run_id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].stage, "sync");
    assert_eq!(log[0].fund_key, "MAIN");
    let details: serde_json::Value = serde_json::from_str(&log[0].details).unwrap();
    assert_eq!(details["rows_appended"], 3);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let h = harness(main_fund()).await;
    let client = MockLedgerClient::new().with_payments(FUND, history());
    let syncer = syncer(&h, client);

    syncer.run().await.unwrap();

    let again = syncer.run().await.unwrap();
    assert_eq!(again.rows_appended(), 0);
    assert_eq!(again.anomalies_recorded(), 0);
    assert_eq!(again.funds[0].fetched, 0);

    // Without cursors every record is seen again and skipped by key.
    assert_eq!(h.repo.reset_cursors().await.unwrap(), 1);
    let replay = syncer.run().await.unwrap();
    let stats = &replay.funds[0];
    assert_eq!(stats.fetched, 7);
    assert_eq!(stats.dedup_skipped, 3);
    assert_eq!(stats.rows_appended, 0);
    assert_eq!(stats.anomalies_recorded, 0);
    assert_eq!(stats.dominant_drop_reason(), Some("dedup"));

    assert_eq!(h.repo.load_transfers().await.unwrap().len(), 3);
    assert_eq!(h.repo.query_anomalies().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_end_date_stops_paging_without_advancing_cursor() {
    let h = harness(main_fund()).await;
    let mut late = payment("2", "GRES1", FUND, "1.0000000", "tx-late");
    late.created_at = Some(Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap());
    let client = MockLedgerClient::new().with_payments(
        FUND,
        vec![payment("1", "GRES1", FUND, "1.0000000", "tx-early"), late],
    );

    let client: Arc<dyn LedgerClient> = Arc::new(client);
    let windowed = SyncOptions {
        end_exclusive: Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()),
        ..options()
    };
    let report = Syncer::new(client, h.repo.clone(), h.context.clone(), windowed)
        .run()
        .await
        .unwrap();

    let stats = &report.funds[0];
    assert!(stats.reached_end_date);
    assert_eq!(stats.drop_date, 1);
    assert_eq!(stats.rows_appended, 1);
    assert_eq!(h.repo.get_cursor("MAIN").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn test_token_filter_and_blocklist() {
    let h = harness(main_fund()).await;
    let mut other = payment("2", "GRES1", FUND, "3.0000000", "tx-other");
    other.asset_code = Some("MTLAP".to_string());
    let client: Arc<dyn LedgerClient> = Arc::new(MockLedgerClient::new().with_payments(
        FUND,
        vec![payment("1", "GRES1", FUND, "2.0000000", "tx-eur"), other],
    ));

    let token_options = SyncOptions {
        token_filter: fundsync::domain::TokenFilter::parse("mtlap"),
        ..options()
    };
    let report = Syncer::new(client.clone(), h.repo.clone(), h.context.clone(), token_options)
        .run()
        .await
        .unwrap();
    assert_eq!(report.funds[0].drop_token_filter, 1);
    assert_eq!(report.funds[0].rows_appended, 1);
    assert_eq!(h.repo.load_transfers().await.unwrap()[0].row.tx_hash, "tx-other");

    let h = harness(main_fund()).await;
    let blocklist_options = SyncOptions {
        asset_blocklist: vec!["EURMTL:GISSUER".to_string()],
        ..options()
    };
    let report = Syncer::new(client, h.repo.clone(), h.context.clone(), blocklist_options)
        .run()
        .await
        .unwrap();
    assert_eq!(report.funds[0].drop_asset_filter, 1);
    assert_eq!(report.funds[0].rows_appended, 1);
}

#[tokio::test]
async fn test_ledger_error_only_stops_that_fund() {
    let mut funds = main_fund();
    funds.push(FundAccount {
        key: "SIDE".to_string(),
        address: Address::new(SIDE_FUND),
    });
    let h = harness(funds).await;
    let client = MockLedgerClient::new()
        .with_payments(FUND, history())
        .with_failing_account(SIDE_FUND);

    let report = syncer(&h, client).run().await.unwrap();
    assert_eq!(report.funds.len(), 2);
    assert_eq!(report.failed_funds(), vec!["SIDE"]);
    assert_eq!(report.funds[0].rows_appended, 3);
    assert!(report.funds[1].error.as_deref().unwrap().contains("503"));
    assert_eq!(h.repo.get_cursor("SIDE").await.unwrap(), None);

    let log = h.repo.query_sync_log(&report.run_id).await.unwrap();
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn test_memo_queued_once_per_transaction() {
    let h = harness(main_fund()).await;
    let mut second_op = payment("2", "GRES1", FUND, "4.0000000", "tx-multi");
    second_op.id = "op-multi-2".to_string();
    let client = MockLedgerClient::new().with_payments(
        FUND,
        vec![
            payment("1", "GRES1", FUND, "3.0000000", "tx-multi"),
            second_op,
            payment("3", "GRES2", FUND, "5.0000000", "tx-single"),
        ],
    );

    let report = syncer(&h, client).run().await.unwrap();
    let stats = &report.funds[0];
    assert_eq!(stats.rows_appended, 3);
    assert_eq!(stats.memo_queued, 2);
    assert_eq!(h.repo.memo_queue_len().await.unwrap(), 2);
}
