//! S4: re-ingesting the same raw file with `force=false` is a no-op — the
//! storage snapshot and manifest counts are unchanged.

mod common;

use tokio_util::sync::CancellationToken;

use pointline::ingest::{IngestOptions, ingest_file};
use pointline::parsers::FileMeta;
use pointline::storage::partition::PartitionPredicate;

fn fixture() -> FileMeta {
    FileMeta {
        vendor: "binance".to_string(),
        data_type: "trades".to_string(),
        raw_path: "binance/trades/2024-01-01/a.csv".to_string(),
        content_hash: "fixed-hash".to_string(),
        bytes: b"venue_symbol,ts_event_us,side,price,qty,trade_id\nBTCUSDT,1700000000000000,buy,42000.5,0.01,t1\n".to_vec(),
    }
}

#[tokio::test]
async fn second_ingest_with_force_false_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let engine = common::engine(&dir);
    let registry = common::registry_with_one_symbol("binance", "BTCUSDT", 1_699_000_000_000_000);
    let config = common::config();
    let cancel = CancellationToken::new();

    let first = ingest_file(
        fixture(),
        &registry,
        &engine,
        &config,
        IngestOptions::default(),
        1_700_000_000_000_100,
        &cancel,
    )
    .await
    .unwrap();
    assert!(!first.skipped);
    assert_eq!(first.rows_written, 1);

    let table = engine.table("trades").unwrap();
    let before = table.snapshot_read(&PartitionPredicate::all(), None).await.unwrap();

    let second = ingest_file(
        fixture(),
        &registry,
        &engine,
        &config,
        IngestOptions::default(),
        1_700_000_000_000_200,
        &cancel,
    )
    .await
    .unwrap();
    assert!(second.skipped);
    assert_eq!(second.rows_written, first.rows_written);

    let after = table.snapshot_read(&PartitionPredicate::all(), None).await.unwrap();
    assert_eq!(before.height(), after.height());
}
