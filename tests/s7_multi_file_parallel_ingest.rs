//! S7: `ingest_files` resolves and parses several raw files in parallel
//! (rayon) and then runs the rest of the pipeline for each, returning one
//! result per input file in input order with all rows visible afterward.

mod common;

use tokio_util::sync::CancellationToken;

use pointline::ingest::{IngestOptions, ingest_files};
use pointline::parsers::FileMeta;
use pointline::storage::partition::PartitionPredicate;

fn fixture(path: &str, hash: &str, trade_id: &str) -> FileMeta {
    FileMeta::from_bytes(
        "binance",
        "trades",
        path,
        format!("venue_symbol,ts_event_us,side,price,qty,trade_id\nBTCUSDT,1700000000000000,buy,42000.5,0.01,{trade_id}\n").into_bytes(),
    )
}

#[tokio::test]
async fn three_files_ingest_in_parallel_and_all_rows_land() {
    let dir = tempfile::tempdir().unwrap();
    let engine = common::engine(&dir);
    let registry = common::registry_with_one_symbol("binance", "BTCUSDT", 1_699_000_000_000_000);
    let config = common::config();
    let cancel = CancellationToken::new();

    let files = vec![
        fixture("binance/trades/2024-01-01/a.csv", "hash-a", "t1"),
        fixture("binance/trades/2024-01-01/b.csv", "hash-b", "t2"),
        fixture("binance/trades/2024-01-01/c.csv", "hash-c", "t3"),
    ];

    let results = ingest_files(
        files,
        &registry,
        &engine,
        &config,
        IngestOptions::default(),
        1_700_000_000_000_100,
        &cancel,
    )
    .await;

    assert_eq!(results.len(), 3);
    for r in &results {
        let r = r.as_ref().unwrap();
        assert!(!r.skipped);
        assert_eq!(r.rows_written, 1);
    }

    let table = engine.table("trades").unwrap();
    let all = table.snapshot_read(&PartitionPredicate::all(), None).await.unwrap();
    assert_eq!(all.height(), 3);
}
