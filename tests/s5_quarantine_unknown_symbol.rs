//! S5: a file whose rows all reference a symbol absent from the registry is
//! fully quarantined — zero rows written, every row logged with
//! `rule="no_symbol_version"` — and the manifest still reports `completed`.

mod common;

use tokio_util::sync::CancellationToken;

use pointline::ingest::{IngestOptions, ingest_file};
use pointline::parsers::FileMeta;
use pointline::registry::SymbolRegistry;
use pointline::storage::partition::PartitionPredicate;

fn fixture(n: usize) -> FileMeta {
    let mut csv = String::from("venue_symbol,ts_event_us,side,price,qty,trade_id\n");
    for i in 0..n {
        csv.push_str(&format!("ZZUSDT,{},buy,1.0,1.0,t{}\n", 1_700_000_000_000_000i64 + i as i64, i));
    }
    FileMeta {
        vendor: "binance".to_string(),
        data_type: "trades".to_string(),
        raw_path: "binance/trades/2024-01-01/unknown.csv".to_string(),
        content_hash: "unknown-symbol-hash".to_string(),
        bytes: csv.into_bytes(),
    }
}

#[tokio::test]
async fn unknown_symbol_rows_are_fully_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let engine = common::engine(&dir);
    // Empty registry: no venue/venue_symbol is covered at any timestamp.
    let registry = SymbolRegistry::new();
    let config = common::config();
    let cancel = CancellationToken::new();

    let result = ingest_file(
        fixture(100),
        &registry,
        &engine,
        &config,
        IngestOptions::default(),
        1_700_000_000_000_200,
        &cancel,
    )
    .await
    .unwrap();

    assert!(!result.skipped);
    assert_eq!(result.rows_total, 100);
    assert_eq!(result.rows_written, 0);
    assert_eq!(result.rows_quarantined, 100);

    let quarantine_table = engine.table("quarantine").unwrap();
    let logged = quarantine_table
        .snapshot_read(&PartitionPredicate::all(), None)
        .await
        .unwrap();
    assert_eq!(logged.height(), 100);

    let rules: Vec<&str> = logged.column("rule").unwrap().str().unwrap().into_iter().flatten().collect();
    assert!(rules.iter().all(|r| *r == "no_symbol_version"));

    let file_ids: Vec<i64> = logged.column("file_id").unwrap().i64().unwrap().into_iter().flatten().collect();
    assert!(file_ids.iter().all(|id| *id == result.file_id));
    assert!(result.file_id != 0);
}
