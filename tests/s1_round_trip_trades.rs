//! S1: ingest a small trades fixture directly into storage (bypassing the raw
//! parser — this scenario exercises `load_events` + `decode_scaled_columns`,
//! not the vendor parsing stage) and read it back through the query kernel.

mod common;

use polars::prelude::*;

use pointline::query::{EventRange, decode_scaled_columns, load_events};
use pointline::schema::Scale;

#[tokio::test]
async fn round_trip_recovers_original_prices() {
    let dir = tempfile::tempdir().unwrap();
    let engine = common::engine(&dir);
    let registry = common::registry_with_one_symbol("ex-a", "AB", 1_699_000_000_000_000);
    let symbol_id = registry.as_of("ex-a", "AB", 1_700_000_000_000_000).unwrap().symbol_id.0;

    let ts = vec![1_700_000_000_000_000i64, 1_700_000_000_000_001, 1_700_000_000_000_002];
    let prices = vec![42_000.5, 42_001.0, 41_999.75];
    let scaled_prices: Vec<i64> = prices.iter().map(|p| Scale::CRYPTO.encode(*p).unwrap()).collect();

    let trading_date = Int32Chunked::from_iter(ts.iter().map(|_| Some(19_723))).into_date().into_series().with_name("trading_date".into());

    let frame = df! {
        "venue" => vec!["ex-a"; 3],
        "venue_id" => vec![1u32; 3],
        "symbol_id" => vec![symbol_id; 3],
        "ts_event_us" => ts.clone(),
        "file_id" => vec![1i64; 3],
        "file_seq" => vec![1i64, 2, 3],
        "side" => vec!["buy", "sell", "buy"],
        "price" => scaled_prices.clone(),
        "qty" => vec![1_000_000_000i64; 3],
        "trade_id" => vec![Some("t1"), Some("t2"), Some("t3")],
    }
    .unwrap();
    let mut frame = frame;
    frame.with_column(trading_date).unwrap();

    let table = engine.table("trades").unwrap();
    table.append(frame, 1_700_000_000_000_003).await.unwrap();

    let range = EventRange {
        start_ts_us: 1_700_000_000_000_000,
        end_ts_us: 1_700_000_000_000_003,
    };
    let rows = load_events(&engine, "trades", "ex-a", "AB", &range, &registry, None, false)
        .await
        .unwrap();
    assert_eq!(rows.height(), 3);

    let decoded = decode_scaled_columns(rows, "trades", Some(&["price"])).unwrap();
    let recovered: Vec<f64> = decoded.column("price").unwrap().f64().unwrap().into_iter().flatten().collect();
    assert_eq!(recovered, prices);
}
