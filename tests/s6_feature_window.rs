//! S6: a stable book (bid=99.9, ask=100.1 under the crypto fixed-point scale,
//! so the scaled mid is exactly `encode(100.0)`) produces one `MidPrice` row
//! per window with a decoded value of 100.0.

use pointline::replay::book::{BookUpdate, Side};
use pointline::replay::features::{FeatureSignal, MidPrice};
use pointline::replay::window::{Alignment, WindowConfig};
use pointline::replay::extract_features;
use pointline::schema::Scale;

fn upd(ts: i64, side: Side, price: i64, qty: i64) -> BookUpdate {
    BookUpdate {
        ts_event_us: ts,
        file_id: 1,
        file_seq: ts,
        side,
        price,
        qty,
        is_snapshot: false,
    }
}

#[test]
fn stable_mid_price_decodes_to_one_hundred_per_window() {
    let bid = Scale::CRYPTO.encode(99.9).unwrap();
    let ask = Scale::CRYPTO.encode(100.1).unwrap();

    let step_us = 1_000_000i64;
    let updates = vec![
        upd(0, Side::Bid, bid, 1),
        upd(0, Side::Ask, ask, 1),
        upd(step_us + 10, Side::Bid, bid, 1),
        upd(step_us + 10, Side::Ask, ask, 1),
    ];

    let config = WindowConfig {
        start_ts_us: 0,
        end_ts_us: step_us * 3,
        step_us,
        alignment: Alignment::StartAligned,
    };
    let features: Vec<Box<dyn FeatureSignal>> = vec![Box::new(MidPrice)];
    let rows = extract_features(&updates, features, config);

    assert_eq!(rows.len(), 3);
    for row in &rows[..2] {
        let scaled_mid = row.value.expect("mid should be defined once quotes exist") as i64;
        let decoded = Scale::CRYPTO.decode(scaled_mid);
        assert!((decoded - 100.0).abs() < 1e-9);
    }
}
