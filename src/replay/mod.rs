//! L2 Replay & Feature Kernel (C8, §4.8) — the hard core. [`extract_features`]
//! replays a tie-break-sorted stream of [`book::BookUpdate`]s through a
//! [`book::BookState`] and a set of [`features::FeatureSignal`]s, emitting one
//! row per feature per window boundary.

pub mod book;
pub mod features;
pub mod window;

use book::{BookState, BookUpdate};
use features::{Aggregator, FeatureSignal, new_aggregator};
use window::WindowConfig;

#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub window_start_ts_us: i64,
    pub window_end_ts_us: i64,
    pub feature_name: String,
    pub value: Option<f64>,
    pub book_reset: bool,
    pub crossed_book_count: i64,
}

/// Replay `updates` (already sorted by `(ts_event_us, file_id, file_seq)`)
/// through `features`, emitting one [`FeatureRow`] per feature per window
/// boundary (§4.8 "Windowing", "Determinism", "PIT safety" — only updates
/// with `ts_event_us < window_end` are ever consumed for that window).
pub fn extract_features(
    updates: &[BookUpdate],
    mut features: Vec<Box<dyn FeatureSignal>>,
    window: WindowConfig,
) -> Vec<FeatureRow> {
    let windows = window.windows();
    let mut book = BookState::new();
    let mut aggregators: Vec<Box<dyn Aggregator>> =
        features.iter().map(|f| new_aggregator(f.default_aggregator())).collect();

    let mut update_idx = 0usize;
    let mut book_reset_in_window = false;
    let mut prev_crossed_count = book.crossed_book_count();
    let mut rows = Vec::with_capacity(windows.len() * features.len());

    for w in &windows {
        let mut last_update: Option<BookUpdate> = None;
        while update_idx < updates.len() && updates[update_idx].ts_event_us < w.end_ts_us {
            let update = updates[update_idx];
            let before = book.clone();
            if book.apply(&update) {
                book_reset_in_window = true;
            }
            let mid = book.mid_price_scaled().map(|v| v as f64);
            for (i, feature) in features.iter_mut().enumerate() {
                if feature.sample_at_window_end() {
                    continue;
                }
                if let Some(value) = feature.on_update(&update, &before, &book, mid) {
                    aggregators[i].push(value);
                }
            }
            last_update = Some(update);
            update_idx += 1;
        }

        if let Some(update) = last_update {
            let mid = book.mid_price_scaled().map(|v| v as f64);
            for (i, feature) in features.iter_mut().enumerate() {
                if feature.sample_at_window_end() {
                    if let Some(value) = feature.on_update(&update, &book, &book, mid) {
                        aggregators[i].push(value);
                    }
                }
            }
        }

        let crossed_delta = book.crossed_book_count() - prev_crossed_count;
        prev_crossed_count = book.crossed_book_count();

        for (i, feature) in features.iter().enumerate() {
            let raw = aggregators[i].emit_and_reset();
            rows.push(FeatureRow {
                window_start_ts_us: w.start_ts_us,
                window_end_ts_us: w.end_ts_us,
                feature_name: feature.name().to_string(),
                value: if raw.is_nan() { None } else { Some(raw) },
                book_reset: book_reset_in_window,
                crossed_book_count: crossed_delta as i64,
            });
        }
        book_reset_in_window = false;
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use book::Side;
    use features::{BookImbalance, MidPrice};
    use window::Alignment;

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
    fn extract_features_emits_one_row_per_feature_per_window() {
        let updates = vec![
            upd(100, Side::Bid, 1000, 5),
            upd(200, Side::Ask, 1010, 5),
            upd(1_500, Side::Bid, 1001, 3),
        ];
        let config = WindowConfig {
            start_ts_us: 0,
            end_ts_us: 2_000,
            step_us: 1_000,
            alignment: Alignment::StartAligned,
        };
        let features: Vec<Box<dyn FeatureSignal>> = vec![Box::new(MidPrice)];
        let rows = extract_features(&updates, features, config);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].window_end_ts_us, 1_000);
        assert_eq!(rows[1].window_end_ts_us, 2_000);
        assert_eq!(rows[0].value, Some(1005.0));
    }

    #[test]
    fn pit_safety_ignores_updates_at_or_after_window_end() {
        let updates = vec![upd(999, Side::Bid, 1000, 5), upd(1_000, Side::Bid, 2000, 5)];
        let config = WindowConfig {
            start_ts_us: 0,
            end_ts_us: 1_000,
            step_us: 1_000,
            alignment: Alignment::StartAligned,
        };
        let features: Vec<Box<dyn FeatureSignal>> = vec![Box::new(MidPrice)];
        let rows = extract_features(&updates, features, config);
        assert_eq!(rows.len(), 1);
        // the ts=1_000 update must not have been consumed.
        assert_eq!(rows[0].value, None);
    }

    #[test]
    fn book_imbalance_feature_runs_without_panicking() {
        let updates = vec![
            upd(100, Side::Bid, 1000, 5),
            upd(150, Side::Ask, 1010, 5),
        ];
        let config = WindowConfig {
            start_ts_us: 0,
            end_ts_us: 1_000,
            step_us: 1_000,
            alignment: Alignment::StartAligned,
        };
        let features: Vec<Box<dyn FeatureSignal>> = vec![Box::new(BookImbalance {
            halflife_bps: 50.0,
            max_levels: 5,
        })];
        let rows = extract_features(&updates, features, config);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].value.is_some());
    }
}
