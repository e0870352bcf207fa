//! Feature signals and aggregators (§4.8 "Feature signals"). Book-based
//! signals are stateless per update; delta-based signals are stateful,
//! tracking level quantities across updates to compute order-flow-imbalance
//! contributions.

use std::collections::HashMap;

use super::book::{BookState, BookUpdate, Side};

pub trait FeatureSignal: Send {
    fn name(&self) -> &str;

    /// `on_update(update, book_before, book_after, mid_price) -> Option<f64>`.
    /// Returning `None` means this update contributes nothing (e.g. the book
    /// has no two-sided market yet).
    fn on_update(&mut self, update: &BookUpdate, before: &BookState, after: &BookState, mid_price: Option<f64>) -> Option<f64>;

    /// Default aggregator for this signal: `last` for book-based signals,
    /// `sum` for delta-based ones (§4.8).
    fn default_aggregator(&self) -> AggregatorKind;

    /// Whether this feature samples once at the window boundary (`agg=last`
    /// evaluated at `window_end`) rather than pushing per update (§4.8
    /// "Windowing").
    fn sample_at_window_end(&self) -> bool {
        matches!(self.default_aggregator(), AggregatorKind::Last)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorKind {
    Last,
    Mean,
    Sum,
    Min,
    Max,
}

pub trait Aggregator: Send {
    fn push(&mut self, value: f64);
    fn emit_and_reset(&mut self) -> f64;
}

#[derive(Default)]
pub struct LastAgg(Option<f64>);
impl Aggregator for LastAgg {
    fn push(&mut self, value: f64) {
        self.0 = Some(value);
    }
    fn emit_and_reset(&mut self) -> f64 {
        self.0.take().unwrap_or(f64::NAN)
    }
}

#[derive(Default)]
pub struct MeanAgg {
    sum: f64,
    count: u64,
}
impl Aggregator for MeanAgg {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }
    fn emit_and_reset(&mut self) -> f64 {
        let mean = if self.count == 0 { f64::NAN } else { self.sum / self.count as f64 };
        self.sum = 0.0;
        self.count = 0;
        mean
    }
}

#[derive(Default)]
pub struct SumAgg(f64);
impl Aggregator for SumAgg {
    fn push(&mut self, value: f64) {
        self.0 += value;
    }
    fn emit_and_reset(&mut self) -> f64 {
        std::mem::replace(&mut self.0, 0.0)
    }
}

pub struct MinAgg(Option<f64>);
impl Default for MinAgg {
    fn default() -> Self {
        Self(None)
    }
}
impl Aggregator for MinAgg {
    fn push(&mut self, value: f64) {
        self.0 = Some(self.0.map_or(value, |m| m.min(value)));
    }
    fn emit_and_reset(&mut self) -> f64 {
        self.0.take().unwrap_or(f64::NAN)
    }
}

pub struct MaxAgg(Option<f64>);
impl Default for MaxAgg {
    fn default() -> Self {
        Self(None)
    }
}
impl Aggregator for MaxAgg {
    fn push(&mut self, value: f64) {
        self.0 = Some(self.0.map_or(value, |m| m.max(value)));
    }
    fn emit_and_reset(&mut self) -> f64 {
        self.0.take().unwrap_or(f64::NAN)
    }
}

pub fn new_aggregator(kind: AggregatorKind) -> Box<dyn Aggregator> {
    match kind {
        AggregatorKind::Last => Box::new(LastAgg::default()),
        AggregatorKind::Mean => Box::new(MeanAgg::default()),
        AggregatorKind::Sum => Box::new(SumAgg::default()),
        AggregatorKind::Min => Box::new(MinAgg::default()),
        AggregatorKind::Max => Box::new(MaxAgg::default()),
    }
}

/// Book-based, stateless: the book's own mid price after the update.
pub struct MidPrice;
impl FeatureSignal for MidPrice {
    fn name(&self) -> &str {
        "mid_price"
    }
    fn on_update(&mut self, _u: &BookUpdate, _before: &BookState, _after: &BookState, mid_price: Option<f64>) -> Option<f64> {
        mid_price
    }
    fn default_aggregator(&self) -> AggregatorKind {
        AggregatorKind::Last
    }
}

/// Book-based, stateless: best-ask minus best-bid, in scaled integer units
/// cast to `f64` (decoding happens only at the query edge, never here).
pub struct Spread;
impl FeatureSignal for Spread {
    fn name(&self) -> &str {
        "spread"
    }
    fn on_update(&mut self, _u: &BookUpdate, _before: &BookState, after: &BookState, _mid: Option<f64>) -> Option<f64> {
        after.spread_scaled().map(|s| s as f64)
    }
    fn default_aggregator(&self) -> AggregatorKind {
        AggregatorKind::Last
    }
}

/// Book-based, stateless: exponentially-decayed depth on `side` within
/// `halflife_bps` of the mid price.
pub struct WeightedDepth {
    pub side: Side,
    pub halflife_bps: f64,
    pub max_levels: usize,
}

impl FeatureSignal for WeightedDepth {
    fn name(&self) -> &str {
        "weighted_depth"
    }

    fn on_update(&mut self, _u: &BookUpdate, _before: &BookState, after: &BookState, mid_price: Option<f64>) -> Option<f64> {
        let mid = mid_price?;
        if mid == 0.0 {
            return None;
        }
        let levels = after.levels(self.side, self.max_levels);
        let decay = (0.5f64).powf(1.0 / self.halflife_bps.max(1e-9));
        let mut total = 0.0;
        for (price, qty) in levels {
            let dist_bps = ((price as f64 - mid).abs() / mid) * 10_000.0;
            let weight = decay.powf(dist_bps);
            total += weight * qty as f64;
        }
        Some(total)
    }

    fn default_aggregator(&self) -> AggregatorKind {
        AggregatorKind::Last
    }
}

/// Book-based, stateless: `(bid_depth - ask_depth) / (bid_depth + ask_depth)`
/// within `halflife_bps`.
pub struct BookImbalance {
    pub halflife_bps: f64,
    pub max_levels: usize,
}

impl FeatureSignal for BookImbalance {
    fn name(&self) -> &str {
        "book_imbalance"
    }

    fn on_update(&mut self, u: &BookUpdate, before: &BookState, after: &BookState, mid_price: Option<f64>) -> Option<f64> {
        let mut bid_feat = WeightedDepth {
            side: Side::Bid,
            halflife_bps: self.halflife_bps,
            max_levels: self.max_levels,
        };
        let mut ask_feat = WeightedDepth {
            side: Side::Ask,
            halflife_bps: self.halflife_bps,
            max_levels: self.max_levels,
        };
        let bid_depth = bid_feat.on_update(u, before, after, mid_price)?;
        let ask_depth = ask_feat.on_update(u, before, after, mid_price)?;
        let total = bid_depth + ask_depth;
        if total == 0.0 {
            return None;
        }
        Some((bid_depth - ask_depth) / total)
    }

    fn default_aggregator(&self) -> AggregatorKind {
        AggregatorKind::Last
    }
}

/// Delta-based, stateful: `qty_new - qty_prev` at the updated level,
/// optionally weighted by distance-from-mid (§4.8 "Feature signals").
pub struct OrderFlowImbalance {
    pub distance_weighted: bool,
    prev_qty: HashMap<(u8, i64), i64>,
}

impl OrderFlowImbalance {
    pub fn new(distance_weighted: bool) -> Self {
        Self {
            distance_weighted,
            prev_qty: HashMap::new(),
        }
    }

    fn key(side: Side, price: i64) -> (u8, i64) {
        (if matches!(side, Side::Bid) { 0 } else { 1 }, price)
    }
}

impl FeatureSignal for OrderFlowImbalance {
    fn name(&self) -> &str {
        "order_flow_imbalance"
    }

    fn on_update(&mut self, u: &BookUpdate, _before: &BookState, _after: &BookState, mid_price: Option<f64>) -> Option<f64> {
        let key = Self::key(u.side, u.price);
        let prev = self.prev_qty.get(&key).copied().unwrap_or(0);
        let delta = (u.qty - prev) as f64 * if matches!(u.side, Side::Bid) { 1.0 } else { -1.0 };
        if u.qty == 0 {
            self.prev_qty.remove(&key);
        } else {
            self.prev_qty.insert(key, u.qty);
        }

        if self.distance_weighted {
            let mid = mid_price?;
            if mid == 0.0 {
                return None;
            }
            let dist_bps = ((u.price as f64 - mid).abs() / mid) * 10_000.0;
            let weight = 1.0 / (1.0 + dist_bps);
            Some(delta * weight)
        } else {
            Some(delta)
        }
    }

    fn default_aggregator(&self) -> AggregatorKind {
        AggregatorKind::Sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::book::BookUpdate;

    fn upd(side: Side, price: i64, qty: i64) -> BookUpdate {
        BookUpdate {
            ts_event_us: 0,
            file_id: 1,
            file_seq: 1,
            side,
            price,
            qty,
            is_snapshot: false,
        }
    }

    #[test]
    fn mid_price_reports_book_mid() {
        let mut book = BookState::new();
        book.apply(&upd(Side::Bid, 100, 1));
        book.apply(&upd(Side::Ask, 110, 1));
        let mut feature = MidPrice;
        let value = feature.on_update(&upd(Side::Bid, 100, 1), &book, &book, book.mid_price_scaled().map(|v| v as f64));
        assert_eq!(value, Some(105.0));
    }

    #[test]
    fn order_flow_imbalance_sums_deltas() {
        let mut feature = OrderFlowImbalance::new(false);
        let mut book = BookState::new();
        book.apply(&upd(Side::Bid, 100, 5));
        let mut agg = new_aggregator(AggregatorKind::Sum);
        let d1 = feature.on_update(&upd(Side::Bid, 100, 5), &book, &book, None).unwrap();
        agg.push(d1);
        book.apply(&upd(Side::Bid, 100, 8));
        let d2 = feature.on_update(&upd(Side::Bid, 100, 8), &book, &book, None).unwrap();
        agg.push(d2);
        assert_eq!(agg.emit_and_reset(), 5.0 + 3.0);
    }
}
