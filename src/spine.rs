//! Spine & Alignment (C9, §4.9). A spine is an ordered sequence of reference
//! timestamps per `(venue, symbol)`; `align_to_spine` maps events onto it
//! forward-only, to avoid lookahead.

#[derive(Debug, Clone, Copy)]
pub struct ScaledEvent {
    pub ts_event_us: i64,
    pub price_scaled: i64,
    pub qty_scaled: i64,
}

/// Evenly spaced boundaries by `step_us`, starting at `start_ts_us`
/// (§4.9 "Clock").
pub fn clock_spine(start_ts_us: i64, end_ts_us: i64, step_us: i64) -> Vec<i64> {
    assert!(step_us > 0);
    let mut spine = Vec::new();
    let mut t = start_ts_us;
    while t <= end_ts_us {
        spine.push(t);
        t += step_us;
    }
    spine
}

/// One point per unique trade timestamp (§4.9 "Trades").
pub fn trade_spine(trade_ts_us: &[i64]) -> Vec<i64> {
    let mut spine: Vec<i64> = trade_ts_us.to_vec();
    spine.sort_unstable();
    spine.dedup();
    spine
}

/// One point each time cumulative traded quantity crosses `threshold_scaled`
/// (§4.9 "Volume").
pub fn volume_spine(events: &[ScaledEvent], threshold_scaled: i64) -> Vec<i64> {
    assert!(threshold_scaled > 0);
    let mut spine = Vec::new();
    let mut cumulative = 0i64;
    let mut next_threshold = threshold_scaled;
    for event in events {
        cumulative += event.qty_scaled;
        while cumulative >= next_threshold {
            spine.push(event.ts_event_us);
            next_threshold += threshold_scaled;
        }
    }
    spine
}

/// One point each time cumulative notional (`price_scaled * qty_scaled`)
/// crosses `threshold_scaled` (§4.9 "Dollar").
pub fn dollar_spine(events: &[ScaledEvent], threshold_scaled: i128) -> Vec<i64> {
    assert!(threshold_scaled > 0);
    let mut spine = Vec::new();
    let mut cumulative: i128 = 0;
    let mut next_threshold = threshold_scaled;
    for event in events {
        cumulative += event.price_scaled as i128 * event.qty_scaled as i128;
        while cumulative >= next_threshold {
            spine.push(event.ts_event_us);
            next_threshold += threshold_scaled;
        }
    }
    spine
}

/// Map each of `event_ts_us` to the next spine boundary `>= ts` (forward-only
/// as-of join, §4.9 "Forward-only to avoid lookahead"). `None` if an event is
/// after the last spine boundary.
pub fn align_to_spine(event_ts_us: &[i64], spine: &[i64]) -> Vec<Option<i64>> {
    event_ts_us
        .iter()
        .map(|&ts| spine.iter().copied().find(|&boundary| boundary >= ts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_spine_is_evenly_spaced() {
        let spine = clock_spine(0, 3_000, 1_000);
        assert_eq!(spine, vec![0, 1_000, 2_000, 3_000]);
    }

    #[test]
    fn trade_spine_dedupes_and_sorts() {
        let spine = trade_spine(&[300, 100, 100, 200]);
        assert_eq!(spine, vec![100, 200, 300]);
    }

    #[test]
    fn volume_spine_fires_on_threshold_crossings() {
        let events = vec![
            ScaledEvent { ts_event_us: 1, price_scaled: 1, qty_scaled: 6 },
            ScaledEvent { ts_event_us: 2, price_scaled: 1, qty_scaled: 6 },
        ];
        let spine = volume_spine(&events, 10);
        assert_eq!(spine, vec![1, 2]);
    }

    #[test]
    fn align_to_spine_is_forward_only() {
        let spine = vec![1_000, 2_000, 3_000];
        let events = vec![500, 1_000, 1_500, 3_500];
        let aligned = align_to_spine(&events, &spine);
        assert_eq!(aligned, vec![Some(1_000), Some(1_000), Some(2_000), None]);
    }
}
