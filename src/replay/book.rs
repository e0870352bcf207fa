//! Order-book state (§4.8 "Book state"). Two ordered price→quantity maps —
//! [`std::collections::BTreeMap`] gives the O(log L) ordered mutation the
//! spec's complexity budget calls for, with `bids` read back-to-front for
//! descending order and `asks` front-to-back for ascending.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Side::Bid => 0,
            Side::Ask => 1,
        }
    }
}

/// One order-book incremental or snapshot row, already lineage-stamped and
/// tie-break sorted by the caller (§4.8 "Ordering").
#[derive(Debug, Clone, Copy)]
pub struct BookUpdate {
    pub ts_event_us: i64,
    pub file_id: i64,
    pub file_seq: i64,
    pub side: Side,
    pub price: i64,
    pub qty: i64,
    pub is_snapshot: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BookState {
    bids: BTreeMap<i64, i64>,
    asks: BTreeMap<i64, i64>,
    last_was_snapshot: [bool; 2],
    crossed_book_count: u64,
}

impl BookState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_bid(&self) -> Option<(i64, i64)> {
        self.bids.iter().next_back().map(|(p, q)| (*p, *q))
    }

    pub fn best_ask(&self) -> Option<(i64, i64)> {
        self.asks.iter().next().map(|(p, q)| (*p, *q))
    }

    pub fn mid_price_scaled(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / 2),
            _ => None,
        }
    }

    pub fn spread_scaled(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    pub fn crossed_book_count(&self) -> u64 {
        self.crossed_book_count
    }

    fn side_map(&mut self, side: Side) -> &mut BTreeMap<i64, i64> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Levels on `side`, nearest-to-touch first, up to `depth` entries
    /// (used by depth-weighted features, §4.8 "accept a cutoff").
    pub fn levels(&self, side: Side, depth: usize) -> Vec<(i64, i64)> {
        match side {
            Side::Bid => self.bids.iter().rev().take(depth).map(|(p, q)| (*p, *q)).collect(),
            Side::Ask => self.asks.iter().take(depth).map(|(p, q)| (*p, *q)).collect(),
        }
    }

    /// Apply one update in place. Returns whether this update triggered a
    /// side reset (§4.8 "A snapshot that arrives mid-window resets the side;
    /// features... are flagged with a `book_reset` bit").
    pub fn apply(&mut self, update: &BookUpdate) -> bool {
        let idx = update.side.index();
        let mut reset = false;

        if update.is_snapshot && !self.last_was_snapshot[idx] {
            self.side_map(update.side).clear();
            reset = true;
        }

        if update.qty == 0 {
            self.side_map(update.side).remove(&update.price);
        } else {
            self.side_map(update.side).insert(update.price, update.qty);
        }

        self.last_was_snapshot[idx] = update.is_snapshot;

        if self.is_crossed() {
            self.crossed_book_count += 1;
        }

        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upd(side: Side, price: i64, qty: i64, is_snapshot: bool) -> BookUpdate {
        BookUpdate {
            ts_event_us: 0,
            file_id: 1,
            file_seq: 1,
            side,
            price,
            qty,
            is_snapshot,
        }
    }

    #[test]
    fn qty_zero_removes_level() {
        let mut book = BookState::new();
        book.apply(&upd(Side::Bid, 100, 5, false));
        assert_eq!(book.best_bid(), Some((100, 5)));
        book.apply(&upd(Side::Bid, 100, 0, false));
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn snapshot_resets_only_its_own_side() {
        let mut book = BookState::new();
        book.apply(&upd(Side::Bid, 100, 5, false));
        book.apply(&upd(Side::Ask, 110, 3, false));
        assert!(book.apply(&upd(Side::Bid, 99, 1, true)));
        // bid side reset to just the snapshot row; ask side untouched.
        assert_eq!(book.best_bid(), Some((99, 1)));
        assert_eq!(book.best_ask(), Some((110, 3)));
    }

    #[test]
    fn repeated_snapshot_rows_in_same_burst_do_not_reset_again() {
        let mut book = BookState::new();
        assert!(book.apply(&upd(Side::Bid, 100, 1, true)));
        assert!(!book.apply(&upd(Side::Bid, 99, 1, true)));
        assert_eq!(book.levels(Side::Bid, 10).len(), 2);
    }

    #[test]
    fn crossed_book_is_flagged_and_counted_not_dropped() {
        let mut book = BookState::new();
        book.apply(&upd(Side::Bid, 100, 1, false));
        book.apply(&upd(Side::Ask, 90, 1, false));
        assert!(book.is_crossed());
        assert_eq!(book.crossed_book_count(), 1);
    }

    #[test]
    fn best_bid_and_ask_ordering() {
        let mut book = BookState::new();
        book.apply(&upd(Side::Bid, 100, 1, false));
        book.apply(&upd(Side::Bid, 101, 1, false));
        book.apply(&upd(Side::Ask, 105, 1, false));
        book.apply(&upd(Side::Ask, 104, 1, false));
        assert_eq!(book.best_bid(), Some((101, 1)));
        assert_eq!(book.best_ask(), Some((104, 1)));
    }
}
