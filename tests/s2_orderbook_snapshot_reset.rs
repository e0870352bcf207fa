//! S2: a snapshot row following incrementals resets that side to exactly the
//! snapshot's own levels.

use pointline::replay::book::{BookState, BookUpdate, Side};

fn upd(ts: i64, side: Side, price: i64, qty: i64, is_snapshot: bool) -> BookUpdate {
    BookUpdate {
        ts_event_us: ts,
        file_id: 1,
        file_seq: ts,
        side,
        price,
        qty,
        is_snapshot,
    }
}

#[test]
fn snapshot_collapses_bid_side_to_single_level() {
    let mut book = BookState::new();
    book.apply(&upd(10, Side::Bid, 100, 5, false));
    book.apply(&upd(20, Side::Bid, 100, 3, false));
    book.apply(&upd(30, Side::Bid, 100, 7, true));

    assert_eq!(book.best_bid(), Some((100, 7)));
    assert_eq!(book.levels(Side::Bid, 10).len(), 1);
}
