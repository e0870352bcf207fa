//! S3: an incremental row with `qty == 0` removes the price level entirely.

use pointline::replay::book::{BookState, BookUpdate, Side};

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
fn zero_qty_removes_the_level() {
    let mut book = BookState::new();
    book.apply(&upd(10, Side::Ask, 200, 4));
    assert_eq!(book.best_ask(), Some((200, 4)));

    book.apply(&upd(20, Side::Ask, 200, 0));
    assert_eq!(book.best_ask(), None);
    assert!(book.levels(Side::Ask, 10).is_empty());
}
