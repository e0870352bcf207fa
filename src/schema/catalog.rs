//! The closed table catalog (§4.1). Resolves Open Question 1 from the design
//! notes: rather than re-deriving per-vendor schemas scattered through the
//! original system, every canonical table is declared once, here.

use std::sync::OnceLock;

use crate::error::{NotFoundError, PointlineResult};

use super::{ColumnSpec, LogicalType::*, Scale, TableSpec};

const LINEAGE: [&str; 2] = ["file_id", "file_seq"];

fn common_event_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("venue", Utf8, false),
        ColumnSpec::new("venue_id", U32, false),
        ColumnSpec::new("symbol_id", I64, false),
        ColumnSpec::new("ts_event_us", I64, false),
        ColumnSpec::new("trading_date", Date, false),
        ColumnSpec::new("file_id", I64, false),
        ColumnSpec::new("file_seq", I64, false),
    ]
}

fn event_tie_break() -> Vec<&'static str> {
    vec!["ts_event_us", "file_id", "file_seq"]
}

fn event_partition() -> Vec<&'static str> {
    vec!["venue", "trading_date"]
}

fn trades() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::new("side", Utf8, false),
        ColumnSpec::scaled("price", false, Scale::CRYPTO),
        ColumnSpec::scaled("qty", false, Scale::CRYPTO),
        ColumnSpec::new("trade_id", Utf8, true),
    ]);
    TableSpec {
        name: "trades",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn orderbook_updates() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::new("is_snapshot", Bool, false),
        ColumnSpec::new("side", Utf8, false),
        ColumnSpec::scaled("price", false, Scale::CRYPTO),
        ColumnSpec::scaled("qty", false, Scale::CRYPTO),
    ]);
    TableSpec {
        name: "orderbook_updates",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn quotes() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::scaled("bid_price", false, Scale::CRYPTO),
        ColumnSpec::scaled("bid_qty", false, Scale::CRYPTO),
        ColumnSpec::scaled("ask_price", false, Scale::CRYPTO),
        ColumnSpec::scaled("ask_qty", false, Scale::CRYPTO),
    ]);
    TableSpec {
        name: "quotes",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn derivative_ticker() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::scaled("mark", false, Scale::CRYPTO),
        ColumnSpec::scaled("index", false, Scale::CRYPTO),
        ColumnSpec::scaled("funding_rate", true, Scale::CRYPTO),
        ColumnSpec::new("next_funding_ts_us", I64, true),
        ColumnSpec::scaled("open_interest", true, Scale::CRYPTO),
    ]);
    TableSpec {
        name: "derivative_ticker",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn l3_order_events() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::new("appl_seq_num", I64, false),
        ColumnSpec::new("channel_no", U32, false),
        ColumnSpec::new("side", Utf8, false),
        ColumnSpec::new("order_type", Utf8, false),
        ColumnSpec::new("event_kind", Utf8, false),
        ColumnSpec::scaled("price", true, Scale::CN_EQUITY_TICK),
        ColumnSpec::scaled("qty", false, Scale::CN_EQUITY_TICK),
    ]);
    TableSpec {
        name: "l3_order_events",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn l3_tick_events() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::new("appl_seq_num", I64, false),
        ColumnSpec::new("channel_no", U32, false),
        ColumnSpec::new("bid_ref", I64, true),
        ColumnSpec::new("ask_ref", I64, true),
        ColumnSpec::new("exec_type", Utf8, false),
        ColumnSpec::scaled("price", true, Scale::CN_EQUITY_TICK),
        ColumnSpec::scaled("qty", false, Scale::CN_EQUITY_TICK),
    ]);
    TableSpec {
        name: "l3_tick_events",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn liquidations() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::new("side", Utf8, false),
        ColumnSpec::scaled("price", false, Scale::CRYPTO),
        ColumnSpec::scaled("qty", false, Scale::CRYPTO),
    ]);
    TableSpec {
        name: "liquidations",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn options_chain() -> TableSpec {
    let mut columns = common_event_columns();
    columns.extend([
        ColumnSpec::new("underlying_symbol_id", I64, false),
        ColumnSpec::scaled("strike", false, Scale::CRYPTO),
        ColumnSpec::new("expiry_ts_us", I64, false),
        ColumnSpec::new("option_kind", Utf8, false),
        ColumnSpec::scaled("bid_price", true, Scale::CRYPTO),
        ColumnSpec::scaled("ask_price", true, Scale::CRYPTO),
        ColumnSpec::new("iv", F64, true),
    ]);
    TableSpec {
        name: "options_chain",
        columns,
        partition_columns: event_partition(),
        tie_break_keys: event_tie_break(),
    }
}

fn features() -> TableSpec {
    TableSpec {
        name: "features",
        columns: vec![
            ColumnSpec::new("venue", Utf8, false),
            ColumnSpec::new("symbol_id", I64, false),
            ColumnSpec::new("trading_date", Date, false),
            ColumnSpec::new("window_start_ts_us", I64, false),
            ColumnSpec::new("window_end_ts_us", I64, false),
            ColumnSpec::new("feature_name", Utf8, false),
            ColumnSpec::new("value", F64, true),
            ColumnSpec::new("book_reset", Bool, false),
            ColumnSpec::new("crossed_book_count", I64, false),
        ],
        partition_columns: event_partition(),
        tie_break_keys: vec!["window_end_ts_us", "symbol_id", "feature_name"],
    }
}

fn symbol_registry() -> TableSpec {
    TableSpec {
        name: "symbol_registry",
        columns: vec![
            ColumnSpec::new("venue", Utf8, false),
            ColumnSpec::new("venue_symbol", Utf8, false),
            ColumnSpec::new("symbol", Utf8, false),
            ColumnSpec::new("market_type", Utf8, false),
            ColumnSpec::new("base_asset", Utf8, true),
            ColumnSpec::new("quote_asset", Utf8, true),
            ColumnSpec::scaled("tick_size", false, Scale::CRYPTO),
            ColumnSpec::scaled("lot_size", false, Scale::CRYPTO),
            ColumnSpec::scaled("contract_size", true, Scale::CRYPTO),
            ColumnSpec::new("valid_from_ts_us", I64, false),
            ColumnSpec::new("valid_until_ts_us", I64, false),
            ColumnSpec::new("is_current", Bool, false),
            ColumnSpec::new("symbol_id", I64, false),
        ],
        partition_columns: vec![],
        tie_break_keys: vec!["venue", "venue_symbol", "valid_from_ts_us"],
    }
}

fn manifest() -> TableSpec {
    TableSpec {
        name: "manifest",
        columns: vec![
            ColumnSpec::new("vendor", Utf8, false),
            ColumnSpec::new("data_type", Utf8, false),
            ColumnSpec::new("raw_path", Utf8, false),
            ColumnSpec::new("content_hash", Utf8, false),
            ColumnSpec::new("file_id", I64, false),
            ColumnSpec::new("state", Utf8, false),
            ColumnSpec::new("rows_total", I64, true),
            ColumnSpec::new("rows_written", I64, true),
            ColumnSpec::new("rows_quarantined", I64, true),
            ColumnSpec::new("ingested_at_ts_us", I64, false),
            ColumnSpec::new("status_reason", Utf8, true),
        ],
        partition_columns: vec![],
        tie_break_keys: vec!["file_id"],
    }
}

fn quarantine() -> TableSpec {
    TableSpec {
        name: "quarantine",
        columns: vec![
            ColumnSpec::new("logged_at_ts_us", I64, false),
            ColumnSpec::new("file_id", I64, false),
            ColumnSpec::new("file_seq", I64, true),
            ColumnSpec::new("table", Utf8, false),
            ColumnSpec::new("rule", Utf8, false),
            ColumnSpec::new("severity", Utf8, false),
            ColumnSpec::new("field", Utf8, true),
            ColumnSpec::new("value", Utf8, true),
            ColumnSpec::new("ts_event_us", I64, true),
            ColumnSpec::new("venue", Utf8, true),
            ColumnSpec::new("venue_symbol", Utf8, true),
            ColumnSpec::new("message", Utf8, false),
        ],
        partition_columns: vec![],
        tie_break_keys: LINEAGE.to_vec(),
    }
}

fn build_catalog() -> Vec<TableSpec> {
    vec![
        trades(),
        orderbook_updates(),
        quotes(),
        derivative_ticker(),
        l3_order_events(),
        l3_tick_events(),
        liquidations(),
        options_chain(),
        features(),
        symbol_registry(),
        manifest(),
        quarantine(),
    ]
}

static CATALOG: OnceLock<Vec<TableSpec>> = OnceLock::new();

/// All event-table names, i.e. every table partitioned by `(venue,
/// trading_date)` and therefore subject to ingestion/PIT-replay.
pub fn event_table_names() -> Vec<&'static str> {
    CATALOG
        .get_or_init(build_catalog)
        .iter()
        .filter(|t| t.is_partitioned())
        .map(|t| t.name)
        .collect()
}

pub fn table_spec(name: &str) -> PointlineResult<&'static TableSpec> {
    CATALOG
        .get_or_init(build_catalog)
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| NotFoundError::Table(name.to_string()).into())
}

pub fn all_table_names() -> Vec<&'static str> {
    CATALOG.get_or_init(build_catalog).iter().map(|t| t.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_closed_and_lookup_works() {
        assert!(table_spec("trades").is_ok());
        assert!(table_spec("orderbook_updates").is_ok());
        assert!(table_spec("not-a-table").is_err());
    }

    #[test]
    fn event_tables_all_share_tie_break_shape() {
        for name in event_table_names() {
            let spec = table_spec(name).unwrap();
            assert_eq!(spec.partition_columns, vec!["venue", "trading_date"]);
            assert!(spec.tie_break_keys.len() >= 2);
        }
    }

    #[test]
    fn lineage_columns_present_on_every_event_table() {
        for name in event_table_names() {
            let spec = table_spec(name).unwrap();
            assert!(spec.column("file_id").is_some());
            assert!(spec.column("file_seq").is_some());
        }
    }
}
