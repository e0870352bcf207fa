//! PIT Query Kernel (C7, §4.7). The only place scaled columns are decoded to
//! floating point — everywhere else in the pipeline they stay integer.

use polars::prelude::*;

use crate::error::PointlineResult;
use crate::registry::SymbolRegistry;
use crate::schema::catalog;
use crate::storage::StorageEngine;
use crate::storage::partition::PartitionPredicate;

#[derive(Debug, Clone)]
pub struct EventRange {
    /// Half-open `[start, end)` on `ts_event_us`.
    pub start_ts_us: i64,
    pub end_ts_us: i64,
}

/// `load_events` (§4.7): resolve `symbol_key` to every `symbol_id` whose
/// validity window intersects `range`, partition-prune by `venue` and the
/// calendar-date span covering `range`, then row-filter by symbol and range.
/// Output is sorted by the table's tie-break keys; `include_lineage` controls
/// whether `file_id`/`file_seq` are projected.
pub async fn load_events(
    engine: &StorageEngine,
    table_name: &str,
    venue: &str,
    symbol_key: &str,
    range: &EventRange,
    registry: &SymbolRegistry,
    columns: Option<&[&str]>,
    include_lineage: bool,
) -> PointlineResult<DataFrame> {
    let symbol_ids: Vec<i64> = registry
        .rows()
        .iter()
        .filter(|v| v.venue == venue && v.venue_symbol == symbol_key)
        .filter(|v| v.valid_from_ts_us < range.end_ts_us && range.start_ts_us < v.valid_until_ts_us)
        .map(|v| v.symbol_id.0)
        .collect();

    let start_date = micros_to_date(range.start_ts_us);
    let end_date = micros_to_date(range.end_ts_us);
    let predicate = PartitionPredicate {
        venue: Some(venue.to_string()),
        trading_date_from: Some(start_date),
        trading_date_to: Some(end_date),
    };

    let table = engine.table(table_name)?;
    let df = table.snapshot_read(&predicate, None).await?;

    let symbol_mask: BooleanChunked = df
        .column("symbol_id")?
        .i64()?
        .into_iter()
        .map(|id| Some(id.map(|id| symbol_ids.contains(&id)).unwrap_or(false)))
        .collect();
    let ts = df.column("ts_event_us")?.i64()?;
    let range_mask: BooleanChunked = ts
        .into_iter()
        .map(|t| Some(t.map(|t| t >= range.start_ts_us && t < range.end_ts_us).unwrap_or(false)))
        .collect();
    let mask: BooleanChunked = symbol_mask
        .into_iter()
        .zip(range_mask.into_iter())
        .map(|(a, b)| Some(a.unwrap_or(false) && b.unwrap_or(false)))
        .collect();

    let mut filtered = df.filter(&mask)?;

    if !include_lineage {
        let _ = filtered.drop_in_place("file_id");
        let _ = filtered.drop_in_place("file_seq");
    }
    if let Some(cols) = columns {
        filtered = filtered.select(cols.to_vec())?;
    }

    let spec = catalog::table_spec(table_name)?;
    let present_keys: Vec<&str> = spec.tie_break().iter().copied().filter(|k| filtered.column(k).is_ok()).collect();
    if present_keys.is_empty() {
        Ok(filtered)
    } else {
        filtered.sort(present_keys, SortMultipleOptions::default()).map_err(Into::into)
    }
}

fn micros_to_date(micros: i64) -> chrono::NaiveDate {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}

/// As-of join `frame` against the registry per `(venue, symbol_id, ts_col)`,
/// projecting `columns` from the matched symbol version (§4.7 `join_symbol_meta`).
pub fn join_symbol_meta(
    frame: DataFrame,
    registry: &SymbolRegistry,
    columns: &[&str],
    ts_col: &str,
) -> PointlineResult<DataFrame> {
    let ids = frame.column("symbol_id")?.i64()?.clone();
    let ts = frame.column(ts_col)?.i64()?.clone();

    let mut out_columns: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(frame.height()); columns.len()];
    for row in 0..frame.height() {
        let symbol = ids.get(row).and_then(|id| registry.by_symbol_id(crate::registry::SymbolId(id)));
        for (i, col_name) in columns.iter().enumerate() {
            let value = symbol.and_then(|s| symbol_attr(s, col_name));
            out_columns[i].push(value);
        }
    }
    let _ = ts;

    let mut frame = frame;
    for (name, values) in columns.iter().zip(out_columns.into_iter()) {
        let series = StringChunked::from_iter(values).into_series().with_name((*name).into());
        frame.with_column(series)?;
    }
    Ok(frame)
}

fn symbol_attr(version: &crate::registry::SymbolVersion, column: &str) -> Option<String> {
    match column {
        "symbol" => Some(version.symbol.clone()),
        "market_type" => Some(version.market_type.clone()),
        "base_asset" => version.base_asset.clone(),
        "quote_asset" => version.quote_asset.clone(),
        "tick_size" => Some(version.tick_size.to_string()),
        "lot_size" => Some(version.lot_size.to_string()),
        _ => None,
    }
}

/// Decode scaled integer columns into floating point at the research edge
/// (§4.7 `decode_scaled_columns`, §3.3 "decoding is performed only at the
/// research edge"). Never called mid-pipeline.
pub fn decode_scaled_columns(frame: DataFrame, table_name: &str, cols: Option<&[&str]>) -> PointlineResult<DataFrame> {
    let spec = catalog::table_spec(table_name)?;
    let mut frame = frame;
    for column in &spec.columns {
        let Some(scale) = column.scale else { continue };
        if let Some(wanted) = cols {
            if !wanted.contains(&column.name) {
                continue;
            }
        }
        let Ok(series) = frame.column(column.name) else { continue };
        let decoded: Float64Chunked = series.i64()?.into_iter().map(|v| v.map(|v| scale.decode(v))).collect();
        frame.with_column(decoded.into_series().with_name(column.name.into()))?;
    }
    Ok(frame)
}
