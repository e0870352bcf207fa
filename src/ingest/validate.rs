//! Stages 6, 7, 8 of the ingestion pipeline (§4.5): generic validation,
//! venue-specific validation, and PIT coverage. Every rejected row is routed
//! to quarantine with a rule identifier rather than dropped silently.

use polars::prelude::*;

use crate::error::PointlineResult;
use crate::manifest::QuarantineRecord;
use crate::registry::SymbolRegistry;
use crate::schema::TableSpec;

fn to_quarantine(df: &DataFrame, table: &str, rule: &str, file_id: i64, now_ts_us: i64) -> PointlineResult<Vec<QuarantineRecord>> {
    let venue = df.column("venue").ok().and_then(|c| c.str().ok().map(|c| c.clone()));
    let ts = df.column("ts_event_us").ok().and_then(|c| c.i64().ok().map(|c| c.clone()));
    let file_seq = df.column("file_seq").ok().and_then(|c| c.i64().ok().map(|c| c.clone()));
    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        records.push(QuarantineRecord {
            logged_at_ts_us: now_ts_us,
            file_id,
            file_seq: file_seq.as_ref().and_then(|c| c.get(row)),
            table: table.to_string(),
            rule: rule.to_string(),
            severity: "reject".to_string(),
            field: None,
            value: None,
            ts_event_us: ts.as_ref().and_then(|c| c.get(row)),
            venue: venue.as_ref().and_then(|c| c.get(row)).map(str::to_string),
            venue_symbol: df
                .column("venue_symbol")
                .ok()
                .and_then(|c| c.str().ok())
                .and_then(|c| c.get(row))
                .map(str::to_string),
            message: format!("row rejected by rule '{rule}'"),
        });
    }
    Ok(records)
}

/// Table-specific predicate checks from §3.1 (e.g. `bid_price < ask_price`
/// for quotes, non-negative quantities everywhere). Splits `df` into
/// `(valid, quarantine_records)`.
pub fn validate_generic(df: DataFrame, spec: &TableSpec, file_id: i64, now_ts_us: i64) -> PointlineResult<(DataFrame, Vec<QuarantineRecord>)> {
    let mut mask = BooleanChunked::from_iter(std::iter::repeat(Some(true)).take(df.height()));

    if let (Ok(bid), Ok(ask)) = (df.column("bid_price"), df.column("ask_price")) {
        let ok: BooleanChunked = bid
            .i64()?
            .into_iter()
            .zip(ask.i64()?.into_iter())
            .map(|(b, a)| match (b, a) {
                (Some(b), Some(a)) => Some(b < a),
                _ => Some(false),
            })
            .collect();
        mask = mask.into_iter().zip(ok.into_iter()).map(|(m, o)| Some(m.unwrap_or(true) && o.unwrap_or(false))).collect();
    }

    if let Ok(qty) = df.column("qty") {
        let ok: BooleanChunked = qty.i64()?.into_iter().map(|v| Some(v.map(|v| v >= 0).unwrap_or(false))).collect();
        mask = mask.into_iter().zip(ok.into_iter()).map(|(m, o)| Some(m.unwrap_or(true) && o.unwrap_or(false))).collect();
    }

    let valid = df.filter(&mask)?;
    let invalid = df.filter(&!&mask)?;
    let rejects = to_quarantine(&invalid, spec.name, "generic_predicate", file_id, now_ts_us)?;
    Ok((valid, rejects))
}

/// Extra rules for certain venues (§4.5 stage 7): SSE L3 requires non-null
/// `channel_no`/`appl_seq_num`; SZSE L3 requires per-channel sequence
/// continuity (checked here as strict monotonicity within the file, which is
/// what "continuity" reduces to for a single append batch).
pub fn validate_venue_specific(df: DataFrame, venue: &str, file_id: i64, now_ts_us: i64) -> PointlineResult<(DataFrame, Vec<QuarantineRecord>)> {
    match venue {
        "sse" => {
            let mask: BooleanChunked = match (df.column("channel_no"), df.column("appl_seq_num")) {
                (Ok(ch), Ok(seq)) => ch
                    .u32()
                    .ok()
                    .map(|ch| ch.into_iter().zip(seq.i64().unwrap().into_iter()).map(|(c, s)| Some(c.is_some() && s.is_some())).collect())
                    .unwrap_or_else(|| BooleanChunked::from_iter(std::iter::repeat(Some(true)).take(df.height()))),
                _ => BooleanChunked::from_iter(std::iter::repeat(Some(true)).take(df.height())),
            };
            let valid = df.filter(&mask)?;
            let invalid = df.filter(&!&mask)?;
            let rejects = to_quarantine(&invalid, "l3_order_events", "sse_missing_sequence_fields", file_id, now_ts_us)?;
            Ok((valid, rejects))
        }
        "szse" => {
            if let Ok(seq) = df.column("appl_seq_num") {
                let seq_values: Vec<Option<i64>> = seq.i64()?.into_iter().collect();
                let mut ok = vec![true; seq_values.len()];
                for window in seq_values.windows(2).enumerate() {
                    let (i, pair) = window;
                    if let (Some(a), Some(b)) = (pair[0], pair[1]) {
                        if b <= a {
                            ok[i + 1] = false;
                        }
                    }
                }
                let mask = BooleanChunked::from_iter(ok.into_iter().map(Some));
                let valid = df.filter(&mask)?;
                let invalid = df.filter(&!&mask)?;
                let rejects = to_quarantine(&invalid, "l3_tick_events", "szse_sequence_discontinuity", file_id, now_ts_us)?;
                return Ok((valid, rejects));
            }
            Ok((df, vec![]))
        }
        _ => Ok((df, vec![])),
    }
}

/// As-of join each row against the registry on `(venue, venue_symbol)`;
/// rows without a covering symbol version go to quarantine with reason
/// `no_symbol_version` (§4.5 stage 8).
pub fn join_symbol_coverage(
    df: DataFrame,
    registry: &SymbolRegistry,
    file_id: i64,
    now_ts_us: i64,
) -> PointlineResult<(DataFrame, Vec<QuarantineRecord>)> {
    let venue = df.column("venue")?.str()?.clone();
    let venue_symbol = df.column("venue_symbol")?.str()?.clone();
    let ts = df.column("ts_event_us")?.i64()?.clone();

    let mut symbol_ids: Vec<Option<i64>> = Vec::with_capacity(df.height());
    let mut covered = vec![true; df.height()];
    for row in 0..df.height() {
        let v = venue.get(row);
        let s = venue_symbol.get(row);
        let t = ts.get(row);
        match (v, s, t) {
            (Some(v), Some(s), Some(t)) => match registry.as_of(v, s, t) {
                Some(version) => symbol_ids.push(Some(version.symbol_id.0)),
                None => {
                    symbol_ids.push(None);
                    covered[row] = false;
                }
            },
            _ => {
                symbol_ids.push(None);
                covered[row] = false;
            }
        }
    }

    let mut with_symbol = df.clone();
    with_symbol.with_column(Int64Chunked::from_iter(symbol_ids).into_series().with_name("symbol_id".into()))?;

    let mask = BooleanChunked::from_iter(covered.into_iter().map(Some));
    let valid = with_symbol.filter(&mask)?;
    let invalid = with_symbol.filter(&!&mask)?;
    let rejects = to_quarantine(&invalid, "symbol_coverage", "no_symbol_version", file_id, now_ts_us)?;
    Ok((valid, rejects))
}
