//! Stages 4, 5, 9, 10 of the ingestion pipeline (§4.5): column canonicalization,
//! trading-date derivation, lineage assignment, and casting to the target
//! [`TableSpec`].

use chrono::TimeZone;
use chrono_tz::Tz;
use polars::prelude::*;

use crate::error::{PointlineResult, ValidationError};
use crate::schema::TableSpec;

/// Vendor-specific column renames and code-value normalizations (side codes,
/// order-type codes, `venue` lowercasing, and for the Chinese-equity venues,
/// the `YYYYMMDDHHMMSSmmm` local-wall-clock timestamp format their raw files
/// carry). Crypto parsers already emit true UTC epoch microseconds and
/// lowercase `venue`/`side` values, so for that vendor family canonicalization
/// is close to a no-op beyond defensive lowercasing.
pub fn canonicalize(df: DataFrame, vendor: &str, tz: Tz) -> PointlineResult<DataFrame> {
    let mut df = df;
    if df.column("side").is_ok() {
        let lowered: StringChunked = df
            .column("side")?
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_lowercase()))
            .collect();
        df.with_column(lowered.into_series().with_name("side".into()))?;
    }
    if matches!(vendor, "sse" | "szse") {
        df = convert_cst_wall_clock(df, tz)?;
    }
    Ok(df)
}

/// SSE and SZSE publish `ts_event_us` as their local-exchange wall-clock
/// timestamp packed as `YYYYMMDDHHMMSSmmm` (17 digits, milliseconds
/// resolution) rather than true epoch microseconds. Reinterpret it through
/// the venue's local timezone and overwrite the column with real UTC epoch
/// microseconds, so every downstream stage sees the same `ts_event_us`
/// contract regardless of vendor.
fn convert_cst_wall_clock(df: DataFrame, tz: Tz) -> PointlineResult<DataFrame> {
    let raw = df.column("ts_event_us")?.i64()?.clone();
    let mut converted: Vec<Option<i64>> = Vec::with_capacity(raw.len());
    for v in raw.into_iter() {
        let us = v.and_then(|packed| {
            let padded = format!("{packed:0>17}");
            chrono::NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M%S%3f")
                .ok()
                .and_then(|naive| tz.from_local_datetime(&naive).single())
                .map(|local| local.with_timezone(&chrono::Utc).timestamp_micros())
        });
        converted.push(us);
    }
    let mut df = df;
    df.with_column(Int64Chunked::from_iter(converted).into_series().with_name("ts_event_us".into()))?;
    Ok(df)
}

/// Derive `trading_date` from `ts_event_us` through the venue's local
/// timezone (§4.5 stage 5, §3.4). Rows whose timestamp can't be converted are
/// dropped from the count used for the bad-timestamp-share check; if the
/// share of such rows exceeds `max_bad_timestamp_share`, the whole file fails.
pub fn derive_trading_date(df: DataFrame, tz: Tz, max_bad_timestamp_share: f64) -> PointlineResult<DataFrame> {
    let ts = df.column("ts_event_us")?.i64()?;
    let total = ts.len();
    let mut dates: Vec<Option<i32>> = Vec::with_capacity(total);
    let mut bad = 0usize;
    let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();

    for v in ts.into_iter() {
        match v {
            Some(us) => {
                let utc = chrono::Utc.timestamp_micros(us).single();
                match utc {
                    Some(utc_dt) => {
                        let local = utc_dt.with_timezone(&tz);
                        let days = local.date_naive().signed_duration_since(epoch).num_days();
                        dates.push(Some(days as i32));
                    }
                    None => {
                        bad += 1;
                        dates.push(None);
                    }
                }
            }
            None => {
                bad += 1;
                dates.push(None);
            }
        }
    }

    let share = bad as f64 / total.max(1) as f64;
    if share > max_bad_timestamp_share {
        return Err(ValidationError::TimestampThresholdExceeded {
            table: "trading_date".to_string(),
            bad,
            total,
            threshold: max_bad_timestamp_share,
        }
        .into());
    }

    let mut df = df;
    let date_series = Int32Chunked::from_iter(dates).into_date().into_series().with_name("trading_date".into());
    df.with_column(date_series)?;
    df.lazy()
        .filter(col("trading_date").is_not_null())
        .collect()
        .map_err(Into::into)
}

/// Stamp `file_id` (constant) and `file_seq` (1-indexed, in current row
/// order) (§4.5 stage 9).
pub fn assign_lineage(df: DataFrame, file_id: i64) -> PointlineResult<DataFrame> {
    let mut df = df;
    let height = df.height();
    let file_id_col = Series::new("file_id".into(), vec![file_id; height]);
    let file_seq_col: Int64Chunked = Int64Chunked::from_iter((1..=height as i64).map(Some));
    df.with_column(file_id_col)?;
    df.with_column(file_seq_col.into_series().with_name("file_seq".into()))?;
    Ok(df)
}

/// Cast to the target spec's exact logical types, add missing nullable
/// columns as all-null, drop unknown columns, and reorder to spec order
/// (§4.5 stage 10).
pub fn normalize_to_spec(df: DataFrame, spec: &TableSpec) -> PointlineResult<DataFrame> {
    let mut df = df;
    for column in &spec.columns {
        if df.column(column.name).is_err() {
            if !column.nullable {
                return Err(ValidationError::SpecMismatch {
                    table: spec.name.to_string(),
                    reason: format!("missing required column '{}'", column.name),
                }
                .into());
            }
            let null_series = Series::full_null(column.name.into(), df.height(), &column.ty.to_polars());
            df.with_column(null_series)?;
        }
    }
    let ordered = df.select(spec.column_names())?;
    let mut casted = ordered;
    for column in &spec.columns {
        let target = column.ty.to_polars();
        if casted.column(column.name)?.dtype() != &target {
            let recast = casted.column(column.name)?.cast(&target)?;
            casted.with_column(recast)?;
        }
    }
    Ok(casted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_cst_wall_clock_converts_to_utc_epoch_micros() {
        // 2024-01-02 09:30:00.500 Asia/Shanghai (CST, UTC+8, no DST) is
        // 2024-01-02 01:30:00.500 UTC.
        let packed = 20240102093000500i64;
        let df = df! {
            "ts_event_us" => [packed],
        }
        .unwrap();

        let out = canonicalize(df, "sse", chrono_tz::Asia::Shanghai).unwrap();
        let got = out.column("ts_event_us").unwrap().i64().unwrap().get(0).unwrap();

        let expected = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(1, 30, 0, 500)
            .unwrap()
            .and_utc()
            .timestamp_micros();
        assert_eq!(got, expected);
    }

    #[test]
    fn crypto_vendor_leaves_ts_event_us_untouched() {
        let df = df! {
            "ts_event_us" => [1_700_000_000_000_000i64],
        }
        .unwrap();
        let out = canonicalize(df, "binance", chrono_tz::UTC).unwrap();
        assert_eq!(out.column("ts_event_us").unwrap().i64().unwrap().get(0).unwrap(), 1_700_000_000_000_000);
    }
}
