//! Binance-style crypto CSV parsers: trades and order-book incrementals
//! (§4.4). Both are columnar CSVs with a header row; `ts_event_us` is the
//! vendor's own microsecond timestamp, already UTC — no zone conversion
//! happens here, only in the ingestion pipeline's `trading_date` derivation.

use std::io::Cursor;

use polars::prelude::*;

use crate::error::{ParseError, PointlineResult};
use crate::schema::Scale;

use super::{FileMeta, Parser};

fn read_csv(file: &FileMeta) -> PointlineResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(file.bytes.clone()))
        .finish()
        .map_err(|e| {
            ParseError::UnreadableFile {
                path: file.raw_path.clone(),
                reason: e.to_string(),
            }
            .into()
        })
}

fn require_columns(df: &DataFrame, file: &FileMeta, names: &[&str]) -> PointlineResult<()> {
    for name in names {
        if df.column(name).is_err() {
            return Err(ParseError::MissingColumn {
                path: file.raw_path.clone(),
                column: name.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

fn scale_column(df: &DataFrame, name: &str) -> PointlineResult<Series> {
    let floats = df.column(name)?.f64()?;
    let scaled: Int64Chunked = floats
        .into_iter()
        .map(|v| v.and_then(|v| Scale::CRYPTO.encode(v)))
        .collect();
    Ok(scaled.into_series().with_name(name.into()))
}

/// `binance/trades`-style CSV: `venue, venue_symbol, ts_event_us, side, price, qty, trade_id`.
pub struct CryptoTradesParser;

impl Parser for CryptoTradesParser {
    fn target_table(&self) -> &'static str {
        "trades"
    }

    fn parse(&self, file: &FileMeta) -> PointlineResult<DataFrame> {
        let df = read_csv(file)?;
        require_columns(
            &df,
            file,
            &["venue_symbol", "ts_event_us", "side", "price", "qty"],
        )?;

        let venue = Series::new("venue".into(), vec![file.vendor.clone(); df.height()]);
        let price = scale_column(&df, "price")?;
        let qty = scale_column(&df, "qty")?;

        let mut out = df.select(["venue_symbol", "ts_event_us", "side"])?;
        out.with_column(venue)?;
        out.with_column(price)?;
        out.with_column(qty)?;
        if df.column("trade_id").is_ok() {
            out.with_column(df.column("trade_id")?.clone())?;
        }
        Ok(out)
    }
}

/// `binance/orderbook`-style incremental CSV:
/// `venue_symbol, ts_event_us, is_snapshot, side, price, qty`.
pub struct CryptoOrderbookParser;

impl Parser for CryptoOrderbookParser {
    fn target_table(&self) -> &'static str {
        "orderbook_updates"
    }

    fn parse(&self, file: &FileMeta) -> PointlineResult<DataFrame> {
        let df = read_csv(file)?;
        require_columns(
            &df,
            file,
            &["venue_symbol", "ts_event_us", "is_snapshot", "side", "price", "qty"],
        )?;

        let venue = Series::new("venue".into(), vec![file.vendor.clone(); df.height()]);
        let price = scale_column(&df, "price")?;
        let qty = scale_column(&df, "qty")?;

        let mut out = df.select(["venue_symbol", "ts_event_us", "is_snapshot", "side"])?;
        out.with_column(venue)?;
        out.with_column(price)?;
        out.with_column(qty)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(vendor: &str, csv: &str) -> FileMeta {
        FileMeta {
            vendor: vendor.to_string(),
            data_type: "trades".to_string(),
            raw_path: "binance/trades/2024-01-01/a.csv".to_string(),
            content_hash: "abc".to_string(),
            bytes: csv.as_bytes().to_vec(),
        }
    }

    #[test]
    fn parses_and_scales_trades() {
        let csv = "venue_symbol,ts_event_us,side,price,qty,trade_id\nBTCUSDT,1000,buy,42000.5,0.01,t1\n";
        let file = csv_file("binance", csv);
        let parser = CryptoTradesParser;
        let df = parser.parse(&file).unwrap();
        assert_eq!(df.height(), 1);
        let price = df.column("price").unwrap().i64().unwrap().get(0).unwrap();
        assert_eq!(price, 42_000_500_000_000);
    }

    #[test]
    fn missing_column_fails_fast() {
        let csv = "venue_symbol,ts_event_us\nBTCUSDT,1000\n";
        let file = csv_file("binance", csv);
        let parser = CryptoTradesParser;
        assert!(parser.parse(&file).is_err());
    }
}
