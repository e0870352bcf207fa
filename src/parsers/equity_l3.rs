//! Chinese-equity L3 parser (§4.4): per-symbol CSV, one file per
//! `(venue, venue_symbol, trading_date)`, with the symbol lifted out of the
//! filename rather than carried as a column — SSE and SZSE both publish this
//! way, differing only in their event vocabulary (order events vs. tick
//! events) and the venue-specific validation rules applied downstream (§4.5
//! stage 7).

use std::io::Cursor;

use polars::prelude::*;
use regex::Regex;

use crate::error::{ParseError, PointlineResult};
use crate::schema::Scale;

use super::{FileMeta, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquityVenue {
    Sse,
    Szse,
}

impl EquityVenue {
    fn name(self) -> &'static str {
        match self {
            EquityVenue::Sse => "sse",
            EquityVenue::Szse => "szse",
        }
    }

    /// SSE ships order-add/cancel events; SZSE ships executed-tick events
    /// (§3.1 "L3 order events" vs "L3 tick events").
    fn target_table(self) -> &'static str {
        match self {
            EquityVenue::Sse => "l3_order_events",
            EquityVenue::Szse => "l3_tick_events",
        }
    }
}

pub struct EquityL3Parser {
    venue: EquityVenue,
    symbol_pattern: Regex,
}

impl EquityL3Parser {
    pub fn sse() -> Self {
        Self {
            venue: EquityVenue::Sse,
            symbol_pattern: Regex::new(r"(\d{6})").unwrap(),
        }
    }

    pub fn szse() -> Self {
        Self {
            venue: EquityVenue::Szse,
            symbol_pattern: Regex::new(r"(\d{6})").unwrap(),
        }
    }

    /// Lift the 6-digit venue symbol out of the filename (§4.4 "the parser
    /// lifts it into a row column").
    fn symbol_from_filename(&self, file: &FileMeta) -> PointlineResult<String> {
        let file_name = file.raw_path.rsplit('/').next().unwrap_or(&file.raw_path);
        self.symbol_pattern
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                ParseError::SymbolFromFilename {
                    filename: file_name.to_string(),
                }
                .into()
            })
    }

    fn read_csv(&self, file: &FileMeta) -> PointlineResult<DataFrame> {
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

    fn scale_nullable(&self, df: &DataFrame, name: &str) -> PointlineResult<Series> {
        let floats = df.column(name)?.f64()?;
        let scaled: Int64Chunked = floats
            .into_iter()
            .map(|v| v.and_then(|v| Scale::CN_EQUITY_TICK.encode(v)))
            .collect();
        Ok(scaled.into_series().with_name(name.into()))
    }
}

impl Parser for EquityL3Parser {
    fn target_table(&self) -> &'static str {
        self.venue.target_table()
    }

    fn parse(&self, file: &FileMeta) -> PointlineResult<DataFrame> {
        let venue_symbol = self.symbol_from_filename(file)?;
        let df = self.read_csv(file)?;

        let required = match self.venue {
            EquityVenue::Sse => vec!["ts_event_us", "appl_seq_num", "channel_no", "side", "order_type", "event_kind", "qty"],
            EquityVenue::Szse => vec!["ts_event_us", "appl_seq_num", "channel_no", "exec_type", "qty"],
        };
        for col in &required {
            if df.column(col).is_err() {
                return Err(ParseError::MissingColumn {
                    path: file.raw_path.clone(),
                    column: col.to_string(),
                }
                .into());
            }
        }

        let venue = Series::new("venue".into(), vec![self.venue.name(); df.height()]);
        let venue_symbol_col = Series::new("venue_symbol".into(), vec![venue_symbol; df.height()]);
        let qty = self.scale_nullable(&df, "qty")?;

        let mut out = df.clone();
        out.with_column(venue)?;
        out.with_column(venue_symbol_col)?;
        out.with_column(qty)?;
        if df.column("price").is_ok() {
            let price = self.scale_nullable(&df, "price")?;
            out.with_column(price)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, csv: &str) -> FileMeta {
        FileMeta {
            vendor: "sse".to_string(),
            data_type: "l3".to_string(),
            raw_path: format!("sse/l3/2024-01-01/{name}"),
            content_hash: "abc".to_string(),
            bytes: csv.as_bytes().to_vec(),
        }
    }

    #[test]
    fn lifts_symbol_from_filename() {
        let csv = "ts_event_us,appl_seq_num,channel_no,side,order_type,event_kind,price,qty\n1000,1,1,bid,limit,ADD,10.50,100\n";
        let parser = EquityL3Parser::sse();
        let f = file("600519_20240101.csv", csv);
        let df = parser.parse(&f).unwrap();
        let symbol = df.column("venue_symbol").unwrap().str().unwrap().get(0).unwrap();
        assert_eq!(symbol, "600519");
    }

    #[test]
    fn unresolvable_symbol_fails_fast() {
        let csv = "ts_event_us,appl_seq_num,channel_no,side,order_type,event_kind,price,qty\n1000,1,1,bid,limit,ADD,10.50,100\n";
        let parser = EquityL3Parser::sse();
        let f = file("no-digits-here.csv", csv);
        assert!(parser.parse(&f).is_err());
    }
}
