//! Vendor Parsers (C4, §4.4).
//!
//! A [`Parser`] is a pure function from raw bytes to a [`polars::frame::DataFrame`].
//! It never assigns `file_id`, `file_seq`, `trading_date`, or `symbol_id` — those
//! are the ingestion pipeline's job (§4.5 stages 5 and 9). It fails fast on
//! anything that looks like schema drift rather than guessing.

pub mod crypto;
pub mod equity_l3;

use polars::prelude::DataFrame;

use crate::error::{ParseError, PointlineResult};

/// Identity of one raw file, as placed under `raw_root/<vendor>/<data_type>/<date>/<file>`
/// (§6 "Raw input layout").
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub vendor: String,
    pub data_type: String,
    pub raw_path: String,
    pub content_hash: String,
    pub bytes: Vec<u8>,
}

impl FileMeta {
    /// Build a `FileMeta` from freshly-read bytes, hashing `bytes` with
    /// `blake3` for `content_hash` (the idempotency ledger's dedup key, §4.5
    /// stage 2) rather than trusting a caller-supplied digest. `blake3` is
    /// this crate's bulk-content hash, chosen for throughput on whole-file
    /// buffers; the registry's `symbol_id` hash (§4.3) uses `blake2b`
    /// instead, for a short deterministic identity string rather than file
    /// content — distinct jobs, distinct BLAKE-family members.
    pub fn from_bytes(vendor: impl Into<String>, data_type: impl Into<String>, raw_path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_hash = blake3::hash(&bytes).to_hex().to_string();
        Self {
            vendor: vendor.into(),
            data_type: data_type.into(),
            raw_path: raw_path.into(),
            content_hash,
            bytes,
        }
    }
}

pub trait Parser: Send + Sync {
    /// The canonical table this parser's output targets, e.g. `"trades"`.
    fn target_table(&self) -> &'static str;

    /// Parse `file` into a frame whose columns match [`Self::target_table`]'s
    /// spec, or map to it through canonicalization (§4.5 stage 4). Pure: the
    /// same bytes always produce the same frame.
    fn parse(&self, file: &FileMeta) -> PointlineResult<DataFrame>;
}

/// Resolve `(vendor, data_type)` to the parser that handles it (§4.5 stage 1).
/// A closed alias table — unknown combinations are rejected outright rather
/// than falling back to a best-guess parser.
pub fn resolve_parser(vendor: &str, data_type: &str) -> PointlineResult<Box<dyn Parser>> {
    match (vendor, data_type) {
        ("binance", "trades") => Ok(Box::new(crypto::CryptoTradesParser)),
        ("binance", "orderbook") | ("okx", "orderbook") | ("bybit", "orderbook") => {
            Ok(Box::new(crypto::CryptoOrderbookParser))
        }
        ("okx", "trades") | ("bybit", "trades") => Ok(Box::new(crypto::CryptoTradesParser)),
        ("sse", "l3") => Ok(Box::new(equity_l3::EquityL3Parser::sse())),
        ("szse", "l3") => Ok(Box::new(equity_l3::EquityL3Parser::szse())),
        _ => Err(ParseError::UnknownVendorDataType {
            vendor: vendor.to_string(),
            data_type: data_type.to_string(),
        }
        .into()),
    }
}
