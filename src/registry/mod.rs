//! Symbol Registry (C2, §4.2).
//!
//! A [`SymbolVersion`] is one SCD2 row: a natural key `(venue, venue_symbol)`,
//! a half-open validity window, and the tracked attributes a query joins
//! against. [`SymbolRegistry`] holds the full set of versions and exposes
//! only the pure operations §4.2 names — `bootstrap`, `upsert`, `validate`,
//! `assign_symbol_ids` — plus an `as_of` lookup for the query kernel (C7).
//!
//! Concurrency is optimistic: [`SymbolRegistry::version`] is the expected
//! version a writer read before mutating; [`ops::commit`] fails with
//! [`crate::error::ConflictError::StaleRegistry`] if the registry moved on.

pub mod ops;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PointlineResult, ValidationError};

pub const MAX_I64: i64 = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub i64);

crate::impl_from_primitive!(SymbolId, i64);

/// One SCD2 version of one symbol (§3.1 "Symbol version").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolVersion {
    pub venue: String,
    pub venue_symbol: String,
    pub symbol: String,
    pub market_type: String,
    pub base_asset: Option<String>,
    pub quote_asset: Option<String>,
    /// Scaled tick size, same encoding as the table the symbol trades on.
    pub tick_size: i64,
    pub lot_size: i64,
    pub contract_size: Option<i64>,
    pub valid_from_ts_us: i64,
    pub valid_until_ts_us: i64,
    pub symbol_id: SymbolId,
}

impl SymbolVersion {
    pub fn is_current(&self) -> bool {
        self.valid_until_ts_us == MAX_I64
    }

    pub fn covers(&self, ts_event_us: i64) -> bool {
        self.valid_from_ts_us <= ts_event_us && ts_event_us < self.valid_until_ts_us
    }

    /// Business key tracked attributes that drive change detection in
    /// [`ops::upsert`] — everything except the natural key and validity.
    fn tracked_attrs_eq(&self, other: &NewSymbolAttrs) -> bool {
        self.symbol == other.symbol
            && self.market_type == other.market_type
            && self.base_asset == other.base_asset
            && self.quote_asset == other.quote_asset
            && self.tick_size == other.tick_size
            && self.lot_size == other.lot_size
            && self.contract_size == other.contract_size
    }
}

/// A vendor-reported snapshot row for one `(venue, venue_symbol)`, prior to
/// `symbol_id` assignment and SCD2 sequencing.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSymbolAttrs {
    pub venue: String,
    pub venue_symbol: String,
    pub symbol: String,
    pub market_type: String,
    pub base_asset: Option<String>,
    pub quote_asset: Option<String>,
    pub tick_size: i64,
    pub lot_size: i64,
    pub contract_size: Option<i64>,
}

/// The full registry value at one version. Readers clone this cheaply enough
/// via `Arc` at the call site (the registry itself stays a plain value type —
/// §3.5 "process-owned during writes; readers take a snapshot").
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    rows: Vec<SymbolVersion>,
    version: u64,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rows(&self) -> &[SymbolVersion] {
        &self.rows
    }

    /// The symbol version covering `ts_event_us` for `(venue, venue_symbol)`,
    /// if one exists (§4.7 PIT coverage join).
    pub fn as_of(&self, venue: &str, venue_symbol: &str, ts_event_us: i64) -> Option<&SymbolVersion> {
        self.rows
            .iter()
            .find(|r| r.venue == venue && r.venue_symbol == venue_symbol && r.covers(ts_event_us))
    }

    pub fn by_symbol_id(&self, id: SymbolId) -> Option<&SymbolVersion> {
        self.rows.iter().find(|r| r.symbol_id == id)
    }

    fn current_for(&self, venue: &str, venue_symbol: &str) -> Option<&SymbolVersion> {
        self.rows
            .iter()
            .find(|r| r.venue == venue && r.venue_symbol == venue_symbol && r.is_current())
    }

    fn group_counts(&self) -> HashMap<(&str, &str), usize> {
        let mut counts = HashMap::new();
        for r in &self.rows {
            *counts.entry((r.venue.as_str(), r.venue_symbol.as_str())).or_insert(0) += 1;
        }
        counts
    }

    /// §3.2 invariant 4, checked in full. Returns the first violation found.
    pub fn validate(&self) -> PointlineResult<()> {
        let mut current_seen: HashMap<(&str, &str), usize> = HashMap::new();
        let mut ids_seen = std::collections::HashSet::new();
        for r in &self.rows {
            let key = (r.venue.as_str(), r.venue_symbol.as_str());
            if r.is_current() {
                *current_seen.entry(key).or_insert(0) += 1;
            }
            if !ids_seen.insert(r.symbol_id) {
                return Err(ValidationError::RegistryInvariant(format!(
                    "duplicate symbol_id {:?} for {}/{}",
                    r.symbol_id, r.venue, r.venue_symbol
                ))
                .into());
            }
            if r.valid_from_ts_us >= r.valid_until_ts_us {
                return Err(ValidationError::RegistryInvariant(format!(
                    "non-increasing validity window for {}/{}: [{}, {})",
                    r.venue, r.venue_symbol, r.valid_from_ts_us, r.valid_until_ts_us
                ))
                .into());
            }
        }
        for (key, count) in current_seen {
            if count > 1 {
                return Err(ValidationError::RegistryInvariant(format!(
                    "{} current rows for {}/{}, expected at most 1",
                    count, key.0, key.1
                ))
                .into());
            }
        }
        for ((venue, symbol), _) in self.group_counts() {
            let mut windows: Vec<(i64, i64)> = self
                .rows
                .iter()
                .filter(|r| r.venue == venue && r.venue_symbol == symbol)
                .map(|r| (r.valid_from_ts_us, r.valid_until_ts_us))
                .collect();
            windows.sort_unstable();
            for pair in windows.windows(2) {
                if pair[0].1 > pair[1].0 {
                    return Err(ValidationError::RegistryInvariant(format!(
                        "overlapping validity windows for {venue}/{symbol}: {:?} and {:?}",
                        pair[0], pair[1]
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}
