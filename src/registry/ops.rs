//! Pure registry operations (§4.2). None of these touch storage; the caller
//! is responsible for reading a [`SymbolRegistry`] snapshot, calling into
//! here, and committing the result through [`commit`] under OCC.

use blake2::{Blake2b512, Digest};

use crate::error::{ConflictError, PointlineResult};

use super::{MAX_I64, NewSymbolAttrs, SymbolId, SymbolRegistry, SymbolVersion};

/// `symbol_id = signed_i64(blake2b("{venue}|{venue_symbol}|{valid_from_ts_us}"))`
/// (§4.2). Deterministic and stable across rebuilds — the same business key
/// always yields the same id, independent of insertion order.
pub fn symbol_id_for(venue: &str, venue_symbol: &str, valid_from_ts_us: i64) -> SymbolId {
    let mut hasher = Blake2b512::new();
    hasher.update(venue.as_bytes());
    hasher.update(b"|");
    hasher.update(venue_symbol.as_bytes());
    hasher.update(b"|");
    hasher.update(valid_from_ts_us.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    SymbolId(i64::from_be_bytes(bytes))
}

/// Turn a full current-state listing into SCD2 rows effective at
/// `effective_ts`, `valid_until = MAX_I64`, `is_current = true` (§4.2
/// `bootstrap`). Intended for first-load of a venue's symbol master.
pub fn bootstrap(snapshot: &[NewSymbolAttrs], effective_ts: i64) -> Vec<SymbolVersion> {
    snapshot
        .iter()
        .map(|attrs| new_version(attrs, effective_ts, MAX_I64))
        .collect()
}

fn new_version(attrs: &NewSymbolAttrs, valid_from_ts_us: i64, valid_until_ts_us: i64) -> SymbolVersion {
    let symbol_id = symbol_id_for(&attrs.venue, &attrs.venue_symbol, valid_from_ts_us);
    SymbolVersion {
        venue: attrs.venue.clone(),
        venue_symbol: attrs.venue_symbol.clone(),
        symbol: attrs.symbol.clone(),
        market_type: attrs.market_type.clone(),
        base_asset: attrs.base_asset.clone(),
        quote_asset: attrs.quote_asset.clone(),
        tick_size: attrs.tick_size,
        lot_size: attrs.lot_size,
        contract_size: attrs.contract_size,
        valid_from_ts_us,
        valid_until_ts_us,
        symbol_id,
    }
}

/// Apply one vendor snapshot against the current registry state (§4.2
/// `upsert`): unseen key inserts, changed tracked attributes close-and-insert,
/// unchanged is a no-op. `delisted` names natural keys (`venue`,
/// `venue_symbol`) present in the registry but absent from `new_snapshot`
/// this cycle — each is closed with no successor.
pub fn upsert(
    current: &SymbolRegistry,
    new_snapshot: &[NewSymbolAttrs],
    effective_ts: i64,
    delisted: &[(String, String)],
) -> Vec<SymbolVersion> {
    let mut rows = current.rows().to_vec();

    for attrs in new_snapshot {
        match current.current_for(&attrs.venue, &attrs.venue_symbol) {
            None => {
                rows.push(new_version(attrs, effective_ts, MAX_I64));
            }
            Some(existing) if existing.tracked_attrs_eq(attrs) => {
                // unchanged: no-op, per §4.2 case (iii).
            }
            Some(existing) => {
                let existing_key = (existing.venue.clone(), existing.venue_symbol.clone());
                close_current(&mut rows, &existing_key, effective_ts);
                rows.push(new_version(attrs, effective_ts, MAX_I64));
            }
        }
    }

    for key in delisted {
        close_current(&mut rows, key, effective_ts);
    }

    rows
}

fn close_current(rows: &mut [SymbolVersion], key: &(String, String), effective_ts: i64) {
    if let Some(row) = rows
        .iter_mut()
        .find(|r| r.venue == key.0 && r.venue_symbol == key.1 && r.is_current())
    {
        row.valid_until_ts_us = effective_ts;
    }
}

/// Commit `new_rows` as the registry's next version, failing if `expected_version`
/// no longer matches `current` (§4.2 concurrency: single-writer OCC).
pub fn commit(
    current: &SymbolRegistry,
    expected_version: u64,
    new_rows: Vec<SymbolVersion>,
) -> PointlineResult<SymbolRegistry> {
    if current.version() != expected_version {
        return Err(ConflictError::StaleRegistry {
            expected: expected_version,
            current: current.version(),
        }
        .into());
    }
    let mut next = SymbolRegistry {
        rows: new_rows,
        version: current.version() + 1,
    };
    next.validate()?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(venue: &str, venue_symbol: &str, tick: i64) -> NewSymbolAttrs {
        NewSymbolAttrs {
            venue: venue.to_string(),
            venue_symbol: venue_symbol.to_string(),
            symbol: venue_symbol.to_string(),
            market_type: "spot".to_string(),
            base_asset: Some("BTC".to_string()),
            quote_asset: Some("USDT".to_string()),
            tick_size: tick,
            lot_size: 1,
            contract_size: None,
        }
    }

    #[test]
    fn symbol_id_is_deterministic() {
        let a = symbol_id_for("binance", "BTCUSDT", 1_000);
        let b = symbol_id_for("binance", "BTCUSDT", 1_000);
        assert_eq!(a, b);
        let c = symbol_id_for("binance", "BTCUSDT", 1_001);
        assert_ne!(a, c);
    }

    #[test]
    fn bootstrap_then_upsert_closes_changed_version() {
        let snap = vec![attrs("binance", "BTCUSDT", 10)];
        let rows = bootstrap(&snap, 1_000);
        let mut registry = SymbolRegistry::new();
        registry = commit(&registry, 0, rows).unwrap();
        assert_eq!(registry.rows().len(), 1);
        assert!(registry.rows()[0].is_current());

        let changed = vec![attrs("binance", "BTCUSDT", 20)];
        let next_rows = upsert(&registry, &changed, 2_000, &[]);
        let registry = commit(&registry, registry.version(), next_rows).unwrap();

        assert_eq!(registry.rows().len(), 2);
        let closed = registry.as_of("binance", "BTCUSDT", 1_500).unwrap();
        assert_eq!(closed.tick_size, 10);
        assert_eq!(closed.valid_until_ts_us, 2_000);
        let open = registry.as_of("binance", "BTCUSDT", 2_500).unwrap();
        assert_eq!(open.tick_size, 20);
        assert!(open.is_current());
    }

    #[test]
    fn upsert_unchanged_is_noop() {
        let snap = vec![attrs("binance", "BTCUSDT", 10)];
        let registry = commit(&SymbolRegistry::new(), 0, bootstrap(&snap, 1_000)).unwrap();
        let next_rows = upsert(&registry, &snap, 2_000, &[]);
        assert_eq!(next_rows.len(), 1);
    }

    #[test]
    fn delisting_closes_with_no_successor() {
        let snap = vec![attrs("binance", "BTCUSDT", 10)];
        let registry = commit(&SymbolRegistry::new(), 0, bootstrap(&snap, 1_000)).unwrap();
        let next_rows = upsert(
            &registry,
            &[],
            5_000,
            &[("binance".to_string(), "BTCUSDT".to_string())],
        );
        let registry = commit(&registry, registry.version(), next_rows).unwrap();
        assert!(registry.as_of("binance", "BTCUSDT", 6_000).is_none());
        assert!(registry.as_of("binance", "BTCUSDT", 4_000).is_some());
    }

    #[test]
    fn stale_commit_is_rejected() {
        let registry = SymbolRegistry::new();
        let rows = bootstrap(&[attrs("binance", "BTCUSDT", 10)], 1_000);
        let err = commit(&registry, 1, rows).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PointlineError::Conflict(ConflictError::StaleRegistry { .. })
        ));
    }
}
