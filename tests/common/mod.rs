use pointline::config::EngineConfig;
use pointline::registry::ops::{bootstrap, commit};
use pointline::registry::{NewSymbolAttrs, SymbolRegistry};
use pointline::storage::StorageEngine;
use pointline::storage::location::StorageLocation;

pub fn engine(dir: &tempfile::TempDir) -> StorageEngine {
    StorageEngine::new(StorageLocation::local(dir.path()).unwrap())
}

pub fn registry_with_one_symbol(venue: &str, venue_symbol: &str, valid_from_ts_us: i64) -> SymbolRegistry {
    let attrs = NewSymbolAttrs {
        venue: venue.to_string(),
        venue_symbol: venue_symbol.to_string(),
        symbol: venue_symbol.to_string(),
        market_type: "spot".to_string(),
        base_asset: Some("BTC".to_string()),
        quote_asset: Some("USDT".to_string()),
        tick_size: 1,
        lot_size: 1,
        contract_size: None,
    };
    let rows = bootstrap(&[attrs], valid_from_ts_us);
    commit(&SymbolRegistry::new(), 0, rows).unwrap()
}

pub fn config() -> EngineConfig {
    EngineConfig::default()
}
