//! Explicit engine configuration (§4.0, §4.5, §5).
//!
//! Nothing in this crate reads an environment variable or a config file for
//! its own behavior. A caller builds an [`EngineConfig`] once — by hand, or by
//! deserializing it from whatever format an external loader prefers — and
//! passes it to `Engine::open`. There is no process-wide default.

use std::{collections::HashMap, time::Duration};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{NotFoundError, PointlineResult};

/// Closed venue → IANA timezone mapping used to derive `trading_date` from
/// `ts_event_us` (§3.4, §4.5 stage 5). Closed enumeration: an unknown venue is
/// a [`NotFoundError::VenueTimezone`], never a silent UTC fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueTimezones(HashMap<String, String>);

impl VenueTimezones {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, venue: impl Into<String>, tz: Tz) -> Self {
        self.0.insert(venue.into(), tz.name().to_string());
        self
    }

    /// The crypto venues and Chinese-equity venues this engine ships parsers
    /// for, with their conventional trading-day timezones.
    pub fn default_catalog() -> Self {
        Self::new()
            .with("binance", chrono_tz::UTC)
            .with("okx", chrono_tz::UTC)
            .with("bybit", chrono_tz::UTC)
            .with("deribit", chrono_tz::UTC)
            .with("sse", chrono_tz::Asia::Shanghai)
            .with("szse", chrono_tz::Asia::Shanghai)
    }

    pub fn resolve(&self, venue: &str) -> PointlineResult<Tz> {
        let name = self
            .0
            .get(venue)
            .ok_or_else(|| NotFoundError::VenueTimezone(venue.to_string()))?;
        name.parse::<Tz>()
            .map_err(|_| NotFoundError::VenueTimezone(venue.to_string()).into())
    }
}

impl Default for VenueTimezones {
    fn default() -> Self {
        Self::default_catalog()
    }
}

/// Bounds on internal retry behavior for conflict/transient-io classes
/// (§4.5 failure modes, §7 `ConflictError`/`IoError`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
        }
    }
}

/// Per-operation I/O deadline (§5 Timeouts). Exceeding it surfaces as a
/// [`crate::error::CancelledError::TimedOut`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deadlines {
    pub ingest_file: Duration,
    pub storage_commit: Duration,
    pub replay: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            ingest_file: Duration::from_secs(300),
            storage_commit: Duration::from_secs(30),
            replay: Duration::from_secs(600),
        }
    }
}

/// Target compacted file size in bytes, used by `compact` when the caller
/// doesn't override it (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompactionDefaults {
    pub target_file_size_bytes: u64,
    pub small_file_threshold_bytes: u64,
}

impl Default for CompactionDefaults {
    fn default() -> Self {
        Self {
            target_file_size_bytes: 256 * 1024 * 1024,
            small_file_threshold_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Immutable, explicit configuration value threaded through every
/// constructor. Built once by the caller; never mutated, never defaulted
/// from ambient process state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub venue_timezones: VenueTimezones,
    pub retry: RetryPolicy,
    pub deadlines: Deadlines,
    pub compaction: CompactionDefaults,
    /// Max share of rows in a file allowed to have unparseable timestamps
    /// before the file fails fatally (§7 `ValidationError::TimestampThresholdExceeded`).
    pub max_bad_timestamp_share: f64,
}

impl EngineConfig {
    pub fn new(venue_timezones: VenueTimezones) -> Self {
        Self {
            venue_timezones,
            retry: RetryPolicy::default(),
            deadlines: Deadlines::default(),
            compaction: CompactionDefaults::default(),
            max_bad_timestamp_share: 0.01,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(VenueTimezones::default())
    }
}
