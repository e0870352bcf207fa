//! Structured error taxonomy for the engine (§7 of the design).
//!
//! Row-level failures never surface here — they are always accounted for via
//! quarantine counters inside the ingestion pipeline. Everything in this module
//! is a file-level or system-level failure that propagates to the caller.

use thiserror::Error;

pub type PointlineResult<T> = Result<T, PointlineError>;

#[derive(Debug, Error)]
pub enum PointlineError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}

/// Raw file unreadable, storage path missing, transaction log read/write failure.
/// Retryable by the caller; the pipeline retries a bounded number of times for
/// transient classes.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("io operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("failed to build object store for '{uri}': {reason}")]
    ObjectStoreBuild { uri: String, reason: String },

    #[error("table root not found: {path}")]
    TableRootMissing { path: String },

    #[error("transaction log corrupt at version {version}: {reason}")]
    CorruptLog { version: u64, reason: String },

    #[error("failed to write column file '{path}': {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("failed to read column file '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("polars error: {0}")]
    Polars(String),
}

/// A vendor file was rejected outright. Aborts the current ingest; the
/// manifest entry becomes `failed` with this reason. Not retried automatically.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unreadable file '{path}': {reason}")]
    UnreadableFile { path: String, reason: String },

    #[error("schema drift in '{path}': expected column '{expected}', {detail}")]
    SchemaDrift {
        path: String,
        expected: String,
        detail: String,
    },

    #[error("missing required column '{column}' in '{path}'")]
    MissingColumn { path: String, column: String },

    #[error("unknown (vendor, data_type) combination: ({vendor}, {data_type})")]
    UnknownVendorDataType { vendor: String, data_type: String },

    #[error("symbol could not be lifted from filename '{filename}'")]
    SymbolFromFilename { filename: String },
}

/// Row or file level invariant violation (§3.2). At row level the pipeline
/// classifies and routes to quarantine; this variant is only raised when a
/// *fatal* invariant is violated at file granularity.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("fatal validation failure on table '{table}': {reason}")]
    FatalFile { table: String, reason: String },

    #[error(
        "unparseable timestamp share {bad}/{total} exceeds threshold {threshold} for table '{table}'"
    )]
    TimestampThresholdExceeded {
        table: String,
        bad: usize,
        total: usize,
        threshold: f64,
    },

    #[error("registry invariant violated: {0}")]
    RegistryInvariant(String),

    #[error("frame does not conform to spec for table '{table}': {reason}")]
    SpecMismatch { table: String, reason: String },
}

/// Optimistic-concurrency commit failed (registry or storage transaction log).
/// Caller retries; the pipeline performs bounded internal retries.
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("stale registry snapshot: expected version {expected}, current is {current}")]
    StaleRegistry { expected: u64, current: u64 },

    #[error(
        "storage log conflict on table '{table}': expected version {expected}, current is {current}"
    )]
    StorageLog {
        table: String,
        expected: u64,
        current: u64,
    },

    #[error("retries exhausted after {attempts} attempts: {last_reason}")]
    RetriesExhausted { attempts: u32, last_reason: String },
}

/// A referenced symbol version, partition, or file id is missing. Treated as
/// a programming or data-integrity error; always escalated, never retried.
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("unknown table '{0}'")]
    Table(String),

    #[error(
        "symbol version not found for venue='{venue}' venue_symbol='{venue_symbol}' at ts_event_us={ts_event_us}"
    )]
    SymbolVersion {
        venue: String,
        venue_symbol: String,
        ts_event_us: i64,
    },

    #[error("manifest entry not found for file_id={0}")]
    ManifestEntry(u64),

    #[error("partition not found: {0}")]
    Partition(String),

    #[error("no timezone mapping registered for venue '{0}'")]
    VenueTimezone(String),
}

/// Operation aborted by cancellation signal or timeout. No side effects are
/// committed.
#[derive(Debug, Error)]
pub enum CancelledError {
    #[error("operation '{operation}' was cancelled")]
    Signalled { operation: String },

    #[error("operation '{operation}' timed out after {elapsed_ms}ms (deadline {deadline_ms}ms)")]
    TimedOut {
        operation: String,
        elapsed_ms: u64,
        deadline_ms: u64,
    },
}

impl From<polars::error::PolarsError> for PointlineError {
    fn from(value: polars::error::PolarsError) -> Self {
        PointlineError::Io(IoError::Polars(value.to_string()))
    }
}

impl From<object_store::Error> for PointlineError {
    fn from(value: object_store::Error) -> Self {
        PointlineError::Io(IoError::ObjectStore(value.to_string()))
    }
}
