//! Ingestion Pipeline (C5, §4.5). [`ingest_file`] runs the twelve stages in
//! order and never returns early except on a fatal parse/validation failure —
//! every rejected row is counted and quarantined rather than silently dropped.

pub mod canonicalize;
pub mod validate;

use polars::prelude::DataFrame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::error::{CancelledError, ConflictError, ParseError, PointlineError, PointlineResult};
use crate::manifest::{FileIdentity, Manifest, ManifestState, Quarantine, QuarantineRecord};
use crate::parsers::{FileMeta, Parser, resolve_parser};
use crate::registry::SymbolRegistry;
use crate::schema::catalog;
use crate::storage::StorageEngine;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub force: bool,
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub file_id: i64,
    pub rows_total: i64,
    pub rows_written: i64,
    pub rows_quarantined: i64,
    pub skipped: bool,
}

/// Run the full ingestion pipeline for one raw file (§4.5).
#[instrument(skip(file, registry, engine, config, cancel), fields(vendor = %file.vendor, raw_path = %file.raw_path))]
pub async fn ingest_file(
    file: FileMeta,
    registry: &SymbolRegistry,
    engine: &StorageEngine,
    config: &EngineConfig,
    options: IngestOptions,
    now_ts_us: i64,
    cancel: &CancellationToken,
) -> PointlineResult<IngestionResult> {
    // Stage 1: resolve target table.
    let parser = resolve_parser(&file.vendor, &file.data_type)?;
    let table_name = parser.target_table();
    catalog::table_spec(table_name)?;
    debug!(table = table_name, "resolved target table");

    // Stage 3: parse.
    let parsed = parser.parse(&file);
    ingest_parsed(file, table_name, parsed, registry, engine, config, options, now_ts_us, cancel).await
}

/// Resolve and parse every file's raw bytes in parallel across a rayon
/// thread pool — the CPU-bound stages of the pipeline (1 and 3) — ahead of
/// the per-file async ingestion that follows (§5 "multi-file ingestion runs
/// in parallel on different worker threads"). Storage commits still
/// serialize per table through the transaction log's OCC check, so only
/// resolution and parsing benefit from the fan-out; stages 2 and 4-12 still
/// run one file at a time, in [`ingest_files`].
fn resolve_and_parse_many(files: &[FileMeta]) -> Vec<(PointlineResult<&'static str>, Option<PointlineResult<DataFrame>>)> {
    use rayon::prelude::*;

    files
        .par_iter()
        .map(|file| match resolve_parser(&file.vendor, &file.data_type) {
            Ok(parser) => {
                let table_name = parser.target_table();
                (Ok(table_name), Some(parser.parse(file)))
            }
            Err(e) => (Err(e), None),
        })
        .collect()
}

/// Ingest many raw files: resolve and parse them all in parallel
/// (`resolve_and_parse_many`), then run stages 2 and 4-12 for each in turn,
/// collecting one result per input file in input order.
pub async fn ingest_files(
    files: Vec<FileMeta>,
    registry: &SymbolRegistry,
    engine: &StorageEngine,
    config: &EngineConfig,
    options: IngestOptions,
    now_ts_us: i64,
    cancel: &CancellationToken,
) -> Vec<PointlineResult<IngestionResult>> {
    let resolved = resolve_and_parse_many(&files);
    let mut results = Vec::with_capacity(files.len());
    for (file, (table_name, parsed)) in files.into_iter().zip(resolved.into_iter()) {
        let result = match table_name {
            Ok(table_name) => {
                ingest_parsed(
                    file,
                    table_name,
                    parsed.expect("parse attempted whenever resolve_parser succeeds"),
                    registry,
                    engine,
                    config,
                    options.clone(),
                    now_ts_us,
                    cancel,
                )
                .await
            }
            Err(e) => Err(e),
        };
        results.push(result);
    }
    results
}

/// Stages 2, 4-12 of the pipeline (§4.5): everything from the idempotency
/// check onward. Shared by [`ingest_file`] (parses inline, one file at a
/// time) and [`ingest_files`] (resolves and parses ahead of time on a rayon
/// thread pool via [`resolve_and_parse_many`]). `parsed` is a `Result`
/// rather than an already-unwrapped frame so a parse failure is still
/// recorded against the right manifest entry at the right pipeline stage,
/// exactly as if parsing had happened here.
#[allow(clippy::too_many_arguments)]
async fn ingest_parsed(
    file: FileMeta,
    table_name: &'static str,
    parsed: PointlineResult<DataFrame>,
    registry: &SymbolRegistry,
    engine: &StorageEngine,
    config: &EngineConfig,
    options: IngestOptions,
    now_ts_us: i64,
    cancel: &CancellationToken,
) -> PointlineResult<IngestionResult> {
    // Stage 2: idempotency check.
    let manifest = Manifest::new(engine);
    let identity = FileIdentity {
        vendor: file.vendor.clone(),
        data_type: file.data_type.clone(),
        raw_path: file.raw_path.clone(),
        content_hash: file.content_hash.clone(),
    };
    let mut entry = manifest.resolve_file_id(&identity, now_ts_us).await?;
    if entry.state == ManifestState::Completed.to_string() && !options.force {
        info!(file_id = entry.file_id, "skipping already-completed file");
        return Ok(IngestionResult {
            file_id: entry.file_id,
            rows_total: entry.rows_total.unwrap_or(0),
            rows_written: entry.rows_written.unwrap_or(0),
            rows_quarantined: entry.rows_quarantined.unwrap_or(0),
            skipped: true,
        });
    }
    entry = manifest
        .update_status(entry, ManifestState::InProgress, None, None, None, None, now_ts_us)
        .await?;

    if cancel.is_cancelled() {
        return Err(CancelledError::Signalled {
            operation: "ingest_file".to_string(),
        }
        .into());
    }

    // Stage 3: parse (already run by the caller; consumed here so a failure
    // is still recorded against this manifest entry at this pipeline stage).
    let parsed = match parsed {
        Ok(df) => df,
        Err(e) => {
            manifest
                .update_status(
                    entry,
                    ManifestState::Failed,
                    None,
                    None,
                    None,
                    Some(e.to_string()),
                    now_ts_us,
                )
                .await?;
            return Err(e);
        }
    };
    let rows_total = parsed.height() as i64;
    debug!(rows_in = rows_total, "parsed raw file");

    let run = async {
        // Stage 4: canonicalize.
        let tz = config.venue_timezones.resolve(&file.vendor)?;
        let canonical = canonicalize::canonicalize(parsed, &file.vendor, tz)?;

        // Stage 5: derive trading_date.
        let with_date = canonicalize::derive_trading_date(canonical, tz, config.max_bad_timestamp_share)?;

        // Stage 6 + 7: generic + venue-specific validation.
        let spec = catalog::table_spec(table_name)?;
        let (valid, mut quarantined) = validate::validate_generic(with_date, spec, entry.file_id, now_ts_us)?;
        let (valid, venue_rejects) = validate::validate_venue_specific(valid, &file.vendor, entry.file_id, now_ts_us)?;
        quarantined.extend(venue_rejects);

        // Stage 8: PIT coverage join.
        let (valid, coverage_rejects) = validate::join_symbol_coverage(valid, registry, entry.file_id, now_ts_us)?;
        quarantined.extend(coverage_rejects);

        // Stage 9: assign lineage.
        let valid = canonicalize::assign_lineage(valid, entry.file_id)?;

        // Stage 10: normalize to spec.
        let normalized = canonicalize::normalize_to_spec(valid, spec)?;

        PointlineResult::Ok((normalized, quarantined))
    }
    .await;

    let (normalized, quarantine_rows) = match run {
        Ok(v) => v,
        Err(e) => {
            manifest
                .update_status(
                    entry,
                    ManifestState::Failed,
                    Some(rows_total),
                    None,
                    None,
                    Some(e.to_string()),
                    now_ts_us,
                )
                .await?;
            return Err(e);
        }
    };

    let rows_written = normalized.height() as i64;
    let rows_quarantined = quarantine_rows.len() as i64;

    if options.dry_run {
        info!(rows_written, rows_quarantined, "dry run complete, no write performed");
        return Ok(IngestionResult {
            file_id: entry.file_id,
            rows_total,
            rows_written,
            rows_quarantined,
            skipped: false,
        });
    }

    // Stage 11: write. A storage-log conflict (a concurrent writer won the
    // commit race) is retried up to `config.retry.max_attempts` times with
    // linear backoff before giving up (§4.5, §7 `ConflictError`).
    let table = engine.table(table_name)?;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match table.append(normalized.clone(), now_ts_us).await {
            Ok(_) => break,
            Err(PointlineError::Conflict(e)) if attempt < config.retry.max_attempts => {
                debug!(attempt, reason = %e, "storage append conflict, retrying");
                tokio::time::sleep(config.retry.base_backoff * attempt).await;
            }
            Err(PointlineError::Conflict(e)) => {
                let err: PointlineError = ConflictError::RetriesExhausted {
                    attempts: attempt,
                    last_reason: e.to_string(),
                }
                .into();
                manifest
                    .update_status(
                        entry,
                        ManifestState::Failed,
                        Some(rows_total),
                        None,
                        None,
                        Some(err.to_string()),
                        now_ts_us,
                    )
                    .await?;
                return Err(err);
            }
            Err(e) => {
                manifest
                    .update_status(
                        entry,
                        ManifestState::Failed,
                        Some(rows_total),
                        None,
                        None,
                        Some(e.to_string()),
                        now_ts_us,
                    )
                    .await?;
                return Err(e);
            }
        }
    }
    let quarantine = Quarantine::new(engine);
    quarantine.append(&quarantine_rows).await?;

    // Stage 12: manifest update.
    let file_id = entry.file_id;
    manifest
        .update_status(
            entry,
            ManifestState::Completed,
            Some(rows_total),
            Some(rows_written),
            Some(rows_quarantined),
            None,
            now_ts_us,
        )
        .await?;

    info!(rows_total, rows_written, rows_quarantined, "ingestion complete");
    Ok(IngestionResult {
        file_id,
        rows_total,
        rows_written,
        rows_quarantined,
        skipped: false,
    })
}

pub(crate) fn no_parser_for(vendor: &str, data_type: &str) -> crate::error::PointlineError {
    ParseError::UnknownVendorDataType {
        vendor: vendor.to_string(),
        data_type: data_type.to_string(),
    }
    .into()
}
