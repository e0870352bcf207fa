//! Manifest & Quarantine (C6, §4.6). Both are small, append-mostly stores
//! backed by the same [`crate::storage`] engine the event tables use, so they
//! inherit its crash-safety and OCC discipline for free.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PointlineResult;
use crate::storage::StorageEngine;
use crate::storage::partition::PartitionPredicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ManifestState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Identity tuple for one raw file (§3.1 "Manifest entry").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub vendor: String,
    pub data_type: String,
    pub raw_path: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub vendor: String,
    pub data_type: String,
    pub raw_path: String,
    pub content_hash: String,
    pub file_id: i64,
    pub state: String,
    pub rows_total: Option<i64>,
    pub rows_written: Option<i64>,
    pub rows_quarantined: Option<i64>,
    pub ingested_at_ts_us: i64,
    pub status_reason: Option<String>,
}

pub struct Manifest<'a> {
    engine: &'a StorageEngine,
}

impl<'a> Manifest<'a> {
    pub fn new(engine: &'a StorageEngine) -> Self {
        Self { engine }
    }

    /// Idempotent `file_id` allocation for `identity` (§4.5 stage 2,
    /// §4.6 `resolve_file_id`): if the identity tuple is already known,
    /// return its existing entry; otherwise allocate a fresh `file_id` and
    /// record a `pending` entry.
    pub async fn resolve_file_id(&self, identity: &FileIdentity, now_ts_us: i64) -> PointlineResult<ManifestEntry> {
        if let Some(existing) = self.find(identity).await? {
            return Ok(existing);
        }
        let table = self.engine.table("manifest")?;
        let existing_all = table.snapshot_read(&PartitionPredicate::all(), None).await?;
        let file_id = existing_all.height() as i64 + 1;

        let entry = ManifestEntry {
            vendor: identity.vendor.clone(),
            data_type: identity.data_type.clone(),
            raw_path: identity.raw_path.clone(),
            content_hash: identity.content_hash.clone(),
            file_id,
            state: ManifestState::Pending.to_string(),
            rows_total: None,
            rows_written: None,
            rows_quarantined: None,
            ingested_at_ts_us: now_ts_us,
            status_reason: None,
        };
        self.append(&entry).await?;
        Ok(entry)
    }

    async fn find(&self, identity: &FileIdentity) -> PointlineResult<Option<ManifestEntry>> {
        let table = self.engine.table("manifest")?;
        let df = table.snapshot_read(&PartitionPredicate::all(), None).await?;
        let mask = df
            .column("raw_path")?
            .str()?
            .into_iter()
            .zip(df.column("content_hash")?.str()?)
            .map(|(p, h)| p == Some(identity.raw_path.as_str()) && h == Some(identity.content_hash.as_str()))
            .collect::<BooleanChunked>();
        let matched = df.filter(&mask)?;
        if matched.height() == 0 {
            return Ok(None);
        }
        row_to_entry(&matched, matched.height() - 1)
    }

    async fn append(&self, entry: &ManifestEntry) -> PointlineResult<()> {
        let table = self.engine.table("manifest")?;
        let df = entry_to_frame(entry)?;
        table.append(df, entry.ingested_at_ts_us).await?;
        Ok(())
    }

    /// Record a new lifecycle state for `file_id` (§4.6 `update_status`).
    /// Appends a new manifest row rather than mutating in place — the table
    /// is append-only; [`Self::find`]/latest-row lookups always prefer the
    /// most recently appended row for a given `file_id`.
    pub async fn update_status(
        &self,
        mut entry: ManifestEntry,
        state: ManifestState,
        rows_total: Option<i64>,
        rows_written: Option<i64>,
        rows_quarantined: Option<i64>,
        reason: Option<String>,
        now_ts_us: i64,
    ) -> PointlineResult<ManifestEntry> {
        entry.state = state.to_string();
        entry.rows_total = rows_total.or(entry.rows_total);
        entry.rows_written = rows_written.or(entry.rows_written);
        entry.rows_quarantined = rows_quarantined.or(entry.rows_quarantined);
        entry.status_reason = reason;
        entry.ingested_at_ts_us = now_ts_us;
        self.append(&entry).await?;
        Ok(entry)
    }

    /// Every manifest identity whose most recent state is `pending` or
    /// `in-progress` (§4.6 `list_pending`) — candidates for a timeout sweep
    /// retry (§5 "Cancellation").
    pub async fn list_pending(&self) -> PointlineResult<Vec<ManifestEntry>> {
        let table = self.engine.table("manifest")?;
        let df = table.snapshot_read(&PartitionPredicate::all(), None).await?;
        let mut latest_by_file_id: std::collections::BTreeMap<i64, usize> = std::collections::BTreeMap::new();
        let file_ids = df.column("file_id")?.i64()?;
        for (row, id) in file_ids.into_iter().enumerate() {
            if let Some(id) = id {
                latest_by_file_id.insert(id, row);
            }
        }
        let mut pending = Vec::new();
        for row in latest_by_file_id.into_values() {
            if let Some(entry) = row_to_entry(&df, row)? {
                if entry.state == ManifestState::Pending.to_string()
                    || entry.state == ManifestState::InProgress.to_string()
                {
                    pending.push(entry);
                }
            }
        }
        Ok(pending)
    }
}

fn entry_to_frame(entry: &ManifestEntry) -> PointlineResult<DataFrame> {
    df! {
        "vendor" => [entry.vendor.clone()],
        "data_type" => [entry.data_type.clone()],
        "raw_path" => [entry.raw_path.clone()],
        "content_hash" => [entry.content_hash.clone()],
        "file_id" => [entry.file_id],
        "state" => [entry.state.clone()],
        "rows_total" => [entry.rows_total],
        "rows_written" => [entry.rows_written],
        "rows_quarantined" => [entry.rows_quarantined],
        "ingested_at_ts_us" => [entry.ingested_at_ts_us],
        "status_reason" => [entry.status_reason.clone()],
    }
    .map_err(Into::into)
}

fn row_to_entry(df: &DataFrame, row: usize) -> PointlineResult<Option<ManifestEntry>> {
    let get_str = |col: &str| -> PointlineResult<String> {
        Ok(df.column(col)?.str()?.get(row).unwrap_or_default().to_string())
    };
    let get_opt_str = |col: &str| -> PointlineResult<Option<String>> {
        Ok(df.column(col)?.str()?.get(row).map(str::to_string))
    };
    let get_i64 = |col: &str| -> PointlineResult<i64> { Ok(df.column(col)?.i64()?.get(row).unwrap_or_default()) };
    let get_opt_i64 = |col: &str| -> PointlineResult<Option<i64>> { Ok(df.column(col)?.i64()?.get(row)) };

    Ok(Some(ManifestEntry {
        vendor: get_str("vendor")?,
        data_type: get_str("data_type")?,
        raw_path: get_str("raw_path")?,
        content_hash: get_str("content_hash")?,
        file_id: get_i64("file_id")?,
        state: get_str("state")?,
        rows_total: get_opt_i64("rows_total")?,
        rows_written: get_opt_i64("rows_written")?,
        rows_quarantined: get_opt_i64("rows_quarantined")?,
        ingested_at_ts_us: get_i64("ingested_at_ts_us")?,
        status_reason: get_opt_str("status_reason")?,
    }))
}

/// One rejected row plus context (§3.1 "Quarantine record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub logged_at_ts_us: i64,
    pub file_id: i64,
    pub file_seq: Option<i64>,
    pub table: String,
    pub rule: String,
    pub severity: String,
    pub field: Option<String>,
    pub value: Option<String>,
    pub ts_event_us: Option<i64>,
    pub venue: Option<String>,
    pub venue_symbol: Option<String>,
    pub message: String,
}

pub struct Quarantine<'a> {
    engine: &'a StorageEngine,
}

impl<'a> Quarantine<'a> {
    pub fn new(engine: &'a StorageEngine) -> Self {
        Self { engine }
    }

    pub async fn append(&self, records: &[QuarantineRecord]) -> PointlineResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let table = self.engine.table("quarantine")?;
        let df = df! {
            "logged_at_ts_us" => records.iter().map(|r| r.logged_at_ts_us).collect::<Vec<_>>(),
            "file_id" => records.iter().map(|r| r.file_id).collect::<Vec<_>>(),
            "file_seq" => records.iter().map(|r| r.file_seq).collect::<Vec<_>>(),
            "table" => records.iter().map(|r| r.table.clone()).collect::<Vec<_>>(),
            "rule" => records.iter().map(|r| r.rule.clone()).collect::<Vec<_>>(),
            "severity" => records.iter().map(|r| r.severity.clone()).collect::<Vec<_>>(),
            "field" => records.iter().map(|r| r.field.clone()).collect::<Vec<_>>(),
            "value" => records.iter().map(|r| r.value.clone()).collect::<Vec<_>>(),
            "ts_event_us" => records.iter().map(|r| r.ts_event_us).collect::<Vec<_>>(),
            "venue" => records.iter().map(|r| r.venue.clone()).collect::<Vec<_>>(),
            "venue_symbol" => records.iter().map(|r| r.venue_symbol.clone()).collect::<Vec<_>>(),
            "message" => records.iter().map(|r| r.message.clone()).collect::<Vec<_>>(),
        }?;
        let now = records.iter().map(|r| r.logged_at_ts_us).max().unwrap_or(0);
        table.append(df, now).await?;
        Ok(())
    }
}
