//! Append-only partitioned table storage (C3, §4.3).
//!
//! [`Table`] is the unit callers interact with: `append`, `snapshot_read`,
//! `compact`, `vacuum`. Writers serialize through [`log::TransactionLog`];
//! readers always see a consistent snapshot, chosen once at `snapshot_read`
//! time, regardless of concurrent writers.

pub mod location;
pub mod log;
pub mod partition;

use std::io::Cursor;

use polars::prelude::*;

use crate::error::{IoError, PointlineResult};
use crate::schema::{TableSpec, catalog};

use location::StorageLocation;
use log::TransactionLog;
use partition::{PartitionKey, PartitionPredicate, parse_partition_from_path, partition_dir};

pub struct StorageEngine {
    root: StorageLocation,
}

impl StorageEngine {
    pub fn new(root: StorageLocation) -> Self {
        Self { root }
    }

    pub fn table(&self, name: &str) -> PointlineResult<Table> {
        let spec = catalog::table_spec(name)?;
        Ok(Table {
            root: self.root.clone(),
            spec,
            log: TransactionLog::new(self.root.clone(), name),
        })
    }
}

pub struct Table {
    root: StorageLocation,
    spec: &'static TableSpec,
    log: TransactionLog,
}

impl Table {
    pub fn spec(&self) -> &'static TableSpec {
        self.spec
    }

    fn tie_break_sort(&self, df: DataFrame) -> PointlineResult<DataFrame> {
        let keys = self.spec.tie_break();
        df.lazy()
            .sort(keys.to_vec(), SortMultipleOptions::default())
            .collect()
            .map_err(Into::into)
    }

    fn partition_key_for(&self, df: &DataFrame, row: usize) -> PointlineResult<Option<PartitionKey>> {
        if !self.spec.is_partitioned() {
            return Ok(None);
        }
        let venue = df
            .column("venue")?
            .str()?
            .get(row)
            .ok_or_else(|| IoError::WriteFailed {
                path: self.spec.name.to_string(),
                reason: "null venue in partitioned table".to_string(),
            })?
            .to_string();
        let trading_date = df
            .column("trading_date")?
            .date()?
            .as_date_iter()
            .nth(row)
            .flatten()
            .ok_or_else(|| IoError::WriteFailed {
                path: self.spec.name.to_string(),
                reason: "null trading_date in partitioned table".to_string(),
            })?;
        Ok(Some(PartitionKey { venue, trading_date }))
    }

    /// Write `frame` as one or more new files, one per partition key present
    /// in the data, and commit them atomically (§4.3 `append`). Returns the
    /// new log version.
    pub async fn append(&self, frame: DataFrame, now_ts_us: i64) -> PointlineResult<u64> {
        let sorted = self.tie_break_sort(frame)?;
        let groups: Vec<DataFrame> = if self.spec.is_partitioned() {
            sorted.partition_by(["venue", "trading_date"], true)?
        } else {
            vec![sorted]
        };

        let mut added_files = Vec::with_capacity(groups.len());
        for mut group in groups {
            let key = self.partition_key_for(&group, 0)?;
            let dir = partition_dir(self.spec.name, key.as_ref());
            let file_name = partition::new_part_file_name();
            let relative = format!("{dir}/{file_name}");

            let mut buf = Vec::new();
            ParquetWriter::new(Cursor::new(&mut buf))
                .with_compression(ParquetCompression::Zstd(None))
                .finish(&mut group)?;

            self.root.put(&relative, buf.into()).await?;
            added_files.push(relative);
        }

        let expected = self.log.latest_version().await?;
        self.log.commit(expected, added_files, vec![], now_ts_us).await
    }

    /// Files visible at `as_of_version` (or latest), pruned by `predicate`
    /// before any row is read (§4.3 `snapshot_read`).
    async fn visible_files(
        &self,
        predicate: &PartitionPredicate,
        as_of_version: Option<u64>,
    ) -> PointlineResult<Vec<String>> {
        let records = self.log.records_as_of(as_of_version).await?;
        let mut added = std::collections::BTreeSet::new();
        let mut removed = std::collections::HashSet::new();
        for record in records {
            for f in record.added_files {
                added.insert(f);
            }
            for f in record.removed_files {
                removed.insert(f);
            }
        }
        Ok(added
            .into_iter()
            .filter(|f| !removed.contains(f))
            .filter(|f| match parse_partition_from_path(f) {
                Some(key) => predicate.matches(&key),
                None => true,
            })
            .collect())
    }

    /// Read every row visible under `predicate` as of `as_of_version` (or the
    /// latest committed version), re-sorted by the table's tie-break order
    /// across files (§5 "readers must merge-sort... when strict total order
    /// is required").
    pub async fn snapshot_read(
        &self,
        predicate: &PartitionPredicate,
        as_of_version: Option<u64>,
    ) -> PointlineResult<DataFrame> {
        let files = self.visible_files(predicate, as_of_version).await?;
        if files.is_empty() {
            return Ok(DataFrame::from_iter(self.spec.columns.iter().map(|c| {
                Series::new_empty(c.name.into(), &c.ty.to_polars())
            })));
        }
        let mut frames = Vec::with_capacity(files.len());
        for path in &files {
            let bytes = self.root.get(path).await?;
            let df = ParquetReader::new(Cursor::new(bytes.to_vec())).finish()?;
            frames.push(df);
        }
        let combined = concat(
            frames.iter().map(|df| df.clone().lazy()).collect::<Vec<_>>(),
            UnionArgs::default(),
        )?
        .collect()?;
        self.tie_break_sort(combined)
    }

    /// Rewrite every file in partitions matching `predicate` smaller than
    /// `small_file_threshold_bytes` into fewer files near `target_file_size`,
    /// tombstoning the originals atomically (§4.3 `compact`).
    pub async fn compact(
        &self,
        predicate: &PartitionPredicate,
        target_file_size_bytes: u64,
        now_ts_us: i64,
    ) -> PointlineResult<u64> {
        let files = self.visible_files(predicate, None).await?;
        let combined = self.snapshot_read(predicate, None).await?;
        if combined.height() == 0 {
            return self.log.latest_version().await;
        }

        let approx_row_bytes = combined.estimated_size() as u64 / combined.height().max(1) as u64;
        let rows_per_file = (target_file_size_bytes / approx_row_bytes.max(1)).max(1) as usize;

        let groups: Vec<DataFrame> = if self.spec.is_partitioned() {
            combined.partition_by(["venue", "trading_date"], true)?
        } else {
            vec![combined]
        };

        let mut added_files = Vec::new();
        for group in groups {
            let key = self.partition_key_for(&group, 0)?;
            let dir = partition_dir(self.spec.name, key.as_ref());
            let mut offset = 0usize;
            while offset < group.height() {
                let len = rows_per_file.min(group.height() - offset);
                let mut chunk = group.slice(offset as i64, len);
                let relative = format!("{dir}/{}", partition::new_part_file_name());
                let mut buf = Vec::new();
                ParquetWriter::new(Cursor::new(&mut buf))
                    .with_compression(ParquetCompression::Zstd(None))
                    .finish(&mut chunk)?;
                self.root.put(&relative, buf.into()).await?;
                added_files.push(relative);
                offset += len;
            }
        }

        let expected = self.log.latest_version().await?;
        self.log.commit(expected, added_files, files, now_ts_us).await
    }

    /// Delete tombstoned files (those named `removed_files` in some committed
    /// record but no longer in any current record's `added_files`) older than
    /// `retention` (§4.3 `vacuum`).
    pub async fn vacuum(&self, retention: std::time::Duration, now_ts_us: i64) -> PointlineResult<usize> {
        let records = self.log.records_as_of(None).await?;
        let live: std::collections::HashSet<String> =
            records.iter().flat_map(|r| r.added_files.iter().cloned()).collect();
        let cutoff_us = now_ts_us - retention.as_micros() as i64;

        let mut deleted = 0;
        for record in &records {
            if record.committed_at_ts_us > cutoff_us {
                continue;
            }
            for path in &record.removed_files {
                if !live.contains(path) {
                    self.root.delete(path).await?;
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }
}
