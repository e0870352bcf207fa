//! Transaction log (§4.3 "Concurrency"). Each commit is one JSON record
//! written to `_log/<table>/<version>.json` via a compare-and-swap put —
//! `object_store`'s `PutMode::Create` gives the same atomicity the spec
//! describes as "atomic rename", without a separate `.tmp` file, on every
//! backend this crate targets (local, S3, GCS, Azure).
//!
//! A reader takes a snapshot by listing and folding every committed record
//! up to (and including) a version number; anything written after that
//! version, or left as an uncommitted `.tmp` by a crashed writer, is never
//! listed because it was never named `<version>.json`.

use serde::{Deserialize, Serialize};

use crate::error::{ConflictError, IoError, PointlineResult};

use super::location::StorageLocation;

/// One committed transaction: the files it added (relative to the table's
/// root) and the files it tombstoned (compaction/vacuum).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub version: u64,
    pub added_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub committed_at_ts_us: i64,
}

pub struct TransactionLog {
    root: StorageLocation,
    table: String,
}

impl TransactionLog {
    pub fn new(root: StorageLocation, table: impl Into<String>) -> Self {
        Self {
            root,
            table: table.into(),
        }
    }

    fn log_path(&self, version: u64) -> String {
        format!("_log/{}/{version:020}.json", self.table)
    }

    /// The latest committed version, or `0` if the table has never been
    /// written to.
    pub async fn latest_version(&self) -> PointlineResult<u64> {
        let prefix = format!("_log/{}/", self.table);
        let entries = self.root.list(&prefix).await?;
        Ok(entries
            .iter()
            .filter_map(|p| p.rsplit('/').next())
            .filter_map(|name| name.strip_suffix(".json"))
            .filter_map(|stem| stem.parse::<u64>().ok())
            .max()
            .unwrap_or(0))
    }

    /// Every record committed at a version `<= as_of_version` (or the latest
    /// version if `None`), in commit order — the table's snapshot (§4.3
    /// `snapshot_read`).
    pub async fn records_as_of(&self, as_of_version: Option<u64>) -> PointlineResult<Vec<LogRecord>> {
        let ceiling = match as_of_version {
            Some(v) => v,
            None => self.latest_version().await?,
        };
        let prefix = format!("_log/{}/", self.table);
        let mut paths = self.root.list(&prefix).await?;
        paths.sort();
        let mut records = Vec::new();
        for path in paths {
            let Some(name) = path.rsplit('/').next() else { continue };
            let Some(stem) = name.strip_suffix(".json") else { continue };
            let Ok(version) = stem.parse::<u64>() else { continue };
            if version > ceiling || version == 0 {
                continue;
            }
            let bytes = self.root.get(&path).await?;
            let record: LogRecord = serde_json::from_slice(&bytes).map_err(IoError::Json)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Commit `added_files`/`removed_files` as the next version after
    /// `expected_version`. Fails with [`ConflictError::StorageLog`] if
    /// another writer committed in the meantime — the caller must re-read
    /// and retry (§4.3 "the log write fails with Conflict").
    pub async fn commit(
        &self,
        expected_version: u64,
        added_files: Vec<String>,
        removed_files: Vec<String>,
        now_ts_us: i64,
    ) -> PointlineResult<u64> {
        let latest = self.latest_version().await?;
        if latest != expected_version {
            return Err(ConflictError::StorageLog {
                table: self.table.clone(),
                expected: expected_version,
                current: latest,
            }
            .into());
        }
        let next_version = expected_version + 1;
        let record = LogRecord {
            version: next_version,
            added_files,
            removed_files,
            committed_at_ts_us: now_ts_us,
        };
        let bytes = serde_json::to_vec_pretty(&record).map_err(IoError::Json)?;
        let created = self
            .root
            .put_if_absent(&self.log_path(next_version), bytes.into())
            .await?;
        if !created {
            return Err(ConflictError::StorageLog {
                table: self.table.clone(),
                expected: expected_version,
                current: next_version,
            }
            .into());
        }
        Ok(next_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_then_read_snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let root = StorageLocation::local(dir.path()).unwrap();
        let log = TransactionLog::new(root, "trades");

        assert_eq!(log.latest_version().await.unwrap(), 0);
        let v1 = log
            .commit(0, vec!["venue=x/trading_date=2024-01-01/part-a.parquet".into()], vec![], 1_000)
            .await
            .unwrap();
        assert_eq!(v1, 1);

        let records = log.records_as_of(None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].added_files.len(), 1);
    }

    #[tokio::test]
    async fn stale_commit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = StorageLocation::local(dir.path()).unwrap();
        let log = TransactionLog::new(root, "trades");
        log.commit(0, vec!["a.parquet".into()], vec![], 1_000).await.unwrap();

        let err = log.commit(0, vec!["b.parquet".into()], vec![], 2_000).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::PointlineError::Conflict(ConflictError::StorageLog { .. })
        ));
    }
}
