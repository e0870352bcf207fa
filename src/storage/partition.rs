//! Partition path derivation and pruning (§4.3, §6). Event tables are laid
//! out `<table>/venue=<venue>/trading_date=<YYYY-MM-DD>/part-<uuid>.parquet`;
//! unpartitioned tables (registry, manifest, quarantine) skip the middle
//! segments entirely.

use chrono::NaiveDate;

/// One partition key for an event table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub venue: String,
    pub trading_date: NaiveDate,
}

impl PartitionKey {
    pub fn path_segment(&self) -> String {
        format!("venue={}/trading_date={}", self.venue, self.trading_date.format("%Y-%m-%d"))
    }
}

/// The relative directory a partition's data files live under, rooted at the
/// table's own directory.
pub fn partition_dir(table: &str, key: Option<&PartitionKey>) -> String {
    match key {
        Some(key) => format!("{table}/{}", key.path_segment()),
        None => table.to_string(),
    }
}

/// A fresh, content-independent file name for one written file (§6:
/// `part-<uuid>.col`).
pub fn new_part_file_name() -> String {
    format!("part-{}.parquet", uuid::Uuid::new_v4())
}

/// A predicate over partition keys, used to prune files before any row is
/// read (§4.3 `snapshot_read` "filtered by partition predicates first").
pub struct PartitionPredicate {
    pub venue: Option<String>,
    pub trading_date_from: Option<NaiveDate>,
    pub trading_date_to: Option<NaiveDate>,
}

impl PartitionPredicate {
    pub fn all() -> Self {
        Self {
            venue: None,
            trading_date_from: None,
            trading_date_to: None,
        }
    }

    pub fn matches(&self, key: &PartitionKey) -> bool {
        if let Some(venue) = &self.venue {
            if venue != &key.venue {
                return false;
            }
        }
        if let Some(from) = self.trading_date_from {
            if key.trading_date < from {
                return false;
            }
        }
        if let Some(to) = self.trading_date_to {
            if key.trading_date > to {
                return false;
            }
        }
        true
    }
}

/// Parse a partition key back out of a relative file path produced by
/// [`partition_dir`] + [`new_part_file_name`].
pub fn parse_partition_from_path(path: &str) -> Option<PartitionKey> {
    let mut venue = None;
    let mut trading_date = None;
    for segment in path.split('/') {
        if let Some(v) = segment.strip_prefix("venue=") {
            venue = Some(v.to_string());
        } else if let Some(d) = segment.strip_prefix("trading_date=") {
            trading_date = NaiveDate::parse_from_str(d, "%Y-%m-%d").ok();
        }
    }
    Some(PartitionKey {
        venue: venue?,
        trading_date: trading_date?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segment_formats_as_hive_style() {
        let key = PartitionKey {
            venue: "binance".into(),
            trading_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        };
        assert_eq!(key.path_segment(), "venue=binance/trading_date=2024-03-05");
    }

    #[test]
    fn round_trips_through_partition_dir() {
        let key = PartitionKey {
            venue: "okx".into(),
            trading_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        let dir = partition_dir("trades", Some(&key));
        let file = new_part_file_name();
        let full = format!("{dir}/{file}");
        let parsed = parse_partition_from_path(&full).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn predicate_prunes_by_venue_and_date_range() {
        let key = PartitionKey {
            venue: "binance".into(),
            trading_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        };
        let pred = PartitionPredicate {
            venue: Some("binance".into()),
            trading_date_from: Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            trading_date_to: Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
        };
        assert!(pred.matches(&key));

        let other_venue = PartitionPredicate {
            venue: Some("okx".into()),
            ..PartitionPredicate::all()
        };
        assert!(!other_venue.matches(&key));
    }
}
