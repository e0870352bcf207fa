//! Schema & Encoding (C1, §4.1).
//!
//! A [`TableSpec`] is the single source of truth for one canonical table:
//! its columns, its partition key, and the tie-break order every writer and
//! reader must agree on. The catalog of tables is closed at build time —
//! [`catalog::table_spec`] is the only way to look one up, and it never
//! returns a table the engine doesn't know how to write or read.

pub mod catalog;
pub mod encoding;

use polars::prelude::{DataType, Field, Schema};

/// Logical type of a column, independent of its physical polars encoding.
/// Scaled prices/quantities are always [`LogicalType::I64`] with a non-`None`
/// [`ColumnSpec::scale`] — floating point never appears in a persisted
/// price or quantity column (§3.2 invariant 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    I64,
    U32,
    F64,
    Bool,
    Utf8,
    /// Calendar date, used only for the `trading_date` partition column.
    Date,
}

impl LogicalType {
    pub fn to_polars(self) -> DataType {
        match self {
            LogicalType::I64 => DataType::Int64,
            LogicalType::U32 => DataType::UInt32,
            LogicalType::F64 => DataType::Float64,
            LogicalType::Bool => DataType::Boolean,
            LogicalType::Utf8 => DataType::String,
            LogicalType::Date => DataType::Date,
        }
    }
}

/// The scale factor applied to a fixed-point column (§3.3). `decode(x) = x as
/// f64 / factor`. The lot-based Chinese-equity scale and the crypto `S = 10^9`
/// scale share this shape but carry different factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub factor: i64,
}

impl Scale {
    /// `S = 10^9`, the canonical crypto price/quantity scale (§3.3).
    pub const CRYPTO: Scale = Scale { factor: 1_000_000_000 };

    /// Chinese-equity prices are quoted in ticks of 0.01 currency units;
    /// encoding to integer ticks needs only a factor of 100.
    pub const CN_EQUITY_TICK: Scale = Scale { factor: 100 };

    pub fn encode(self, value: f64) -> Option<i64> {
        encoding::encode(value, self)
    }

    pub fn decode(self, value: i64) -> f64 {
        encoding::decode(value, self)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: LogicalType,
    pub nullable: bool,
    pub scale: Option<Scale>,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, ty: LogicalType, nullable: bool) -> Self {
        Self {
            name,
            ty,
            nullable,
            scale: None,
        }
    }

    pub const fn scaled(name: &'static str, nullable: bool, scale: Scale) -> Self {
        Self {
            name,
            ty: LogicalType::I64,
            nullable,
            scale: Some(scale),
        }
    }

    pub fn to_field(&self) -> Field {
        Field::new(self.name.into(), self.ty.to_polars())
    }
}

/// One canonical table: its columns in declared order, its partition key (by
/// column name, in partition-path order), and its tie-break total order.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: Vec<ColumnSpec>,
    pub partition_columns: Vec<&'static str>,
    pub tie_break_keys: Vec<&'static str>,
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Whether this table is partitioned by `(venue, trading_date)`, i.e. an
    /// event table rather than registry/manifest/quarantine (§4.3).
    pub fn is_partitioned(&self) -> bool {
        !self.partition_columns.is_empty()
    }

    pub fn polars_schema(&self) -> Schema {
        Schema::from_iter(self.columns.iter().map(ColumnSpec::to_field))
    }

    /// The ordered timestamp-column-based tie-break expression columns,
    /// always ending in a lineage pair for deterministic total order (§4.8).
    pub fn tie_break(&self) -> &[&'static str] {
        &self.tie_break_keys
    }
}
