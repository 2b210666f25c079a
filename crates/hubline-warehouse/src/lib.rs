//! Hubline Warehouse - destination tables for CRM records
//!
//! Schema inference from dynamic property maps, a narrow [`Warehouse`]
//! trait, and two implementations: BigQuery (production) and in-memory
//! (tests and dry runs).

pub mod bigquery;
pub mod error;
pub mod memory;
pub mod scalar;
pub mod schema;

use serde_json::{Map, Value};

pub use bigquery::{BigQueryConfig, BigQueryWarehouse};
pub use error::WarehouseError;
pub use memory::MemoryWarehouse;
pub use scalar::{Properties, Scalar};
pub use schema::{Column, ColumnType, MAX_COLUMN_NAME_LENGTH, Schema, infer, truncate_name};

/// One row destined for a table: column name → JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Best-effort deduplication key passed to the warehouse
    pub insert_id: Option<String>,
    pub values: Map<String, Value>,
}

/// Per-row rejection reported by a batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Index of the row within the submitted batch
    pub index: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.index, self.message)
    }
}

/// Table store addressed by table name within a fixed dataset.
///
/// Calls block; implementations backed by async clients drive them on
/// the shared runtime.
pub trait Warehouse: Send + Sync {
    fn table_exists(&self, table: &str) -> Result<bool, WarehouseError>;

    fn create_table(&self, table: &str, schema: &Schema) -> Result<(), WarehouseError>;

    /// Insert one batch. `Ok` carries per-row errors (empty = full success).
    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<Vec<RowError>, WarehouseError>;

    /// Human-readable destination, e.g. `project.dataset`
    fn describe(&self) -> String;
}
