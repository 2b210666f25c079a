//! Batch loader: lazily create the destination table and insert rows in chunks

use std::sync::Arc;

use hubline_warehouse::{Schema, Warehouse, WarehouseError};

use crate::record::RemoteRecord;
use crate::transform::to_row;

/// Default rows per insert call
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Outcome of loading one page of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub inserted: usize,
    pub failed_rows: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed_rows == 0 && self.failed_batches == 0
    }
}

pub struct BatchLoader {
    warehouse: Arc<dyn Warehouse>,
    batch_size: usize,
}

impl std::fmt::Debug for BatchLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("warehouse", &self.warehouse.describe())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl BatchLoader {
    pub fn new(warehouse: Arc<dyn Warehouse>, batch_size: usize) -> Self {
        Self {
            warehouse,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Create `table` if it does not exist yet. Idempotent.
    ///
    /// Two processes creating the same table concurrently is not guarded
    /// against; the loser's `AlreadyExists` is treated as success.
    pub fn ensure_table(&self, table: &str, schema: &Schema) -> Result<(), WarehouseError> {
        if self.warehouse.table_exists(table)? {
            log::info!("Table {table} already exists");
            return Ok(());
        }
        match self.warehouse.create_table(table, schema) {
            Ok(()) => {
                log::info!(
                    "Created table {table} with {} columns in {}",
                    schema.len(),
                    self.warehouse.describe()
                );
                Ok(())
            }
            Err(WarehouseError::AlreadyExists(_)) => {
                log::debug!("Table {table} appeared concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Insert `records` into `table`, one warehouse call per batch.
    ///
    /// Best effort: a failing batch is logged and counted, later batches still run.
    pub fn load(&self, table: &str, schema: &Schema, records: &[RemoteRecord]) -> LoadReport {
        let rows: Vec<_> = records.iter().map(|r| to_row(r, schema)).collect();
        let mut report = LoadReport {
            rows: rows.len(),
            ..Default::default()
        };

        for batch in rows.chunks(self.batch_size) {
            report.batches += 1;
            match self.warehouse.insert_rows(table, batch) {
                Ok(errors) if errors.is_empty() => {
                    report.inserted += batch.len();
                    log::debug!("Inserted {} rows into {table}", batch.len());
                }
                Ok(errors) => {
                    let failed = errors.len().min(batch.len());
                    report.failed_rows += failed;
                    report.inserted += batch.len() - failed;
                    report.failed_batches += 1;
                    log::error!(
                        "Errors while inserting rows into {table}: {failed}/{} rejected",
                        batch.len()
                    );
                    for err in errors.iter().take(5) {
                        log::error!("  {err}");
                    }
                }
                Err(e) => {
                    report.failed_rows += batch.len();
                    report.failed_batches += 1;
                    log::error!("Batch insert into {table} failed: {e}");
                }
            }
        }
        report
    }
}
