//! In-memory warehouse for tests and dry runs

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::error::WarehouseError;
use crate::schema::Schema;
use crate::{Row, RowError, Warehouse};

#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

/// Scripted outcome for an upcoming insert call
#[derive(Debug, Clone)]
enum InsertFault {
    /// Whole batch fails with a request error
    Fail,
    /// Batch is accepted except for the listed row indices
    RejectRows(Vec<usize>),
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, MemoryTable>,
    create_calls: usize,
    insert_calls: usize,
    faults: VecDeque<InsertFault>,
    fail_create: bool,
}

/// Thread-safe warehouse holding tables in a map.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    inner: Mutex<Inner>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panicked test thread must not hide the data from assertions
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next insert call fail entirely.
    pub fn fail_next_insert(&self) {
        self.lock().faults.push_back(InsertFault::Fail);
    }

    /// Make the next `create_table` call fail.
    pub fn fail_next_create(&self) {
        self.lock().fail_create = true;
    }

    /// Make the next insert call reject the given row indices.
    pub fn reject_rows_in_next_insert(&self, indices: Vec<usize>) {
        self.lock().faults.push_back(InsertFault::RejectRows(indices));
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.lock().tables.get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    pub fn rows(&self, name: &str) -> Vec<Row> {
        self.table(name).map(|t| t.rows).unwrap_or_default()
    }

    /// Number of successful `create_table` calls
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }
}

impl Warehouse for MemoryWarehouse {
    fn table_exists(&self, table: &str) -> Result<bool, WarehouseError> {
        Ok(self.lock().tables.contains_key(table))
    }

    fn create_table(&self, table: &str, schema: &Schema) -> Result<(), WarehouseError> {
        let mut inner = self.lock();
        if std::mem::take(&mut inner.fail_create) {
            return Err(WarehouseError::Request("injected failure".to_string()));
        }
        if inner.tables.contains_key(table) {
            return Err(WarehouseError::AlreadyExists(table.to_string()));
        }
        inner.tables.insert(
            table.to_string(),
            MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            },
        );
        inner.create_calls += 1;
        Ok(())
    }

    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<Vec<RowError>, WarehouseError> {
        let mut inner = self.lock();
        inner.insert_calls += 1;
        let fault = inner.faults.pop_front();
        let Some(target) = inner.tables.get_mut(table) else {
            return Err(WarehouseError::TableNotFound(table.to_string()));
        };

        let rejected = match fault {
            Some(InsertFault::Fail) => {
                return Err(WarehouseError::Request("injected failure".to_string()));
            }
            Some(InsertFault::RejectRows(indices)) => indices,
            None => Vec::new(),
        };

        let mut errors = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if rejected.contains(&index) {
                errors.push(RowError {
                    index,
                    message: "injected rejection".to_string(),
                });
            } else {
                target.rows.push(row.clone());
            }
        }
        Ok(errors)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
