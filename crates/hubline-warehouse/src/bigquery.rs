//! Google BigQuery warehouse via `tables.get`, `tables.insert` and
//! `tabledata.insertAll`.
//!
//! # Authentication
//!
//! 1. **Service account key file** - via `credentials_file`
//! 2. **Application Default Credentials (ADC)** - when no file is configured

use std::path::PathBuf;

use gcp_bigquery_client::Client;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::field_type::FieldType;
use gcp_bigquery_client::model::table::Table;
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;
use gcp_bigquery_client::model::table_schema::TableSchema;
use hubline_core::SHARED_RUNTIME;

use crate::error::WarehouseError;
use crate::schema::{ColumnType, Schema};
use crate::{Row, RowError, Warehouse};

/// Destination coordinates and credentials
#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    pub project_id: String,
    pub dataset_id: String,
    /// Service account key JSON; `None` uses ADC
    pub credentials_file: Option<PathBuf>,
}

pub struct BigQueryWarehouse {
    client: Client,
    project_id: String,
    dataset_id: String,
}

impl std::fmt::Debug for BigQueryWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryWarehouse")
            .field("project_id", &self.project_id)
            .field("dataset_id", &self.dataset_id)
            .finish_non_exhaustive()
    }
}

impl BigQueryWarehouse {
    /// Build an authenticated client.
    pub fn connect(config: &BigQueryConfig) -> Result<Self, WarehouseError> {
        let client = SHARED_RUNTIME.handle().block_on(async {
            match &config.credentials_file {
                Some(path) => {
                    let path = path.to_string_lossy();
                    Client::from_service_account_key_file(&path)
                        .await
                        .map_err(|e| {
                            WarehouseError::Connection(format!(
                                "failed to load service account key '{path}': {e}"
                            ))
                        })
                }
                None => Client::from_application_default_credentials()
                    .await
                    .map_err(|e| {
                        WarehouseError::Connection(format!(
                            "failed to use application default credentials: {e}"
                        ))
                    }),
            }
        })?;
        log::debug!(
            "BigQuery client ready for {}.{}",
            config.project_id,
            config.dataset_id
        );
        Ok(Self {
            client,
            project_id: config.project_id.clone(),
            dataset_id: config.dataset_id.clone(),
        })
    }

    fn field_type(column_type: ColumnType) -> FieldType {
        match column_type {
            ColumnType::String => FieldType::String,
            ColumnType::Int64 => FieldType::Int64,
            ColumnType::Float64 => FieldType::Float64,
            ColumnType::Timestamp => FieldType::Timestamp,
        }
    }

    fn table_schema(schema: &Schema) -> TableSchema {
        let fields = schema
            .columns()
            .iter()
            .map(|c| {
                let mut field = TableFieldSchema::new(&c.name, Self::field_type(c.column_type));
                field.mode = Some(if c.nullable { "NULLABLE" } else { "REQUIRED" }.to_string());
                field
            })
            .collect();
        TableSchema::new(fields)
    }

    /// Map a `tables.insert` failure; 409 means another writer created it first.
    fn create_error(table: &str, err: BQError) -> WarehouseError {
        match err {
            BQError::ResponseError { error } if error.error.code == 409 => {
                WarehouseError::AlreadyExists(table.to_string())
            }
            e => WarehouseError::Request(format!("create table {table}: {e}")),
        }
    }

    /// Extract `(index, message)` from an insertAll error entry.
    fn row_error(entry: serde_json::Value) -> RowError {
        let index = entry
            .get("index")
            .and_then(|v| v.as_u64())
            .unwrap_or_default() as usize;
        let message = entry
            .get("errors")
            .map(|v| v.to_string())
            .unwrap_or_else(|| entry.to_string());
        RowError { index, message }
    }
}

impl Warehouse for BigQueryWarehouse {
    fn table_exists(&self, table: &str) -> Result<bool, WarehouseError> {
        let result = SHARED_RUNTIME.handle().block_on(self.client.table().get(
            &self.project_id,
            &self.dataset_id,
            table,
            None,
        ));
        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                // Any lookup failure is treated as absence; creation reports real faults
                log::debug!("Table {table} lookup failed, treating as absent: {e}");
                Ok(false)
            }
        }
    }

    fn create_table(&self, table: &str, schema: &Schema) -> Result<(), WarehouseError> {
        let definition = Table::new(
            &self.project_id,
            &self.dataset_id,
            table,
            Self::table_schema(schema),
        );
        SHARED_RUNTIME
            .handle()
            .block_on(self.client.table().create(definition))
            .map_err(|e| Self::create_error(table, e))?;
        Ok(())
    }

    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<Vec<RowError>, WarehouseError> {
        let mut request = TableDataInsertAllRequest::new();
        for row in rows {
            request
                .add_row(row.insert_id.clone(), &row.values)
                .map_err(|e| WarehouseError::Serialization(e.to_string()))?;
        }

        let response = SHARED_RUNTIME
            .handle()
            .block_on(self.client.tabledata().insert_all(
                &self.project_id,
                &self.dataset_id,
                table,
                request,
            ))
            .map_err(|e| WarehouseError::Request(format!("insertAll {table}: {e}")))?;

        let errors = response
            .insert_errors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .map(Self::row_error)
            .collect();
        Ok(errors)
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.project_id, self.dataset_id)
    }
}
