//! Destination table schema and single-sample inference

use std::collections::HashSet;

use crate::scalar::{Properties, Scalar};

/// Maximum column identifier length accepted by the warehouse
pub const MAX_COLUMN_NAME_LENGTH: usize = 63;

/// Fixed prefix column names
pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "createdAt";
pub const UPDATED_AT_COLUMN: &str = "updatedAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Int64,
    Float64,
    Timestamp,
}

impl ColumnType {
    /// Warehouse type name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    /// Classify a sample value. Anything that is not a string or number maps to STRING.
    pub fn classify(sample: &Scalar) -> Self {
        match sample {
            Scalar::String(_) => Self::String,
            Scalar::Int(_) => Self::Int64,
            Scalar::Float(_) => Self::Float64,
            Scalar::Bool(_) | Scalar::Null | Scalar::Other(_) => Self::String,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Destination column name (already truncated)
    pub name: String,
    /// Source property key the column is filled from; `None` for prefix columns
    pub source_key: Option<String>,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    fn prefix(name: &str, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            source_key: None,
            column_type,
            nullable,
        }
    }
}

/// Ordered column list: fixed prefix followed by inferred property columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Schema holding only the fixed prefix `{id, createdAt, updatedAt}`.
    pub fn prefix_only() -> Self {
        Self {
            columns: vec![
                Column::prefix(ID_COLUMN, ColumnType::String, false),
                Column::prefix(CREATED_AT_COLUMN, ColumnType::Timestamp, true),
                Column::prefix(UPDATED_AT_COLUMN, ColumnType::Timestamp, true),
            ],
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns filled from record properties (everything after the prefix).
    pub fn property_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.source_key.is_some())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Truncate a column name to [`MAX_COLUMN_NAME_LENGTH`] characters.
pub fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_COLUMN_NAME_LENGTH).collect()
}

/// Infer a table schema from one sample record's properties.
///
/// Single-sample heuristic: later records are coerced to these types, never
/// used to widen the schema. Names that collide after truncation keep the
/// first occurrence in source order.
pub fn infer(sample: &Properties) -> Schema {
    let mut schema = Schema::prefix_only();
    let mut seen: HashSet<String> = schema.columns.iter().map(|c| c.name.clone()).collect();

    for (key, value) in sample {
        let name = truncate_name(key);
        if name.chars().count() > MAX_COLUMN_NAME_LENGTH {
            continue;
        }
        if !seen.insert(name.clone()) {
            log::debug!("Skipping property {key:?}: column {name:?} already defined");
            continue;
        }
        schema.columns.push(Column {
            name,
            source_key: Some(key.clone()),
            column_type: ColumnType::classify(value),
            nullable: true,
        });
    }
    schema
}
