//! RemoteRecord → warehouse Row

use chrono::{SecondsFormat, Utc};
use hubline_warehouse::schema::{CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use hubline_warehouse::{ColumnType, Row, Scalar, Schema};
use serde_json::{Map, Value};

use crate::record::{RemoteRecord, parse_timestamp};

/// Normalize a source timestamp to UTC RFC 3339; unparsable values become null.
pub fn normalize_timestamp(raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match parse_timestamp(raw) {
        Some(ts) => Value::String(
            ts.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        None => {
            log::warn!("Unparsable timestamp {raw:?}, storing null");
            Value::Null
        }
    }
}

/// Coerce a property value to the column's fixed type; mismatches become null.
pub fn coerce(value: &Scalar, column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::String => value.to_text().map_or(Value::Null, Value::String),
        ColumnType::Int64 => value.to_int().map_or(Value::Null, Value::from),
        ColumnType::Float64 => value.to_float().map_or(Value::Null, Value::from),
        ColumnType::Timestamp => match value {
            Scalar::String(s) => normalize_timestamp(Some(s)),
            _ => Value::Null,
        },
    }
}

/// Build the row for `record`: prefix fields plus one entry per property column.
///
/// Properties absent from the record, or not present in the schema, are
/// respectively null-filled and dropped.
pub fn to_row(record: &RemoteRecord, schema: &Schema) -> Row {
    let mut values = Map::with_capacity(schema.len());
    values.insert(ID_COLUMN.to_string(), Value::String(record.id.clone()));
    values.insert(
        CREATED_AT_COLUMN.to_string(),
        normalize_timestamp(record.created_at.as_deref()),
    );
    values.insert(
        UPDATED_AT_COLUMN.to_string(),
        normalize_timestamp(record.updated_at.as_deref()),
    );

    for column in schema.property_columns() {
        let value = column
            .source_key
            .as_deref()
            .and_then(|key| record.properties.get(key))
            .map_or(Value::Null, |v| coerce(v, column.column_type));
        values.insert(column.name.clone(), value);
    }

    // Same object version → same insert id, so replays deduplicate best-effort
    let insert_id = Some(match &record.updated_at {
        Some(ts) => format!("{}:{ts}", record.id),
        None => record.id.clone(),
    });

    Row { insert_id, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubline_warehouse::infer;
    use serde_json::json;

    fn record(value: Value) -> RemoteRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn example_record_row() {
        let rec = record(json!({
            "id": "1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "properties": {"email": "a@b.com", "score": 5}
        }));
        let schema = infer(&rec.properties);
        let row = to_row(&rec, &schema);
        assert_eq!(
            Value::Object(row.values),
            json!({
                "id": "1",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-02T00:00:00Z",
                "email": "a@b.com",
                "score": 5
            })
        );
        assert_eq!(row.insert_id.as_deref(), Some("1:2024-01-02T00:00:00Z"));
    }

    #[test]
    fn missing_properties_become_null() {
        let first = record(json!({"id": "1", "properties": {"email": "a@b.com", "score": 5}}));
        let schema = infer(&first.properties);
        let later = record(json!({"id": "2", "properties": {"email": "c@d.com", "extra": "x"}}));
        let row = to_row(&later, &schema);
        assert_eq!(row.values["score"], Value::Null);
        assert!(!row.values.contains_key("extra"));
        assert_eq!(row.values["createdAt"], Value::Null);
        assert_eq!(row.insert_id.as_deref(), Some("2"));
    }

    #[test]
    fn later_shapes_are_coerced_not_widened() {
        let first = record(json!({"id": "1", "properties": {"score": 5, "ratio": 1.5, "name": "n"}}));
        let schema = infer(&first.properties);
        let later = record(json!({
            "id": "2",
            "properties": {"score": "7", "ratio": "oops", "name": 12}
        }));
        let row = to_row(&later, &schema);
        assert_eq!(row.values["score"], json!(7));
        assert_eq!(row.values["ratio"], Value::Null);
        assert_eq!(row.values["name"], json!("12"));
    }

    #[test]
    fn truncated_column_filled_from_source_key() {
        let long = "k".repeat(80);
        let mut props = serde_json::Map::new();
        props.insert(long.clone(), json!("v"));
        let rec = record(json!({"id": "1", "properties": props}));
        let schema = infer(&rec.properties);
        let row = to_row(&rec, &schema);
        assert_eq!(row.values[&long[..63]], json!("v"));
        assert!(!row.values.contains_key(&long));
    }

    #[test]
    fn timestamps_normalized_to_utc() {
        assert_eq!(
            normalize_timestamp(Some("2024-01-02T01:00:00+02:00")),
            json!("2024-01-01T23:00:00Z")
        );
        assert_eq!(
            normalize_timestamp(Some("2024-01-02T00:00:00.123Z")),
            json!("2024-01-02T00:00:00.123Z")
        );
        assert_eq!(normalize_timestamp(Some("yesterday")), Value::Null);
        assert_eq!(normalize_timestamp(None), Value::Null);
    }

    #[test]
    fn coerce_matrix() {
        assert_eq!(coerce(&Scalar::Bool(true), ColumnType::String), json!("true"));
        assert_eq!(coerce(&Scalar::Null, ColumnType::String), Value::Null);
        assert_eq!(coerce(&Scalar::Int(3), ColumnType::Float64), json!(3.0));
        assert_eq!(coerce(&Scalar::Bool(true), ColumnType::Int64), Value::Null);
    }
}
