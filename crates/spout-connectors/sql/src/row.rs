//! Row to JSON conversion.
//!
//! Columns are decoded by their database type name. Values JSON cannot hold
//! exactly are rendered as strings: decimals keep their digits, timestamps use
//! ISO-8601, binary columns are base64. Rows come from the text protocol, so
//! any other type is forwarded as the server's text rendering.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Map, Value};
use spout_core::{bytes_to_value, Error, Record, Result};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgRow, PgValueFormat};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Row, TypeInfo, ValueRef};

type DecodeResult = std::result::Result<Value, sqlx::Error>;

/// Convert a PostgreSQL row into a JSON object keyed by column name
pub fn pg_row_to_json(row: &PgRow) -> Result<Record> {
    let mut object = Map::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_pg_column(row, column.ordinal(), column.type_info().name())
            .map_err(|e| {
                Error::Query(format!("Failed to decode column '{}': {}", column.name(), e))
            })?;
        object.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(object))
}

/// Convert a MySQL row into a JSON object keyed by column name
pub fn mysql_row_to_json(row: &MySqlRow) -> Result<Record> {
    let mut object = Map::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_mysql_column(row, column.ordinal(), column.type_info().name())
            .map_err(|e| {
                Error::Query(format!("Failed to decode column '{}': {}", column.name(), e))
            })?;
        object.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(object))
}

fn decode_pg_column(row: &PgRow, index: usize, type_name: &str) -> DecodeResult {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => json!(row.try_get::<i16, _>(index)?),
        "INT4" => json!(row.try_get::<i32, _>(index)?),
        "INT8" => json!(row.try_get::<i64, _>(index)?),
        "FLOAT4" => json!(row.try_get::<f32, _>(index)?),
        "FLOAT8" => json!(row.try_get::<f64, _>(index)?),
        "NUMERIC" => Value::String(row.try_get::<Decimal, _>(index)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        "UUID" => Value::String(row.try_get::<Uuid, _>(index)?.to_string()),
        "OID" => json!(row.try_get::<Oid, _>(index)?.0),
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "TIMESTAMP" => Value::String(iso_datetime(row.try_get::<NaiveDateTime, _>(index)?)),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "BYTEA" => Value::String(BASE64.encode(row.try_get::<Vec<u8>, _>(index)?)),
        "BOOL[]" => json!(row.try_get::<Vec<bool>, _>(index)?),
        "INT2[]" => json!(row.try_get::<Vec<i16>, _>(index)?),
        "INT4[]" => json!(row.try_get::<Vec<i32>, _>(index)?),
        "INT8[]" => json!(row.try_get::<Vec<i64>, _>(index)?),
        "FLOAT8[]" => json!(row.try_get::<Vec<f64>, _>(index)?),
        "TEXT[]" | "VARCHAR[]" => json!(row.try_get::<Vec<String>, _>(index)?),
        // TEXT, VARCHAR, INTERVAL, INET, MONEY, enum labels, other arrays...
        _ => pg_text(row, index)?,
    };
    Ok(value)
}

fn pg_text(row: &PgRow, index: usize) -> DecodeResult {
    let raw = row.try_get_raw(index)?;
    if matches!(raw.format(), PgValueFormat::Binary) {
        return Err(sqlx::Error::Decode(
            format!("no decoder for binary {} values", raw.type_info().name()).into(),
        ));
    }
    Ok(Value::String(row.try_get_unchecked::<String, _>(index)?))
}

fn decode_mysql_column(row: &MySqlRow, index: usize, type_name: &str) -> DecodeResult {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            json!(row.try_get::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => json!(row.try_get::<u64, _>(index)?),
        "FLOAT" => json!(row.try_get::<f32, _>(index)?),
        "DOUBLE" => json!(row.try_get::<f64, _>(index)?),
        "DECIMAL" => Value::String(row.try_get::<Decimal, _>(index)?.to_string()),
        "JSON" => row.try_get::<Value, _>(index)?,
        "TIMESTAMP" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "DATETIME" => Value::String(iso_datetime(row.try_get::<NaiveDateTime, _>(index)?)),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "YEAR" => json!(row.try_get_unchecked::<u16, _>(index)?),
        "BIT" => json!(bit_value(&row.try_get_unchecked::<Vec<u8>, _>(index)?)),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::String(BASE64.encode(row.try_get::<Vec<u8>, _>(index)?))
        }
        // CHAR, VARCHAR, TEXT, ENUM, SET, GEOMETRY
        _ => bytes_to_value(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

/// BIT(n) arrives as big-endian bytes
fn bit_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn iso_datetime(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}
