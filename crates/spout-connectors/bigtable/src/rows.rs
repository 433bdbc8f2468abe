use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use spout_core::{bytes_to_text, Error, RecordBatch, Result};
use std::collections::BTreeMap;

/// One message of a `readRows` response stream
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRowsResponse {
    #[serde(default)]
    pub chunks: Vec<CellChunk>,
}

/// A piece of a cell. Row key, family and qualifier are only present when
/// they change; a value may be split across several chunks.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellChunk {
    pub row_key: Option<String>,
    pub family_name: Option<String>,
    pub qualifier: Option<String>,
    pub timestamp_micros: Option<Value>,
    pub value: Option<String>,
    pub value_size: i64,
    pub reset_row: bool,
    pub commit_row: bool,
}

type Cells = BTreeMap<String, BTreeMap<String, Vec<Value>>>;

/// Reassembles committed rows from a sequence of cell chunks.
///
/// Each row comes out as
/// `{"key": ..., "cells": {family: {qualifier: [{"timestamp_micros", "value"}]}}}`
/// with cell values base64 encoded. Row keys and qualifiers are text when
/// they are valid UTF-8 and base64 otherwise.
#[derive(Debug, Default)]
pub struct RowMerger {
    rows: RecordBatch,
    key: Option<Vec<u8>>,
    family: Option<String>,
    qualifier: Option<String>,
    timestamp: i64,
    value: Vec<u8>,
    cells: Cells,
}

impl RowMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: CellChunk) -> Result<()> {
        if chunk.reset_row {
            self.reset_row();
            return Ok(());
        }

        if let Some(key) = chunk.row_key {
            let key = decode(&key, "row key")?;
            if self.key.as_ref().is_some_and(|current| *current != key) {
                return Err(Error::Query(
                    "New row key before the previous row was committed".to_string(),
                ));
            }
            self.key = Some(key);
        }
        if self.key.is_none() {
            return Err(Error::Query("Cell chunk without a row key".to_string()));
        }

        if let Some(family) = chunk.family_name {
            self.family = Some(family);
        }
        if let Some(qualifier) = chunk.qualifier {
            let qualifier = decode(&qualifier, "qualifier")?;
            self.qualifier = Some(bytes_to_text(qualifier));
        }
        if let Some(timestamp) = chunk.timestamp_micros {
            self.timestamp = parse_timestamp(&timestamp)?;
        }
        if let Some(value) = chunk.value {
            self.value.extend(decode(&value, "value")?);
        }

        // A positive value_size means more pieces of this value follow
        if chunk.value_size == 0 {
            self.finish_cell()?;
        }
        if chunk.commit_row {
            self.commit_row();
        }
        Ok(())
    }

    /// Committed rows so far; fails when the stream stopped inside a row
    pub fn finish(self) -> Result<RecordBatch> {
        if self.key.is_some() {
            return Err(Error::Query(
                "Response ended before the last row was committed".to_string(),
            ));
        }
        Ok(self.rows)
    }

    fn finish_cell(&mut self) -> Result<()> {
        let (Some(family), Some(qualifier)) = (&self.family, &self.qualifier) else {
            return Err(Error::Query(
                "Cell chunk without family or qualifier".to_string(),
            ));
        };

        let value = std::mem::take(&mut self.value);
        let timestamp = std::mem::take(&mut self.timestamp);
        self.cells
            .entry(family.clone())
            .or_default()
            .entry(qualifier.clone())
            .or_default()
            .push(json!({
                "timestamp_micros": timestamp,
                "value": BASE64.encode(value),
            }));
        Ok(())
    }

    fn commit_row(&mut self) {
        let key = self.key.take().unwrap_or_default();
        let cells: Map<String, Value> = std::mem::take(&mut self.cells)
            .into_iter()
            .map(|(family, columns)| (family, json!(columns)))
            .collect();

        self.rows.push(json!({
            "key": bytes_to_text(key),
            "cells": cells,
        }));
        self.family = None;
        self.qualifier = None;
        self.timestamp = 0;
    }

    fn reset_row(&mut self) {
        self.key = None;
        self.family = None;
        self.qualifier = None;
        self.timestamp = 0;
        self.value.clear();
        self.cells.clear();
    }
}

fn decode(encoded: &str, what: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| Error::Query(format!("Invalid base64 {}: {}", what, e)))
}

// int64 fields arrive as JSON strings
fn parse_timestamp(value: &Value) -> Result<i64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
    .ok_or_else(|| Error::Query(format!("Invalid timestampMicros: {}", value)))
}
