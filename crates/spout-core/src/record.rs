use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;

/// A single fetched record: a row, a key-value pair, or a decoded result entry.
///
/// Spouts never look inside a record beyond what is needed to count it.
pub type Record = Value;

/// Ordered records produced by one page, scan step, or row fetch.
pub type RecordBatch = Vec<Record>;

/// Raw bytes as text: the string itself when valid UTF-8, base64 otherwise.
///
/// Distinct byte strings always map to distinct text within one encoding,
/// so binary keys never merge.
pub fn bytes_to_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => BASE64.encode(e.into_bytes()),
    }
}

/// [`bytes_to_text`] wrapped as a JSON string
pub fn bytes_to_value(bytes: Vec<u8>) -> Value {
    Value::String(bytes_to_text(bytes))
}
