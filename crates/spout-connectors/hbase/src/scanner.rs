use ::async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures::stream::{self, BoxStream};
use futures::{future, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use spout_core::{bytes_to_text, Backend, Error, RecordBatch, Result, Session};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HBaseConfig {
    /// Base URL of the HBase REST server (e.g. http://localhost:8080)
    pub url: String,

    /// Table to scan
    pub table: String,

    /// First row key of the scan (inclusive)
    pub row_start: String,

    /// Row key to stop at (exclusive); scans to the end when unset
    #[serde(default)]
    pub row_stop: Option<String>,

    /// Rows fetched per scanner call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScannerRequest {
    start_row: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_row: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CellSet {
    #[serde(rename = "Row", default)]
    rows: Vec<RowModel>,
}

#[derive(Debug, Deserialize)]
struct RowModel {
    key: String,
    #[serde(rename = "Cell", default)]
    cells: Vec<CellModel>,
}

#[derive(Debug, Deserialize)]
struct CellModel {
    column: String,
    #[serde(rename = "$", default)]
    value: String,
}

/// Spout paging through a row range with an HBase REST scanner
pub struct HBaseSpout {
    config: HBaseConfig,
}

impl HBaseSpout {
    pub fn new(config: HBaseConfig) -> Self {
        Self { config }
    }

    fn scanner_url(&self) -> String {
        format!(
            "{}/{}/scanner",
            self.config.url.trim_end_matches('/'),
            self.config.table
        )
    }
}

#[async_trait]
impl Backend for HBaseSpout {
    type Session = HBaseSession;

    fn name(&self) -> &str {
        "HBase"
    }

    async fn open(&self) -> Result<HBaseSession> {
        info!(
            "Opening scanner on {} ({}..{})",
            self.config.table,
            self.config.row_start,
            self.config.row_stop.as_deref().unwrap_or("")
        );

        let client = Client::builder()
            .build()
            .map_err(|e| Error::Connection(format!("Failed to build HTTP client: {}", e)))?;

        let request = ScannerRequest {
            start_row: BASE64.encode(&self.config.row_start),
            end_row: self.config.row_stop.as_ref().map(|stop| BASE64.encode(stop)),
        };

        let response = client
            .put(self.scanner_url())
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Connection(format!("Failed to reach HBase REST server: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::Query(format!("Failed to create scanner: {}", e)))?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Query("Scanner created without a Location header".to_string()))?;
        let scanner = resolve_location(&self.config.url, location)?;
        debug!("Scanner created at {}", scanner);

        Ok(HBaseSession {
            client,
            scanner: Some(scanner),
            batch_size: self.config.batch_size.max(1),
        })
    }
}

/// An open scanner; closing deletes it on the server
pub struct HBaseSession {
    client: Client,
    scanner: Option<String>,
    batch_size: usize,
}

#[async_trait]
impl Session for HBaseSession {
    /// Pages are read `batch_size` rows at a time, but each row is saved on its own
    fn batches(&mut self) -> BoxStream<'_, Result<RecordBatch>> {
        let batch_size = self.batch_size;
        let Some(scanner) = self.scanner.clone() else {
            return stream::once(future::ready(Err(Error::Connection(
                "Scanner is closed".to_string(),
            ))))
            .boxed();
        };

        stream::try_unfold(
            (&self.client, scanner),
            move |(client, scanner)| async move {
                next_page(client, &scanner, batch_size)
                    .await
                    .map(|page| page.map(|rows| (rows, (client, scanner))))
            },
        )
        .map_ok(|rows| stream::iter(rows.into_iter().map(|row| Ok::<_, Error>(vec![row]))))
        .try_flatten()
        .boxed()
    }

    async fn close(&mut self) -> Result<()> {
        let Some(scanner) = self.scanner.take() else {
            return Ok(());
        };
        info!("Deleting scanner {}", scanner);

        self.client
            .delete(&scanner)
            .send()
            .await
            .map_err(|e| Error::Connection(format!("Failed to delete scanner: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::Connection(format!("Failed to delete scanner: {}", e)))?;
        Ok(())
    }
}

/// Next page of rows, or None once the scanner is exhausted (204 No Content)
async fn next_page(client: &Client, scanner: &str, batch_size: usize) -> Result<Option<RecordBatch>> {
    let response = client
        .get(scanner)
        .query(&[("n", batch_size)])
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| Error::Connection(format!("Scanner read failed: {}", e)))?;

    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let cell_set: CellSet = response
        .error_for_status()
        .map_err(|e| Error::Query(format!("Scanner read rejected: {}", e)))?
        .json()
        .await
        .map_err(|e| Error::Query(format!("Invalid scanner response: {}", e)))?;

    if cell_set.rows.is_empty() {
        return Ok(None);
    }

    cell_set.rows.into_iter().map(row_to_json).collect::<Result<_>>().map(Some)
}

/// `{"key": ..., "columns": {"family:qualifier": <base64 value>}}`; keys and
/// column names that are not UTF-8 stay base64
fn row_to_json(row: RowModel) -> Result<Value> {
    let key = decode_text(&row.key)?;
    let columns: Map<String, Value> = row
        .cells
        .into_iter()
        .map(|cell| Ok((decode_text(&cell.column)?, Value::String(cell.value))))
        .collect::<Result<_>>()?;

    Ok(json!({ "key": key, "columns": columns }))
}

fn decode_text(encoded: &str) -> Result<String> {
    BASE64
        .decode(encoded)
        .map(bytes_to_text)
        .map_err(|e| Error::Query(format!("Invalid base64 in scanner response: {}", e)))
}

/// The scanner URL from a `Location` header, absolute or relative to `base`
fn resolve_location(base: &str, location: &str) -> Result<String> {
    Url::parse(base)
        .and_then(|base| base.join(location))
        .map(String::from)
        .map_err(|e| Error::Query(format!("Invalid scanner location '{}': {}", location, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HBaseSpoutFactory;
    use axum::extract::State;
    use axum::http::header;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use spout_core::{MemoryOutput, MemoryState, Spout, SpoutFactory};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeScanner {
        pages: VecDeque<Value>,
        fail_reads: bool,
        request: Option<Value>,
        reads: usize,
        deleted: bool,
    }

    type Shared = Arc<Mutex<FakeScanner>>;

    async fn create(State(scanner): State<Shared>, Json(body): Json<Value>) -> Response {
        scanner.lock().unwrap().request = Some(body);
        (StatusCode::CREATED, [(header::LOCATION, "/events/scanner/s1")]).into_response()
    }

    async fn read(State(scanner): State<Shared>) -> Response {
        let mut scanner = scanner.lock().unwrap();
        scanner.reads += 1;
        if scanner.fail_reads {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        match scanner.pages.pop_front() {
            Some(page) => Json(page).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    }

    async fn remove(State(scanner): State<Shared>) -> StatusCode {
        scanner.lock().unwrap().deleted = true;
        StatusCode::OK
    }

    async fn serve(scanner: Shared) -> String {
        let app = Router::new()
            .route("/events/scanner", put(create))
            .route("/events/scanner/{id}", get(read).delete(remove))
            .with_state(scanner);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn page(keys: &[&str]) -> Value {
        let rows: Vec<Value> = keys
            .iter()
            .map(|key| {
                json!({
                    "key": BASE64.encode(key),
                    "Cell": [{
                        "column": BASE64.encode("cf:name"),
                        "timestamp": 1,
                        "$": BASE64.encode(format!("value-{}", key))
                    }]
                })
            })
            .collect();
        json!({ "Row": rows })
    }

    fn spout(base: &str, table: &str) -> Box<dyn Spout> {
        HBaseSpoutFactory
            .create(json!({
                "url": base,
                "table": table,
                "row_start": "row-a",
                "row_stop": "row-z",
                "batch_size": "2"
            }))
            .unwrap()
    }

    #[tokio::test]
    async fn test_each_row_is_saved_on_its_own() {
        let scanner = Shared::default();
        {
            let mut fake = scanner.lock().unwrap();
            fake.pages.push_back(page(&["row-b", "row-c"]));
            fake.pages.push_back(page(&["row-d"]));
        }
        let base = serve(scanner.clone()).await;
        let mut output = MemoryOutput::new();
        let state = MemoryState::new();

        let result = spout(&base, "events").fetch("hbase-run", &mut output, &state).await;

        assert_eq!(output.batch_sizes(), vec![1, 1, 1]);
        assert_eq!(output.batches()[0][0]["key"], "row-b");
        assert_eq!(output.batches()[1][0]["key"], "row-c");
        assert_eq!(
            output.batches()[2][0],
            json!({ "key": "row-d", "columns": { "cf:name": BASE64.encode("value-row-d") } })
        );
        assert_eq!(result.success_count, 1);
        assert_eq!(result.processed_rows, Some(3));

        let fake = scanner.lock().unwrap();
        assert!(fake.deleted);
        assert_eq!(fake.reads, 3);
        assert_eq!(
            fake.request,
            Some(json!({
                "startRow": BASE64.encode("row-a"),
                "endRow": BASE64.encode("row-z")
            }))
        );
    }

    #[tokio::test]
    async fn test_read_failure_still_deletes_scanner() {
        let scanner = Shared::default();
        scanner.lock().unwrap().fail_reads = true;
        let base = serve(scanner.clone()).await;

        let result = spout(&base, "events")
            .fetch("hbase-run", &mut MemoryOutput::new(), &MemoryState::new())
            .await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.processed_rows, Some(0));
        assert!(scanner.lock().unwrap().deleted);
    }

    #[tokio::test]
    async fn test_unknown_table_is_a_failure() {
        let scanner = Shared::default();
        let base = serve(scanner.clone()).await;

        let result = spout(&base, "missing")
            .fetch("hbase-run", &mut MemoryOutput::new(), &MemoryState::new())
            .await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(scanner.lock().unwrap().reads, 0);
    }

    #[test]
    fn test_binary_row_keys_stay_distinct() {
        let row = |key: &[u8]| RowModel {
            key: BASE64.encode(key),
            cells: vec![CellModel {
                column: BASE64.encode("cf:\u{e9}"),
                value: BASE64.encode("v"),
            }],
        };

        let first = row_to_json(row(&b"\xff\x00"[..])).unwrap();
        let second = row_to_json(row(&b"\xfe\x00"[..])).unwrap();

        assert_eq!(first["key"], BASE64.encode(b"\xff\x00"));
        assert_ne!(first["key"], second["key"]);
        assert_eq!(first["columns"]["cf:\u{e9}"], BASE64.encode("v"));
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(
            resolve_location("http://hbase:8080/", "/t/scanner/1").unwrap(),
            "http://hbase:8080/t/scanner/1"
        );
        assert_eq!(
            resolve_location("http://hbase:8080", "/t/scanner/1").unwrap(),
            "http://hbase:8080/t/scanner/1"
        );
        assert_eq!(
            resolve_location("http://hbase:8080", "http://other:8080/t/scanner/1").unwrap(),
            "http://other:8080/t/scanner/1"
        );
        assert!(resolve_location("not a url", "/t/scanner/1").is_err());
    }
}
