use crate::rows::{ReadRowsResponse, RowMerger};
use ::async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spout_core::{Backend, Error, RecordBatch, Result, Session};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigtableConfig {
    /// Google Cloud project ID
    pub project_id: String,

    /// Bigtable instance ID
    pub instance_id: String,

    /// Bigtable table ID
    pub table_id: String,

    /// Data API endpoint (emulators and tests point this elsewhere)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// OAuth2 access token sent as a bearer token
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_endpoint() -> String {
    "https://bigtable.googleapis.com".to_string()
}

impl BigtableConfig {
    pub fn table_name(&self) -> String {
        format!(
            "projects/{}/instances/{}/tables/{}",
            self.project_id, self.instance_id, self.table_id
        )
    }

    pub fn read_rows_url(&self) -> String {
        format!(
            "{}/v2/{}:readRows",
            self.endpoint.trim_end_matches('/'),
            self.table_name()
        )
    }
}

/// Spout reading a whole Bigtable table in one go
pub struct BigtableSpout {
    config: BigtableConfig,
}

impl BigtableSpout {
    pub fn new(config: BigtableConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Backend for BigtableSpout {
    type Session = BigtableSession;

    fn name(&self) -> &str {
        "Bigtable"
    }

    fn tracks_processed_rows(&self) -> bool {
        false
    }

    async fn open(&self) -> Result<BigtableSession> {
        info!("Opening Bigtable table {}", self.config.table_name());
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(BigtableSession {
            client,
            config: self.config.clone(),
        })
    }
}

pub struct BigtableSession {
    client: Client,
    config: BigtableConfig,
}

#[async_trait]
impl Session for BigtableSession {
    /// The whole table as a single batch
    fn batches(&mut self) -> BoxStream<'_, Result<RecordBatch>> {
        let mut request = self
            .client
            .post(self.config.read_rows_url())
            .json(&json!({}));
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        stream::once(read_all_rows(request)).boxed()
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Bigtable session finished");
        Ok(())
    }
}

async fn read_all_rows(request: RequestBuilder) -> Result<RecordBatch> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Connection(format!("readRows request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| Error::Query(format!("readRows rejected: {}", e)))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::Query(format!("Invalid readRows response: {}", e)))?;

    // The REST transport returns the message stream as a JSON array
    let messages = match body {
        Value::Array(messages) => messages,
        single => vec![single],
    };

    let mut merger = RowMerger::new();
    for message in messages {
        let message: ReadRowsResponse = serde_json::from_value(message)?;
        for chunk in message.chunks {
            merger.push(chunk)?;
        }
    }

    let rows = merger.finish()?;
    info!("Read {} rows", rows.len());
    Ok(rows)
}
