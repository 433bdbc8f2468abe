use ::async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spout_core::{Backend, Error, RecordBatch, Result, Session};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrestoConfig {
    /// Coordinator URL (e.g. http://presto:8080)
    pub host: String,

    /// User the query runs as
    pub username: String,

    /// Password, sent with HTTP basic auth when set
    #[serde(default)]
    pub password: Option<String>,

    /// Catalog name
    pub catalog: String,

    /// Schema name
    pub schema: String,

    /// Table to read
    pub table: String,
}

impl PrestoConfig {
    pub fn statement(&self) -> String {
        format!("SELECT * FROM {}.{}.{}", self.catalog, self.schema, self.table)
    }
}

/// One page of the client protocol
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    id: String,
    #[serde(default)]
    next_uri: Option<String>,
    #[serde(default)]
    columns: Option<Vec<Column>>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    error: Option<QueryError>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryError {
    message: String,
    #[serde(default)]
    error_name: Option<String>,
}

/// Spout reading a whole Presto table one row at a time
pub struct PrestoSpout {
    config: PrestoConfig,
}

impl PrestoSpout {
    pub fn new(config: PrestoConfig) -> Self {
        Self { config }
    }

    fn client(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("x-presto-user", &self.config.username),
            ("x-presto-catalog", &self.config.catalog),
            ("x-presto-schema", &self.config.schema),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Configuration(format!("Invalid {} header: {}", name, e)))?;
            headers.insert(name, value);
        }

        Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Connection(format!("Failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl Backend for PrestoSpout {
    type Session = PrestoSession;

    fn name(&self) -> &str {
        "Presto"
    }

    fn tracks_processed_rows(&self) -> bool {
        false
    }

    async fn open(&self) -> Result<PrestoSession> {
        info!(
            "Connecting to Presto at {} as {} ({}.{})",
            self.config.host, self.config.username, self.config.catalog, self.config.schema
        );

        let mut session = PrestoSession {
            client: self.client()?,
            username: self.config.username.clone(),
            password: self.config.password.clone(),
            columns: Vec::new(),
            pending: VecDeque::new(),
            next_uri: None,
        };

        let statement = self.config.statement();
        let url = format!("{}/v1/statement", self.config.host.trim_end_matches('/'));
        let request = session.authorized(session.client.post(url)).body(statement);
        let first = fetch_page(request).await?;
        debug!("Submitted query {}", first.id);
        session.absorb(first)?;

        Ok(session)
    }
}

/// A submitted query and the rows received but not yet forwarded
pub struct PrestoSession {
    client: Client,
    username: String,
    password: Option<String>,
    columns: Vec<String>,
    pending: VecDeque<Value>,
    next_uri: Option<String>,
}

impl PrestoSession {
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.password {
            Some(password) => request.basic_auth(&self.username, Some(password)),
            None => request,
        }
    }

    fn absorb(&mut self, page: QueryResults) -> Result<()> {
        if let Some(error) = page.error {
            self.next_uri = None;
            return Err(Error::Query(match error.error_name {
                Some(name) => format!("{}: {}", name, error.message),
                None => error.message,
            }));
        }

        if let Some(columns) = page.columns {
            self.columns = columns.into_iter().map(|c| c.name).collect();
        }
        for row in page.data.unwrap_or_default() {
            self.pending.push_back(zip_row(&self.columns, row));
        }
        self.next_uri = page.next_uri;
        Ok(())
    }

    /// Next row of the result, following `nextUri` until the query is drained
    async fn next_row(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            // Kept until the page arrives so close() can cancel it
            let Some(uri) = self.next_uri.clone() else {
                return Ok(None);
            };
            let page = fetch_page(self.authorized(self.client.get(uri))).await?;
            self.absorb(page)?;
        }
    }
}

#[async_trait]
impl Session for PrestoSession {
    fn batches(&mut self) -> BoxStream<'_, Result<RecordBatch>> {
        stream::try_unfold(self, |session| async move {
            session
                .next_row()
                .await
                .map(|row| row.map(|row| (vec![row], session)))
        })
        .boxed()
    }

    async fn close(&mut self) -> Result<()> {
        self.pending.clear();
        let Some(uri) = self.next_uri.take() else {
            return Ok(());
        };

        info!("Cancelling unfinished query");
        let response = self
            .authorized(self.client.delete(uri))
            .send()
            .await
            .map_err(|e| Error::Connection(format!("Failed to cancel query: {}", e)))?;
        if !response.status().is_success() {
            warn!("Query cancel returned {}", response.status());
        }
        Ok(())
    }
}

async fn fetch_page(request: RequestBuilder) -> Result<QueryResults> {
    request
        .send()
        .await
        .map_err(|e| Error::Connection(format!("Presto request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| Error::Query(format!("Presto rejected the request: {}", e)))?
        .json()
        .await
        .map_err(|e| Error::Query(format!("Invalid Presto response: {}", e)))
}

fn zip_row(columns: &[String], row: Vec<Value>) -> Value {
    let record: Map<String, Value> = row
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let name = columns.get(i).cloned().unwrap_or_else(|| format!("_col{}", i));
            (name, value)
        })
        .collect();
    Value::Object(record)
}
