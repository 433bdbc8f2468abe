use ::async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spout_core::{Backend, Error, RecordBatch, Result, Session};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpQueryConfig {
    /// Query endpoint (e.g. http://kairosdb:8080/api/v1/datapoints)
    pub url: String,

    /// Query text, sent as the `query` parameter
    pub query: String,
}

/// Spout issuing a single GET and forwarding the `results` of the response
pub struct HttpQuerySpout {
    name: String,
    config: HttpQueryConfig,
}

impl HttpQuerySpout {
    pub fn new(name: impl Into<String>, config: HttpQueryConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[async_trait]
impl Backend for HttpQuerySpout {
    type Session = HttpQuerySession;

    fn name(&self) -> &str {
        &self.name
    }

    fn tracks_processed_rows(&self) -> bool {
        false
    }

    async fn open(&self) -> Result<HttpQuerySession> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpQuerySession {
            client,
            config: self.config.clone(),
        })
    }
}

/// Stateless: nothing is held open between requests
pub struct HttpQuerySession {
    client: Client,
    config: HttpQueryConfig,
}

#[async_trait]
impl Session for HttpQuerySession {
    fn batches(&mut self) -> BoxStream<'_, Result<RecordBatch>> {
        info!("Querying {}", self.config.url);
        let request = self
            .client
            .get(&self.config.url)
            .query(&[("query", self.config.query.as_str())]);

        stream::once(query_results(request)).boxed()
    }

    async fn close(&mut self) -> Result<()> {
        debug!("HTTP query session finished");
        Ok(())
    }
}

async fn query_results(request: RequestBuilder) -> Result<RecordBatch> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Connection(format!("Request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| Error::Query(format!("Query rejected: {}", e)))?;

    let mut body: Value = response
        .json()
        .await
        .map_err(|e| Error::Query(format!("Invalid JSON response: {}", e)))?;

    // A non-array field, null included, is forwarded as a batch of one
    match body.get_mut("results").map(Value::take) {
        Some(Value::Array(results)) => Ok(results),
        Some(single) => Ok(vec![single]),
        None => Err(Error::Query("Response has no 'results' field".to_string())),
    }
}
