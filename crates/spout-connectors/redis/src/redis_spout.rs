use ::async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{future, StreamExt};
use redis::{aio::MultiplexedConnection, Client, ConnectionInfo, RedisResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spout_core::{bytes_to_value, Backend, Error, RecordBatch, Result, Session};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis host
    #[serde(default = "default_host")]
    pub host: String,

    /// Redis port
    #[serde(default = "default_port")]
    pub port: u16,

    /// ACL user name
    #[serde(default)]
    pub username: Option<String>,

    /// Redis password
    #[serde(default)]
    pub password: Option<String>,

    /// Redis database number
    #[serde(default = "default_database")]
    pub database: i64,

    /// COUNT hint passed to each SCAN call
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_database() -> i64 {
    0
}

fn default_scan_count() -> usize {
    100
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            database: default_database(),
            scan_count: default_scan_count(),
        }
    }
}

/// The three commands a key-value dump needs
#[async_trait]
pub trait KeyScanner: Send {
    /// DBSIZE
    async fn key_count(&mut self) -> RedisResult<u64>;

    /// SCAN from `cursor`; returns the next cursor (0 when done) and a batch of keys
    async fn scan(&mut self, cursor: u64, count: usize) -> RedisResult<(u64, Vec<Vec<u8>>)>;

    /// MGET, one entry per key, None for missing or non-string keys
    async fn values(&mut self, keys: &[Vec<u8>]) -> RedisResult<Vec<Option<Vec<u8>>>>;
}

#[async_trait]
impl KeyScanner for MultiplexedConnection {
    async fn key_count(&mut self) -> RedisResult<u64> {
        redis::cmd("DBSIZE").query_async(self).await
    }

    async fn scan(&mut self, cursor: u64, count: usize) -> RedisResult<(u64, Vec<Vec<u8>>)> {
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(self)
            .await
    }

    async fn values(&mut self, keys: &[Vec<u8>]) -> RedisResult<Vec<Option<Vec<u8>>>> {
        redis::cmd("MGET").arg(keys).query_async(self).await
    }
}

/// Spout dumping every key of one Redis database
pub struct RedisSpout {
    config: RedisConfig,
}

impl RedisSpout {
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<MultiplexedConnection> {
        let url = format!("redis://{}:{}", self.config.host, self.config.port);
        let mut connection_info: ConnectionInfo = Client::open(url.as_str())
            .map_err(|e| Error::Connection(format!("Invalid Redis address: {}", e)))?
            .get_connection_info()
            .clone();

        connection_info.redis.db = self.config.database;
        connection_info.redis.username = self.config.username.clone();
        connection_info.redis.password = self.config.password.clone();

        let client = Client::open(connection_info)
            .map_err(|e| Error::Connection(format!("Failed to create Redis client: {}", e)))?;

        client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| Error::Connection(format!("Failed to connect to Redis: {}", e)))
    }
}

#[async_trait]
impl Backend for RedisSpout {
    type Session = RedisSession;

    fn name(&self) -> &str {
        "Redis"
    }

    async fn open(&self) -> Result<RedisSession> {
        info!(
            "Connecting to Redis: {}:{} (db={})",
            self.config.host, self.config.port, self.config.database
        );

        let connection = self.connect().await?;
        info!("Connected to Redis successfully");

        RedisSession::start(connection, self.config.scan_count).await
    }
}

/// Open connection plus the key count taken when it was opened
pub struct RedisSession<S = MultiplexedConnection> {
    scanner: Option<S>,
    total_keys: u64,
    scan_count: usize,
}

impl<S: KeyScanner> RedisSession<S> {
    pub async fn start(mut scanner: S, scan_count: usize) -> Result<Self> {
        let total_keys = scanner
            .key_count()
            .await
            .map_err(|e| Error::Query(format!("DBSIZE failed: {}", e)))?;
        debug!("Database holds {} keys", total_keys);

        Ok(Self {
            scanner: Some(scanner),
            total_keys,
            scan_count: scan_count.max(1),
        })
    }
}

#[async_trait]
impl<S: KeyScanner> Session for RedisSession<S> {
    fn expected_rows(&self) -> Option<u64> {
        Some(self.total_keys)
    }

    fn batches(&mut self) -> BoxStream<'_, Result<RecordBatch>> {
        let count = self.scan_count;
        match self.scanner.as_mut() {
            Some(scanner) => scan_batches(scanner, count),
            None => stream::once(future::ready(Err(Error::Connection(
                "Not connected".to_string(),
            ))))
            .boxed(),
        }
    }

    async fn close(&mut self) -> Result<()> {
        info!("Disconnecting from Redis");
        self.scanner = None;
        Ok(())
    }
}

/// Walk the SCAN cursor, yielding one batch of `[key, value]` pairs per
/// non-empty SCAN reply until the cursor comes back to 0.
fn scan_batches<S: KeyScanner>(scanner: &mut S, count: usize) -> BoxStream<'_, Result<RecordBatch>> {
    stream::try_unfold((scanner, Some(0u64)), move |(scanner, cursor)| async move {
        match cursor {
            None => Ok(None),
            Some(cursor) => next_batch(&mut *scanner, cursor, count)
                .await
                .map(|step| step.map(|(batch, next)| (batch, (scanner, next)))),
        }
    })
    .boxed()
}

async fn next_batch<S: KeyScanner>(
    scanner: &mut S,
    mut cursor: u64,
    count: usize,
) -> Result<Option<(RecordBatch, Option<u64>)>> {
    loop {
        let (next, keys) = scanner
            .scan(cursor, count)
            .await
            .map_err(|e| Error::Query(format!("SCAN failed: {}", e)))?;
        let remaining = (next != 0).then_some(next);

        // SCAN may hand back an empty page with a live cursor
        if keys.is_empty() {
            match remaining {
                Some(next) => {
                    cursor = next;
                    continue;
                }
                None => return Ok(None),
            }
        }

        let values = scanner
            .values(&keys)
            .await
            .map_err(|e| Error::Query(format!("MGET failed: {}", e)))?;

        return Ok(Some((pair_values(keys, values), remaining)));
    }
}

/// Keys and values that are not UTF-8 are emitted as base64
fn pair_values(keys: Vec<Vec<u8>>, values: Vec<Option<Vec<u8>>>) -> RecordBatch {
    keys.into_iter()
        .zip(values.into_iter().chain(std::iter::repeat(None)))
        .map(|(key, value)| {
            let value = value.map(bytes_to_value).unwrap_or(Value::Null);
            json!([bytes_to_value(key), value])
        })
        .collect()
}
