use crate::row::{mysql_row_to_json, pg_row_to_json};
use ::async_trait::async_trait;
use futures::stream::{self, BoxStream, TryChunksError};
use futures::{future, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use spout_core::{Backend, Error, RecordBatch, Result, Session};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, info};

/// Wire protocol spoken by the relational backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Mysql,
}

impl Dialect {
    fn default_port(self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::Mysql => 3306,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    /// Set by the factory; not part of the argument map
    #[serde(default)]
    pub dialect: Dialect,

    /// Database host
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (5432 for PostgreSQL, 3306 for MySQL when unset)
    #[serde(default)]
    pub port: Option<u16>,

    /// Login user
    pub user: String,

    /// Login password
    #[serde(default)]
    pub password: Option<String>,

    /// Database name
    pub database: String,

    /// Query whose result set is fetched
    pub query: String,

    /// Number of rows per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_page_size() -> usize {
    100
}

impl RelationalConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.dialect.default_port())
    }
}

/// Spout paging through the result set of one SQL query
pub struct RelationalSpout {
    name: String,
    config: RelationalConfig,
}

impl RelationalSpout {
    pub fn new(name: impl Into<String>, config: RelationalConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn config(&self) -> &RelationalConfig {
        &self.config
    }

    async fn connect(&self) -> std::result::Result<SqlConnection, sqlx::Error> {
        let config = &self.config;
        match config.dialect {
            Dialect::Postgres => {
                let mut options = PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port())
                    .username(&config.user)
                    .database(&config.database);
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                let connection = PgConnection::connect_with(&options).await?;
                Ok(SqlConnection::Postgres(connection))
            }
            Dialect::Mysql => {
                let mut options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.port())
                    .username(&config.user)
                    .database(&config.database);
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                let connection = MySqlConnection::connect_with(&options).await?;
                Ok(SqlConnection::MySql(connection))
            }
        }
    }
}

#[async_trait]
impl Backend for RelationalSpout {
    type Session = RelationalSession;

    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<RelationalSession> {
        info!(
            "[{}] Connecting to {}:{}/{} as {}",
            self.name,
            self.config.host,
            self.config.port(),
            self.config.database,
            self.config.user
        );

        let connection = self.connect().await.map_err(|e| {
            Error::Connection(format!("Failed to connect to {}: {}", self.name, e))
        })?;

        Ok(RelationalSession {
            connection: Some(connection),
            query: self.config.query.clone(),
            // A page of zero rows would never make progress
            page_size: self.config.page_size.max(1),
        })
    }
}

enum SqlConnection {
    Postgres(PgConnection),
    MySql(MySqlConnection),
}

/// One open connection plus the query to run on it
pub struct RelationalSession {
    connection: Option<SqlConnection>,
    query: String,
    page_size: usize,
}

#[async_trait]
impl Session for RelationalSession {
    fn batches(&mut self) -> BoxStream<'_, Result<RecordBatch>> {
        let page_size = self.page_size;
        let query = self.query.as_str();
        debug!("Executing query with page size {}", page_size);

        // The simple query protocol returns every column in text format, so
        // types without a dedicated decoder still arrive as their text form
        match self.connection.as_mut() {
            Some(SqlConnection::Postgres(conn)) => sqlx::raw_sql(query)
                .fetch(conn)
                .map_err(|e| Error::Query(e.to_string()))
                .and_then(|row| future::ready(pg_row_to_json(&row)))
                .try_chunks(page_size)
                .map_err(|TryChunksError(_, e)| e)
                .boxed(),
            Some(SqlConnection::MySql(conn)) => sqlx::raw_sql(query)
                .fetch(conn)
                .map_err(|e| Error::Query(e.to_string()))
                .and_then(|row| future::ready(mysql_row_to_json(&row)))
                .try_chunks(page_size)
                .map_err(|TryChunksError(_, e)| e)
                .boxed(),
            None => stream::once(future::ready(Err(Error::Connection(
                "Not connected".to_string(),
            ))))
            .boxed(),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let closed = match self.connection.take() {
            Some(SqlConnection::Postgres(conn)) => conn.close().await,
            Some(SqlConnection::MySql(conn)) => conn.close().await,
            None => return Ok(()),
        };
        closed.map_err(|e| Error::Connection(format!("Failed to close connection: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelationalSpoutFactory;
    use serde_json::json;
    use spout_core::{MemoryOutput, MemoryState, Spout, SpoutFactory, StateStore};

    fn refused_args() -> serde_json::Value {
        // Nothing listens on port 1
        json!({
            "host": "127.0.0.1",
            "port": "1",
            "user": "postgres",
            "password": "postgres",
            "database": "mydb",
            "query": "SELECT * FROM events"
        })
    }

    #[test]
    fn test_config_defaults() {
        let config: RelationalConfig = serde_json::from_value(json!({
            "user": "root",
            "database": "mydb",
            "query": "SELECT 1"
        }))
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(config.port(), 5432);
        assert!(config.password.is_none());
    }

    #[test]
    fn test_mysql_default_port() {
        let config = RelationalConfig {
            dialect: Dialect::Mysql,
            host: "db".to_string(),
            port: None,
            user: "root".to_string(),
            password: None,
            database: "mydb".to_string(),
            query: "SELECT 1".to_string(),
            page_size: 10,
        };
        assert_eq!(config.port(), 3306);
    }

    #[tokio::test]
    async fn test_refused_postgres_connection_counts_failure() {
        let spout = RelationalSpoutFactory::postgres()
            .create(refused_args())
            .unwrap();
        let mut output = MemoryOutput::new();
        let state = MemoryState::new();

        let result = spout.fetch("pg-run", &mut output, &state).await;

        assert!(output.batches().is_empty());
        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.processed_rows, Some(0));
        assert_eq!(state.get_state("pg-run").await.unwrap(), Some(result));
    }

    /// Arguments for a live PostgreSQL named by `SPOUT_TEST_PG_HOST`
    fn live_postgres_args(query: &str, page_size: usize) -> Option<serde_json::Value> {
        let host = std::env::var("SPOUT_TEST_PG_HOST").ok()?;
        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.into());
        Some(json!({
            "host": host,
            "port": var("SPOUT_TEST_PG_PORT", "5432"),
            "user": var("SPOUT_TEST_PG_USER", "postgres"),
            "password": var("SPOUT_TEST_PG_PASSWORD", "postgres"),
            "database": var("SPOUT_TEST_PG_DATABASE", "postgres"),
            "query": query,
            "page_size": page_size
        }))
    }

    #[tokio::test]
    async fn test_postgres_columns_are_forwarded_verbatim() {
        let query = "SELECT ARRAY[true, false] AS flags, \
                     ARRAY[1::int2, 2::int2] AS small, \
                     ARRAY['1 hour'::interval] AS spans, \
                     interval '1 day 2 hours' AS span, \
                     42::oid AS object_id, \
                     '10.0.0.1'::inet AS address, \
                     '12:30:00+02'::timetz AS local_time, \
                     '\\xff00'::bytea AS raw, \
                     'h\u{e9}llo'::text AS greeting";
        let Some(args) = live_postgres_args(query, 10) else {
            return;
        };
        let spout = RelationalSpoutFactory::postgres().create(args).unwrap();
        let mut output = MemoryOutput::new();

        let result = spout.fetch("pg-types", &mut output, &MemoryState::new()).await;

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 0);
        assert_eq!(
            output.batches()[0][0],
            json!({
                "flags": [true, false],
                "small": [1, 2],
                "spans": "{01:00:00}",
                "span": "1 day 02:00:00",
                "object_id": 42,
                "address": "10.0.0.1",
                "local_time": "12:30:00+02",
                "raw": "/wA=",
                "greeting": "h\u{e9}llo"
            })
        );
    }

    #[tokio::test]
    async fn test_postgres_result_set_is_paged() {
        let query = "SELECT n FROM generate_series(1, 250) AS n";
        let Some(args) = live_postgres_args(query, 100) else {
            return;
        };
        let spout = RelationalSpoutFactory::postgres().create(args).unwrap();
        let mut output = MemoryOutput::new();

        let result = spout.fetch("pg-paging", &mut output, &MemoryState::new()).await;

        assert_eq!(output.batch_sizes(), vec![100, 100, 50]);
        assert_eq!(output.batches()[2][49], json!({ "n": 250 }));
        assert_eq!(result.processed_rows, Some(250));
    }

    #[tokio::test]
    async fn test_refused_mysql_connection_counts_failure() {
        let spout = RelationalSpoutFactory::cloud_sql()
            .create(refused_args())
            .unwrap();
        let state = MemoryState::new();

        let first = spout.fetch("mysql-run", &mut MemoryOutput::new(), &state).await;
        let second = spout.fetch("mysql-run", &mut MemoryOutput::new(), &state).await;

        assert_eq!(spout.name(), "CloudSQL");
        assert_eq!(first.failure_count, 1);
        assert_eq!(second.failure_count, 2);
        assert_eq!(second.success_count, 0);
    }
}
