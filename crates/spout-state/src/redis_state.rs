use ::async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use spout_core::{Error, Result, RunState, StateStore};
use tracing::info;

/// Run state kept as JSON strings under `<prefix><run_id>`
pub struct RedisState {
    connection: MultiplexedConnection,
    prefix: String,
}

impl RedisState {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        info!("Connecting to Redis state store");
        let client = Client::open(url)
            .map_err(|e| Error::State(format!("Invalid Redis URL: {}", e)))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| Error::State(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            prefix: prefix.into(),
        })
    }

    fn key(&self, run_id: &str) -> String {
        state_key(&self.prefix, run_id)
    }
}

fn state_key(prefix: &str, run_id: &str) -> String {
    format!("{}{}", prefix, run_id)
}

#[async_trait]
impl StateStore for RedisState {
    async fn get_state(&self, run_id: &str) -> Result<Option<RunState>> {
        let mut conn = self.connection.clone();
        let stored: Option<String> = conn
            .get(self.key(run_id))
            .await
            .map_err(|e| Error::State(format!("GET failed: {}", e)))?;

        stored
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| Error::State(format!("Stored state for '{}' is not valid: {}", run_id, e)))
    }

    async fn set_state(&self, run_id: &str, state: &RunState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.key(run_id), json)
            .await
            .map_err(|e| Error::State(format!("SET failed: {}", e)))
    }
}
