use ::async_trait::async_trait;
use spout_core::{Error, Result, RunState, StateStore};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS spout_state (
    run_id TEXT PRIMARY KEY,
    state JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

/// Run state kept in the `spout_state` table
pub struct PostgresState {
    pool: PgPool,
}

impl PostgresState {
    /// Connect and make sure the state table exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to PostgreSQL state store");
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| Error::State(format!("Failed to connect to PostgreSQL: {}", e)))?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| Error::State(format!("Failed to create spout_state table: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StateStore for PostgresState {
    async fn get_state(&self, run_id: &str) -> Result<Option<RunState>> {
        let row = sqlx::query("SELECT state FROM spout_state WHERE run_id = $1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::State(format!("Failed to get state: {}", e)))?;

        row.map(|r| {
            r.try_get::<Json<RunState>, _>("state")
                .map(|Json(state)| state)
                .map_err(|e| Error::State(format!("Stored state for '{}' is not valid: {}", run_id, e)))
        })
        .transpose()
    }

    async fn set_state(&self, run_id: &str, state: &RunState) -> Result<()> {
        sqlx::query(
            "INSERT INTO spout_state (run_id, state, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (run_id) DO UPDATE
             SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at",
        )
        .bind(run_id)
        .bind(Json(state))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::State(format!("Failed to save state: {}", e)))?;

        Ok(())
    }
}
