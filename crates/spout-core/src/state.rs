use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted counters for one spout run, keyed by run id.
///
/// `processed_rows` is only present for spouts that page through their
/// source; it holds the row count of the most recent successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub success_count: u64,

    #[serde(default)]
    pub failure_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_rows: Option<u64>,
}

impl RunState {
    /// All-zero state used when the store has nothing for a run id
    pub fn initial(tracks_rows: bool) -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            processed_rows: tracks_rows.then_some(0),
        }
    }

    /// Fill in a stored state, defaulting whatever is missing
    pub fn or_initial(existing: Option<Self>, tracks_rows: bool) -> Self {
        match existing {
            Some(mut state) => {
                if tracks_rows && state.processed_rows.is_none() {
                    state.processed_rows = Some(0);
                }
                state
            }
            None => Self::initial(tracks_rows),
        }
    }

    pub fn record_success(&mut self, processed_rows: Option<u64>) {
        self.success_count += 1;
        if let Some(rows) = processed_rows {
            self.processed_rows = Some(rows);
        }
    }

    /// Previous `processed_rows` is kept as-is.
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }
}

/// Persistent key-to-state store
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns None if nothing has been stored for this run id
    async fn get_state(&self, run_id: &str) -> Result<Option<RunState>>;

    /// Overwrite the state stored for this run id
    async fn set_state(&self, run_id: &str, state: &RunState) -> Result<()>;
}
