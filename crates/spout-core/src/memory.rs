use crate::{BatchOutput, RecordBatch, Result, RunState, StateStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Output that keeps every saved batch in memory
#[derive(Debug, Default)]
pub struct MemoryOutput {
    batches: Vec<RecordBatch>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(Vec::len).collect()
    }

    pub fn record_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl BatchOutput for MemoryOutput {
    async fn save(&mut self, batch: RecordBatch) -> Result<()> {
        self.batches.push(batch);
        Ok(())
    }
}

/// State store living for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryState {
    states: RwLock<HashMap<String, RunState>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryState {
    async fn get_state(&self, run_id: &str) -> Result<Option<RunState>> {
        Ok(self.states.read().await.get(run_id).cloned())
    }

    async fn set_state(&self, run_id: &str, state: &RunState) -> Result<()> {
        self.states
            .write()
            .await
            .insert(run_id.to_string(), state.clone());
        Ok(())
    }
}
