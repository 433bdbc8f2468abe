use crate::{RecordBatch, Result};
use async_trait::async_trait;

/// Sink that durably persists forwarded batches
#[async_trait]
pub trait BatchOutput: Send {
    /// Persist one batch. Called repeatedly per run, in fetch order.
    async fn save(&mut self, batch: RecordBatch) -> Result<()>;
}
