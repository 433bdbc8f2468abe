use crate::{RecordBatch, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Trait for configured data sources
///
/// Implementors hold the connection parameters for one backend. Everything a
/// run does beyond opening a session (draining, counting, state bookkeeping)
/// lives in [`crate::fetch`].
#[async_trait]
pub trait Backend: Send + Sync {
    type Session: Session;

    /// Backend name used in log lines (e.g. "PostgreSQL")
    fn name(&self) -> &str;

    /// Whether runs persist `processed_rows` in their state
    fn tracks_processed_rows(&self) -> bool {
        true
    }

    /// Connect to the data source
    async fn open(&self) -> Result<Self::Session>;
}

/// An open connection to a backend
#[async_trait]
pub trait Session: Send {
    /// Total number of records the source reported up front, if any
    fn expected_rows(&self) -> Option<u64> {
        None
    }

    /// Lazy, finite sequence of record batches. Not restartable.
    fn batches(&mut self) -> BoxStream<'_, Result<RecordBatch>>;

    /// Release the connection
    async fn close(&mut self) -> Result<()>;
}
