use crate::{BatchOutput, RecordBatch, Result};
use futures::{Stream, TryStreamExt};
use tracing::info;

/// Forward every batch of `batches` to `output`, in order.
///
/// Returns the number of records forwarded. Stops at the first error from
/// either side; batches saved before the error stay saved.
pub async fn drain<S>(
    mut batches: S,
    output: &mut dyn BatchOutput,
    backend: &str,
    expected: Option<u64>,
) -> Result<u64>
where
    S: Stream<Item = Result<RecordBatch>> + Unpin,
{
    let mut processed: u64 = 0;

    while let Some(batch) = batches.try_next().await? {
        let count = batch.len() as u64;
        output.save(batch).await?;

        processed += count;
        match expected {
            Some(total) => info!("[{}] Total rows processed: {}/{}", backend, processed, total),
            None => info!("[{}] Total rows processed: {}", backend, processed),
        }
    }

    Ok(processed)
}
