use crate::{drain, Backend, BatchOutput, Result, RunState, Session, StateStore};
use async_trait::async_trait;
use tracing::{error, info, warn};

/// Object-safe handle on a configured spout
#[async_trait]
pub trait Spout: Send + Sync {
    /// Backend name (e.g. "Redis")
    fn name(&self) -> &str;

    /// Pull everything from the source into `output` and record the outcome
    /// under `run_id`. Never fails; see [`fetch`].
    async fn fetch(
        &self,
        run_id: &str,
        output: &mut dyn BatchOutput,
        state: &dyn StateStore,
    ) -> RunState;
}

#[async_trait]
impl<B> Spout for B
where
    B: Backend,
{
    fn name(&self) -> &str {
        Backend::name(self)
    }

    async fn fetch(
        &self,
        run_id: &str,
        output: &mut dyn BatchOutput,
        state: &dyn StateStore,
    ) -> RunState {
        fetch(self, run_id, output, state).await
    }
}

/// Run one fetch of `backend` and record its outcome.
///
/// Reads the run state once up front and writes it once at the end. Exactly
/// one of `success_count` / `failure_count` is incremented. Errors from the
/// backend, the output or the state store are logged, never returned; the
/// updated state is handed back for convenience.
pub async fn fetch<B>(
    backend: &B,
    run_id: &str,
    output: &mut dyn BatchOutput,
    state: &dyn StateStore,
) -> RunState
where
    B: Backend + ?Sized,
{
    let name = Backend::name(backend);
    let tracks_rows = backend.tracks_processed_rows();

    let stored = match state.get_state(run_id).await {
        Ok(stored) => stored,
        Err(e) => {
            warn!("[{}] Failed to read state for run '{}': {}", name, run_id, e);
            None
        }
    };
    let mut current = RunState::or_initial(stored, tracks_rows);

    match run(backend, output).await {
        Ok(processed) => {
            info!("[{}] Fetch complete, total rows processed: {}", name, processed);
            current.record_success(tracks_rows.then_some(processed));
        }
        Err(e) => {
            error!("Error fetching data from {}: {}", name, e);
            current.record_failure();
        }
    }

    if let Err(e) = state.set_state(run_id, &current).await {
        error!("[{}] Failed to save state for run '{}': {}", name, run_id, e);
    }

    current
}

async fn run<B>(backend: &B, output: &mut dyn BatchOutput) -> Result<u64>
where
    B: Backend + ?Sized,
{
    let name = Backend::name(backend);

    let mut session = backend.open().await?;
    info!("[{}] Connected", name);

    let expected = session.expected_rows();
    let drained = drain(session.batches(), output, name, expected).await;

    // Past a successful open the session is released whatever the drain did
    if let Err(e) = session.close().await {
        warn!("[{}] Failed to close connection: {}", name, e);
    }

    drained
}
