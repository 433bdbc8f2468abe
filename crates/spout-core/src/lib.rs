mod args;
mod backend;
mod drain;
mod error;
mod factory;
mod memory;
mod output;
mod record;
mod registry;
mod runner;
mod state;

pub use args::decode_args;
pub use backend::{Backend, Session};
pub use drain::drain;
pub use error::{Error, Result};
pub use factory::SpoutFactory;
pub use memory::{MemoryOutput, MemoryState};
pub use output::BatchOutput;
pub use record::{bytes_to_text, bytes_to_value, Record, RecordBatch};
pub use registry::Registry;
pub use runner::{fetch, Spout};
pub use state::{RunState, StateStore};

// Re-export for backend crates
pub use async_trait::async_trait;
pub use futures::stream::BoxStream;
