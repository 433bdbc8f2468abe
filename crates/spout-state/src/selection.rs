use crate::{FileState, PostgresState, RedisState};
use serde::{Deserialize, Serialize};
use spout_core::{MemoryState, Result, StateStore};
use std::path::PathBuf;

/// Which state store a run records its counters in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "lowercase")]
pub enum StateConfig {
    /// Forgotten when the process exits
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
    Redis {
        url: String,
        #[serde(default = "default_prefix")]
        prefix: String,
    },
    Postgres {
        url: String,
    },
}

fn default_prefix() -> String {
    "spout:state:".to_string()
}

impl StateConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StateConfig::Memory => "memory",
            StateConfig::File { .. } => "file",
            StateConfig::Redis { .. } => "redis",
            StateConfig::Postgres { .. } => "postgres",
        }
    }

    pub async fn open(&self) -> Result<Box<dyn StateStore>> {
        Ok(match self {
            StateConfig::Memory => Box::new(MemoryState::new()),
            StateConfig::File { path } => Box::new(FileState::new(path)),
            StateConfig::Redis { url, prefix } => Box::new(RedisState::connect(url, prefix.clone()).await?),
            StateConfig::Postgres { url } => Box::new(PostgresState::connect(url).await?),
        })
    }
}
