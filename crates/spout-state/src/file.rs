use ::async_trait::async_trait;
use spout_core::{Error, Result, RunState, StateStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One JSON document per run id under a directory
#[derive(Debug, Clone)]
pub struct FileState {
    storage_dir: PathBuf,
}

impl FileState {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Percent-encoded, so distinct run ids never share a file
    fn path_for(&self, run_id: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.json", urlencoding::encode(run_id)))
    }
}

#[async_trait]
impl StateStore for FileState {
    async fn get_state(&self, run_id: &str) -> Result<Option<RunState>> {
        let path = self.path_for(run_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::State(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let state = serde_json::from_str(&content)
            .map_err(|e| Error::State(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(Some(state))
    }

    async fn set_state(&self, run_id: &str, state: &RunState) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| Error::State(format!("Failed to create state directory: {}", e)))?;

        let path = self.path_for(run_id);
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::State(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!("Saved state for run '{}' to {}", run_id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> FileState {
        FileState::new(std::env::temp_dir().join(format!("spout-state-{}", uuid::Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_missing_run_is_none() {
        let store = temp_store();
        assert_eq!(store.get_state("never-ran").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_state_survives_a_new_store() {
        let store = temp_store();
        let state = RunState {
            success_count: 2,
            failure_count: 1,
            processed_rows: Some(250),
        };
        store.set_state("nightly", &state).await.unwrap();

        let reopened = FileState::new(store.storage_dir());
        assert_eq!(reopened.get_state("nightly").await.unwrap(), Some(state));

        std::fs::remove_dir_all(store.storage_dir()).unwrap();
    }

    #[tokio::test]
    async fn test_run_ids_are_encoded() {
        let store = temp_store();
        store
            .set_state("../escape/run", &RunState::initial(false))
            .await
            .unwrap();

        assert!(store.storage_dir().join("..%2Fescape%2Frun.json").exists());
        assert!(store.get_state("../escape/run").await.unwrap().is_some());

        std::fs::remove_dir_all(store.storage_dir()).unwrap();
    }

    #[tokio::test]
    async fn test_similar_run_ids_keep_separate_files() {
        let store = temp_store();
        let slashed = RunState {
            success_count: 1,
            failure_count: 0,
            processed_rows: None,
        };
        let underscored = RunState {
            success_count: 0,
            failure_count: 3,
            processed_rows: None,
        };

        store.set_state("a/b", &slashed).await.unwrap();
        store.set_state("a_b", &underscored).await.unwrap();

        assert_eq!(store.get_state("a/b").await.unwrap(), Some(slashed));
        assert_eq!(store.get_state("a_b").await.unwrap(), Some(underscored));

        std::fs::remove_dir_all(store.storage_dir()).unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let store = temp_store();
        std::fs::create_dir_all(store.storage_dir()).unwrap();
        std::fs::write(store.storage_dir().join("bad.json"), "not json").unwrap();

        assert!(matches!(store.get_state("bad").await, Err(Error::State(_))));

        std::fs::remove_dir_all(store.storage_dir()).unwrap();
    }
}
