use ::async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use spout_core::{BatchOutput, Error, RecordBatch, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Where saved batches go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "lowercase")]
pub enum OutputConfig {
    Folder { path: PathBuf },
}

impl OutputConfig {
    pub async fn open(&self) -> Result<FolderOutput> {
        match self {
            OutputConfig::Folder { path } => FolderOutput::create(path).await,
        }
    }
}

/// Writes every saved batch to its own JSON file.
///
/// Files are named `<unix millis>-<sequence>-<uuid>.json`. The zero-padded
/// sequence counts the files this output wrote before, so a sorted listing
/// follows save order even for saves within the same millisecond.
#[derive(Debug, Clone)]
pub struct FolderOutput {
    folder: PathBuf,
    files_written: usize,
}

impl FolderOutput {
    /// Create the folder if needed
    pub async fn create(folder: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        tokio::fs::create_dir_all(&folder).await.map_err(|e| {
            Error::Output(format!("Failed to create {}: {}", folder.display(), e))
        })?;

        Ok(Self {
            folder,
            files_written: 0,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn files_written(&self) -> usize {
        self.files_written
    }
}

#[async_trait]
impl BatchOutput for FolderOutput {
    async fn save(&mut self, batch: RecordBatch) -> Result<()> {
        let file_name = format!(
            "{}-{:08}-{}.json",
            Utc::now().timestamp_millis(),
            self.files_written,
            Uuid::new_v4()
        );
        let path = self.folder.join(file_name);

        let json = serde_json::to_vec(&batch)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::Output(format!("Failed to write {}: {}", path.display(), e)))?;

        self.files_written += 1;
        debug!("Saved {} records to {}", batch.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn temp_folder() -> PathBuf {
        std::env::temp_dir().join(format!("spout-output-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_each_batch_is_one_file() {
        let folder = temp_folder();
        let mut output = FolderOutput::create(&folder).await.unwrap();

        output.save(vec![json!({ "id": 1 }), json!({ "id": 2 })]).await.unwrap();
        output.save(vec![json!({ "id": 3 })]).await.unwrap();

        let mut contents: Vec<Value> = std::fs::read_dir(&folder)
            .unwrap()
            .map(|entry| {
                let bytes = std::fs::read(entry.unwrap().path()).unwrap();
                serde_json::from_slice(&bytes).unwrap()
            })
            .collect();
        contents.sort_by_key(|batch| batch.as_array().map(Vec::len));

        assert_eq!(output.files_written(), 2);
        assert_eq!(contents, vec![json!([{ "id": 3 }]), json!([{ "id": 1 }, { "id": 2 }])]);

        std::fs::remove_dir_all(folder).unwrap();
    }

    #[tokio::test]
    async fn test_sorted_listing_follows_save_order() {
        let folder = temp_folder();
        let mut output = FolderOutput::create(&folder).await.unwrap();

        for id in 0..200 {
            output.save(vec![json!(id)]).await.unwrap();
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&folder)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        paths.sort();
        let ids: Vec<Value> = paths
            .iter()
            .map(|path| {
                let batch: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
                batch[0].clone()
            })
            .collect();

        assert_eq!(ids, (0..200).map(|id| json!(id)).collect::<Vec<_>>());

        std::fs::remove_dir_all(folder).unwrap();
    }

    #[tokio::test]
    async fn test_empty_batch_is_still_written() {
        let folder = temp_folder();
        let mut output = FolderOutput::create(&folder).await.unwrap();

        output.save(Vec::new()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(&folder).unwrap().collect();
        assert_eq!(entries.len(), 1);

        std::fs::remove_dir_all(folder).unwrap();
    }

    #[tokio::test]
    async fn test_output_config_opens_folder() {
        let folder = temp_folder();
        let config: OutputConfig = serde_json::from_value(json!({
            "type": "folder",
            "args": { "path": folder }
        }))
        .unwrap();

        let output = config.open().await.unwrap();

        assert_eq!(output.folder(), folder.as_path());
        assert!(folder.is_dir());

        std::fs::remove_dir_all(folder).unwrap();
    }
}
