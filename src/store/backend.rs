use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::{fs::File, io::AsyncWriteExt};
use uuid::Uuid;
use tracing::{debug, error, info, warn};

use crate::{config::BackendKind, utils::dir::ensure_dir};

use super::entities::AppData;

pub const DATA_FILE: &str = "data.json";
const STAGING_SUFFIX: &str = ".tmp";
pub const LOCAL_STORAGE_KEY: &str = "chronify_data";

/// Where the application document lives. Every save replaces the whole document.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Returns the stored document. On first run the default document is written and returned.
    async fn load(&self) -> Result<AppData>;

    async fn save(&self, data: &AppData) -> Result<()>;
}

/// Picks the backend once, at startup.
pub fn open_backend(kind: BackendKind, data_dir: &Path) -> Arc<dyn StorageBackend> {
    match kind {
        BackendKind::File => Arc::new(FileBackend::new(data_dir)),
        BackendKind::LocalStorage => Arc::new(LocalStorageBackend::default()),
        BackendKind::Auto => match ensure_dir(data_dir.to_path_buf()) {
            Ok(dir) => {
                info!("Using file storage in {dir:?}");
                Arc::new(FileBackend::new(&dir))
            }
            Err(e) => {
                warn!("Data directory {data_dir:?} is unusable, falling back to key-value storage {e:?}");
                Arc::new(LocalStorageBackend::default())
            }
        },
    }
}

/// Stores the document as indented JSON inside the application data directory. Saves go to a
/// staging file first which is then renamed over the document.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(DATA_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Option<AppData>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        };

        let data = serde_json::from_str::<AppData>(&content)
            .with_context(|| format!("Stored document {:?} is not valid", self.path))?;
        Ok(Some(data))
    }

    /// Unique per write so that concurrent writers never share one.
    fn staging_path(&self) -> PathBuf {
        self.path
            .with_file_name(format!("{DATA_FILE}.{}{STAGING_SUFFIX}", Uuid::new_v4().simple()))
    }

    async fn write(path: &Path, content: &[u8]) -> Result<()> {
        let mut file = File::create(path)
            .await
            .with_context(|| format!("Failed to create {path:?}"))?;
        file.write_all(content).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn load(&self) -> Result<AppData> {
        match self.read().await? {
            Some(data) => {
                debug!("Loaded document from {:?}", self.path);
                Ok(data)
            }
            None => {
                info!("No document at {:?}, writing defaults", self.path);
                let data = AppData::default();
                self.save(&data).await?;
                Ok(data)
            }
        }
    }

    async fn save(&self, data: &AppData) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_vec_pretty(data)?;

        let staging = self.staging_path();
        let result = match Self::write(&staging, &content).await {
            Ok(()) => tokio::fs::rename(&staging, &self.path)
                .await
                .with_context(|| format!("Failed to replace {:?}", self.path)),
            Err(e) => Err(e),
        };
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&staging).await {
                debug!("Failed to remove {staging:?} {e}");
            }
        }
        result
    }
}

/// Key-value storage used where no application directory is available. Mirrors how a browser
/// keeps the document under a single key.
#[derive(Default)]
pub struct LocalStorageBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl LocalStorageBackend {
    pub fn with_value(value: impl Into<String>) -> Self {
        let backend = Self::default();
        backend.set_item(value.into());
        backend
    }

    pub fn get_item(&self) -> Option<String> {
        self.lock().get(LOCAL_STORAGE_KEY).cloned()
    }

    fn set_item(&self, value: String) {
        self.lock().insert(LOCAL_STORAGE_KEY.into(), value);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn load(&self) -> Result<AppData> {
        if let Some(stored) = self.get_item() {
            match serde_json::from_str::<AppData>(&stored) {
                Ok(data) => return Ok(data),
                Err(e) => error!("Failed to parse stored document {e}"),
            }
        }
        let data = AppData::default();
        self.save(&data).await?;
        Ok(data)
    }

    async fn save(&self, data: &AppData) -> Result<()> {
        let value = serde_json::to_string(data).map_err(|e| anyhow!("Can't serialize document {e}"))?;
        self.set_item(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;
    use crate::store::entities::Tag;

    fn sample() -> AppData {
        AppData {
            tags: vec![Tag {
                id: "t1".into(),
                name: "deep work".into(),
                color: "#228BE6".into(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn file_backend_writes_defaults_on_first_load() -> Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::new(dir.path());

        let data = backend.load().await?;

        assert_eq!(data, AppData::default());
        assert!(backend.path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn file_backend_round_trips_indented_json() -> Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::new(&dir.path().join("nested"));

        backend.save(&sample()).await?;
        let content = std::fs::read_to_string(backend.path())?;
        assert!(content.contains("\n  \"version\": 1"));

        assert_eq!(backend.load().await?, sample());
        Ok(())
    }

    #[tokio::test]
    async fn file_backend_replaces_longer_documents_completely() -> Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::new(dir.path());

        backend.save(&sample()).await?;
        backend.save(&AppData::default()).await?;

        assert_eq!(backend.load().await?, AppData::default());
        Ok(())
    }

    #[tokio::test]
    async fn file_backend_reports_corrupted_documents() -> Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::new(dir.path());
        std::fs::write(backend.path(), "{ not json")?;

        assert!(backend.load().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn interrupted_saves_leave_the_document_intact() -> Result<()> {
        let dir = tempdir()?;
        let backend = FileBackend::new(dir.path());
        backend.save(&sample()).await?;

        std::fs::write(dir.path().join(format!("{DATA_FILE}.left-over{STAGING_SUFFIX}")), "{ \"ver")?;
        assert_eq!(backend.load().await?, sample());

        backend.save(&AppData::default()).await?;
        let staged = std::fs::read_dir(dir.path())?
            .filter_map(|v| v.ok())
            .filter(|v| v.file_name().to_string_lossy().ends_with(STAGING_SUFFIX))
            .count();
        assert_eq!(staged, 1);
        assert_eq!(backend.load().await?, AppData::default());
        Ok(())
    }

    #[tokio::test]
    async fn auto_backend_falls_back_without_a_directory() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let backend = open_backend(BackendKind::Auto, &file.path().join("app"));

        backend.save(&sample()).await?;

        assert_eq!(backend.load().await?, sample());
        Ok(())
    }

    #[tokio::test]
    async fn local_storage_recovers_from_garbage() -> Result<()> {
        let backend = LocalStorageBackend::with_value("garbage");

        assert_eq!(backend.load().await?, AppData::default());
        let stored: AppData = serde_json::from_str(&backend.get_item().unwrap())?;
        assert_eq!(stored, AppData::default());
        Ok(())
    }

    #[tokio::test]
    async fn local_storage_round_trips() -> Result<()> {
        let backend = LocalStorageBackend::default();
        backend.save(&sample()).await?;
        assert_eq!(backend.load().await?, sample());
        Ok(())
    }

    #[tokio::test]
    async fn auto_backend_prefers_files() -> Result<()> {
        let dir = tempdir()?;
        let backend = open_backend(BackendKind::Auto, &dir.path().join("app"));

        backend.save(&sample()).await?;

        assert!(dir.path().join("app").join(DATA_FILE).exists());
        Ok(())
    }
}
