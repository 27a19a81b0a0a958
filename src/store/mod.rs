//! The data store owns the only copy of the application document. Every mutation builds the
//! next document from the current one, swaps it in synchronously and hands it to a single
//! persistence worker which writes whole documents in the order they were produced.

pub mod backend;
pub mod backup;
pub mod entities;
pub mod ids;

use std::sync::Arc;

use anyhow::{Context, Result};
use backend::StorageBackend;
use backup::{parse_backup, BackupError};
use entities::{
    AppData, AppSettings, NewProject, NewTag, NewTimeEntry, Project, ProjectPatch, SettingsPatch,
    Tag, TimeEntry, TimeEntryPatch,
};
use ids::IdGenerator;
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, instrument};

use crate::utils::clock::Clock;

pub const NO_PROJECT: &str = "No Project";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence worker has stopped")]
    WorkerStopped,
}

struct PersistRequest {
    revision: u64,
    data: AppData,
}

pub struct DataStore {
    data: AppData,
    revision: u64,
    ids: Box<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    persist: mpsc::UnboundedSender<PersistRequest>,
    persisted: watch::Receiver<u64>,
    settings: watch::Sender<AppSettings>,
    worker: JoinHandle<()>,
}

impl DataStore {
    /// Loads the document once and starts the persistence worker. A failing backend never
    /// prevents startup, the store then begins from the default document.
    #[instrument(skip_all)]
    pub async fn open(
        backend: Arc<dyn StorageBackend>,
        ids: Box<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let data = match backend.load().await {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to load app data, starting from defaults {e:?}");
                AppData::default()
            }
        }
        .sorted();
        info!(
            "Loaded {} projects, {} entries, {} tags",
            data.projects.len(),
            data.time_entries.len(),
            data.tags.len()
        );

        let (persist, receiver) = mpsc::unbounded_channel();
        let (persisted_sender, persisted) = watch::channel(0);
        let worker = tokio::spawn(PersistenceWorker::new(receiver, backend, persisted_sender).run());
        let (settings, _) = watch::channel(data.settings.clone());

        Self {
            data,
            revision: 0,
            ids,
            clock,
            persist,
            persisted,
            settings,
            worker,
        }
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn settings(&self) -> &AppSettings {
        &self.data.settings
    }

    /// Follows settings as they change. The idle monitor uses it to pick up reminder changes.
    pub fn subscribe_settings(&self) -> watch::Receiver<AppSettings> {
        self.settings.subscribe()
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.data.projects.iter().find(|p| p.id == id)
    }

    /// Display name for a project reference. Missing and dangling references read as
    /// [NO_PROJECT].
    pub fn project_name(&self, id: Option<&str>) -> &str {
        id.and_then(|id| self.project(id))
            .map_or(NO_PROJECT, |p| p.name.as_str())
    }

    pub fn time_entry(&self, id: &str) -> Option<&TimeEntry> {
        self.data.time_entries.iter().find(|e| e.id == id)
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        let mut next = self.data.clone();
        patch.apply(&mut next.settings);
        self.commit(next);
    }

    pub fn add_project(&mut self, new: NewProject) -> Project {
        let now = self.clock.time();
        let project = Project {
            id: self.ids.next_id(),
            name: new.name,
            description: new.description,
            color: new.color,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };
        let mut next = self.data.clone();
        next.projects.push(project.clone());
        self.commit(next);
        project
    }

    /// Returns whether a project with `id` existed.
    pub fn update_project(&mut self, id: &str, patch: ProjectPatch) -> bool {
        let now = self.clock.time();
        let mut next = self.data.clone();
        let found = match next.projects.iter_mut().find(|p| p.id == id) {
            Some(project) => {
                patch.apply(project);
                project.updated_at = now;
                true
            }
            None => false,
        };
        if found {
            self.commit(next);
        }
        found
    }

    /// Entries that reference the project are kept as they are.
    pub fn delete_project(&mut self, id: &str) -> bool {
        let mut next = self.data.clone();
        next.projects.retain(|p| p.id != id);
        let found = next.projects.len() != self.data.projects.len();
        if found {
            self.commit(next);
        }
        found
    }

    pub fn add_time_entry(&mut self, new: NewTimeEntry) -> TimeEntry {
        let now = self.clock.time();
        let entry = TimeEntry {
            id: self.ids.next_id(),
            project_id: new.project_id,
            description: new.description,
            start_time: new.start_time,
            end_time: new.end_time,
            duration: new.duration,
            date: new.date,
            tags: new.tags,
            created_at: now,
            updated_at: now,
        };
        let mut next = self.data.clone();
        next.time_entries.push(entry.clone());
        self.commit(next);
        entry
    }

    pub fn update_time_entry(&mut self, id: &str, patch: TimeEntryPatch) -> bool {
        let now = self.clock.time();
        let mut next = self.data.clone();
        let found = match next.time_entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                patch.apply(entry);
                entry.updated_at = now;
                true
            }
            None => false,
        };
        if found {
            self.commit(next);
        }
        found
    }

    pub fn delete_time_entry(&mut self, id: &str) -> bool {
        let mut next = self.data.clone();
        next.time_entries.retain(|e| e.id != id);
        let found = next.time_entries.len() != self.data.time_entries.len();
        if found {
            self.commit(next);
        }
        found
    }

    pub fn add_tag(&mut self, new: NewTag) -> Tag {
        let tag = Tag {
            id: self.ids.next_id(),
            name: new.name,
            color: new.color,
        };
        let mut next = self.data.clone();
        next.tags.push(tag.clone());
        self.commit(next);
        tag
    }

    pub fn delete_tag(&mut self, id: &str) -> bool {
        let mut next = self.data.clone();
        next.tags.retain(|t| t.id != id);
        let found = next.tags.len() != self.data.tags.len();
        if found {
            self.commit(next);
        }
        found
    }

    /// Replaces everything, used when restoring a backup.
    pub fn set_all_data(&mut self, data: AppData) {
        self.commit(data);
    }

    pub fn reset_all(&mut self) {
        self.commit(AppData::default());
    }

    /// Validates a backup before touching anything. A rejected backup leaves the store as it was.
    pub fn import_backup(&mut self, content: &str) -> Result<(), BackupError> {
        let data = parse_backup(content)?;
        self.set_all_data(data);
        Ok(())
    }

    fn commit(&mut self, next: AppData) {
        self.data = next.sorted();
        self.revision += 1;
        self.settings.send_if_modified(|settings| {
            if *settings == self.data.settings {
                false
            } else {
                *settings = self.data.settings.clone();
                true
            }
        });

        let request = PersistRequest {
            revision: self.revision,
            data: self.data.clone(),
        };
        if self.persist.send(request).is_err() {
            error!("Persistence worker is gone, revision {} stays in memory", self.revision);
        }
    }

    /// Waits until the worker has attempted to write the latest revision. Write failures are
    /// only logged, so this succeeds even when the disk is behind.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let target = self.revision;
        let mut persisted = self.persisted.clone();
        persisted
            .wait_for(|revision| *revision >= target)
            .await
            .map_err(|_| StoreError::WorkerStopped)?;
        Ok(())
    }

    /// Writes out whatever is pending and stops the worker.
    pub async fn close(self) -> Result<()> {
        let DataStore {
            persist, worker, ..
        } = self;
        drop(persist);
        worker.await.context("Persistence worker failed")?;
        Ok(())
    }
}

/// Writes documents one after another. When several are queued only the newest is written,
/// older ones would be overwritten immediately anyway.
struct PersistenceWorker {
    receiver: mpsc::UnboundedReceiver<PersistRequest>,
    backend: Arc<dyn StorageBackend>,
    persisted: watch::Sender<u64>,
}

impl PersistenceWorker {
    fn new(
        receiver: mpsc::UnboundedReceiver<PersistRequest>,
        backend: Arc<dyn StorageBackend>,
        persisted: watch::Sender<u64>,
    ) -> Self {
        Self {
            receiver,
            backend,
            persisted,
        }
    }

    async fn run(mut self) {
        while let Some(mut request) = self.receiver.recv().await {
            while let Ok(newer) = self.receiver.try_recv() {
                debug!("Skipping revision {} in favor of {}", request.revision, newer.revision);
                request = newer;
            }

            match self.backend.save(&request.data).await {
                Ok(_) => debug!("Persisted revision {}", request.revision),
                Err(e) => error!("Failed to persist revision {}: {e:?}", request.revision),
            }
            self.persisted.send_replace(request.revision);
        }
        debug!("Persistence worker finished");
    }
}
