//! A live tracking session holds an exclusive lock on `session.lock` in the data directory.
//! Other processes use it to tell whether time is being tracked right now.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, sync::watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::TimerStatus;

pub const SESSION_LOCK_FILE: &str = "session.lock";

pub struct SessionLock {
    file: File,
    path: PathBuf,
}

impl SessionLock {
    /// Returns `None` when another session already holds the lock.
    pub async fn acquire(data_dir: &Path) -> Result<Option<Self>> {
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(SESSION_LOCK_FILE);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {path:?}"))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired session lock {path:?}");
                Ok(Some(Self { file, path }))
            }
            Err(e) => {
                info!("Session lock {path:?} is taken {e}");
                Ok(None)
            }
        }
    }

    pub async fn release(self) -> Result<()> {
        self.file.unlock_async().await?;
        debug!("Released session lock {:?}", self.path);
        Ok(())
    }
}

/// Whether some process holds the session lock in `data_dir`.
pub async fn session_is_live(data_dir: &Path) -> bool {
    let path = data_dir.join(SESSION_LOCK_FILE);
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return false,
        Err(e) => {
            debug!("Can't open {path:?} {e}");
            return false;
        }
    };

    if file.try_lock_shared().is_err() {
        return true;
    }
    if let Err(e) = file.unlock_async().await {
        debug!("Failed to unlock {path:?} {e}");
    }
    false
}

/// Publishes `Running` while a session in `data_dir` is live and `Idle` otherwise.
pub async fn watch_sessions(
    data_dir: PathBuf,
    interval: Duration,
    status: watch::Sender<TimerStatus>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let next = if session_is_live(&data_dir).await {
                    TimerStatus::Running
                } else {
                    TimerStatus::Idle
                };
                status.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        info!("Tracking session status is now {next:?}");
                        *current = next;
                        true
                    }
                });
            }
        }
    }
    debug!("Session watcher finished");
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn only_one_session_holds_the_lock() -> Result<()> {
        let dir = tempdir()?;
        assert!(!session_is_live(dir.path()).await);

        let lock = SessionLock::acquire(dir.path()).await?.unwrap();
        assert!(session_is_live(dir.path()).await);
        assert!(SessionLock::acquire(dir.path()).await?.is_none());

        lock.release().await?;
        assert!(!session_is_live(dir.path()).await);
        assert!(SessionLock::acquire(dir.path()).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn watcher_follows_sessions_of_other_processes() -> Result<()> {
        let dir = tempdir()?;
        let (sender, mut status) = watch::channel(TimerStatus::Idle);
        let shutdown = CancellationToken::new();
        let watcher = tokio::spawn(watch_sessions(
            dir.path().to_path_buf(),
            Duration::from_millis(10),
            sender,
            shutdown.clone(),
        ));

        let lock = SessionLock::acquire(dir.path()).await?.unwrap();
        status.wait_for(|v| *v == TimerStatus::Running).await?;

        lock.release().await?;
        status.wait_for(|v| *v == TimerStatus::Idle).await?;

        shutdown.cancel();
        watcher.await?;
        Ok(())
    }
}
