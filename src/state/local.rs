//! Local file-based session storage.
//!
//! The session lives in `session.json` inside the state directory, next to
//! a `session.lock` file taken for the duration of a push.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{FitplanError, Result, StateError};

use super::lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
use super::store::StateStore;
use super::types::{EditSession, STATE_VERSION};

/// Session file name.
const SESSION_FILE: &str = "session.json";

/// Lock file name.
const LOCK_FILE: &str = "session.lock";

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Path to the session file.
    session_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a store in the given directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let session_path = base_dir.join(SESSION_FILE);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            session_path,
            lock_path,
        }
    }

    /// Returns the path of the session file.
    #[must_use]
    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                StateError::write(format!("Failed to create state directory: {e}"))
            })?;
        }
        Ok(())
    }

    /// Writes `content` to `path` through a temporary file and rename.
    async fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        self.ensure_dir().await?;
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write(format!("Failed to create {}: {e}", temp_path.display())))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write(format!("Failed to write {}: {e}", temp_path.display())))?;

        file.sync_all()
            .await
            .map_err(|e| StateError::write(format!("Failed to sync {}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StateError::write(format!("Failed to rename {}: {e}", path.display())))?;

        Ok(())
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path).await.map_err(|e| {
            FitplanError::State(StateError::Corrupted {
                message: format!("Failed to read lock file: {e}"),
            })
        })?;

        let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
            FitplanError::State(StateError::Corrupted {
                message: format!("Failed to parse lock file: {e}"),
            })
        })?;

        Ok(Some(lock_info))
    }

    /// Creates the lock file with `content` unless it already exists.
    ///
    /// Returns `false` if another holder created it first.
    async fn create_lock_file(&self, content: &str) -> Result<bool> {
        self.ensure_dir().await?;
        let lock_failed = |e: std::io::Error| {
            FitplanError::State(StateError::LockFailed {
                message: format!("Failed to write lock file: {e}"),
            })
        };

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(lock_failed(e)),
        };

        file.write_all(content.as_bytes()).await.map_err(lock_failed)?;
        file.sync_all().await.map_err(lock_failed)?;
        Ok(true)
    }

    /// Deletes the lock file.
    async fn delete_lock_file(&self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).await.map_err(|e| {
                FitplanError::State(StateError::LockFailed {
                    message: format!("Failed to delete lock file: {e}"),
                })
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<EditSession>> {
        if !self.session_path.exists() {
            debug!("Session file does not exist: {}", self.session_path.display());
            return Ok(None);
        }

        debug!("Loading session from: {}", self.session_path.display());

        let content = fs::read_to_string(&self.session_path).await.map_err(|e| {
            FitplanError::State(StateError::Corrupted {
                message: format!("Failed to read session file: {e}"),
            })
        })?;

        let session: EditSession = serde_json::from_str(&content).map_err(|e| {
            FitplanError::State(StateError::Corrupted {
                message: format!("Failed to parse session file: {e}"),
            })
        })?;

        if session.version != STATE_VERSION {
            return Err(FitplanError::State(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: session.version,
            }));
        }

        Ok(Some(session))
    }

    async fn save(&self, session: &EditSession) -> Result<()> {
        let content = serde_json::to_string_pretty(session)
            .map_err(|e| StateError::serialization(format!("Failed to serialize session: {e}")))?;

        self.write_atomic(&self.session_path, &content).await?;
        debug!("Session saved to: {}", self.session_path.display());
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.session_path.exists() {
            info!("Deleting session file: {}", self.session_path.display());
            fs::remove_file(&self.session_path).await.map_err(|e| {
                StateError::write(format!("Failed to delete session file: {e}"))
            })?;
        }

        self.delete_lock_file().await
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.session_path.exists())
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id, operation);
        let content = serde_json::to_string_pretty(&lock_info)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;

        // One retry after removing an expired lock.
        for _ in 0..2 {
            if self.create_lock_file(&content).await? {
                info!(
                    "Acquired session lock: {} (expires in {LOCK_EXPIRY_SECS}s)",
                    lock_info.lock_id
                );
                return Ok(lock_info);
            }

            match self.read_lock_file().await? {
                Some(existing) if !existing.is_expired() => {
                    return Err(FitplanError::State(StateError::LockedByOther {
                        holder: existing.holder.clone(),
                        since: existing.acquired_at.to_rfc3339(),
                    }));
                }
                Some(existing) => {
                    warn!("Taking over expired lock held by {}", existing.holder);
                    self.delete_lock_file().await?;
                }
                None => debug!("Lock released while acquiring, retrying"),
            }
        }

        Err(FitplanError::State(StateError::LockFailed {
            message: String::from("Lock was taken by another process while acquiring"),
        }))
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                debug!("Released session lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn force_unlock(&self) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            warn!("Force-removing lock {existing}");
        }
        self.delete_lock_file().await
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    async fn is_locked(&self) -> Result<bool> {
        Ok(self
            .read_lock_file()
            .await?
            .is_some_and(|lock_info| !lock_info.is_expired()))
    }

    fn location(&self) -> String {
        self.session_path.display().to_string()
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
