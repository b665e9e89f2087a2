//! State store trait definition.

use async_trait::async_trait;

use super::lock::LockInfo;
use super::types::EditSession;
use crate::error::Result;

/// Trait for edit session storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the edit session.
    ///
    /// Returns `None` if nothing has been checked out yet.
    async fn load(&self) -> Result<Option<EditSession>>;

    /// Saves the edit session.
    async fn save(&self, session: &EditSession) -> Result<()>;

    /// Deletes the edit session and any lock.
    async fn delete(&self) -> Result<()>;

    /// Checks if a session exists.
    async fn exists(&self) -> Result<bool>;

    /// Acquires the session lock for an operation.
    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo>;

    /// Releases the lock if `lock_id` still owns it.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Removes the lock regardless of owner.
    async fn force_unlock(&self) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if the session is locked by an unexpired lock.
    async fn is_locked(&self) -> Result<bool>;

    /// Describes where the session is stored.
    fn location(&self) -> String;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn load(&self) -> Result<Option<EditSession>> {
        (**self).load().await
    }

    async fn save(&self, session: &EditSession) -> Result<()> {
        (**self).save(session).await
    }

    async fn delete(&self) -> Result<()> {
        (**self).delete().await
    }

    async fn exists(&self) -> Result<bool> {
        (**self).exists().await
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        (**self).acquire_lock(holder, operation).await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        (**self).release_lock(lock_id).await
    }

    async fn force_unlock(&self) -> Result<()> {
        (**self).force_unlock().await
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        (**self).get_lock_info().await
    }

    async fn is_locked(&self) -> Result<bool> {
        (**self).is_locked().await
    }

    fn location(&self) -> String {
        (**self).location()
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
