//! Edit session state.
//!
//! This module persists the checked-out plan: baseline and working
//! snapshots, temporary id numbering, the push lock and session history.

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalStateStore;
pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
pub use store::StateStore;
pub use types::{EditSession, SyncHistoryEntry, SyncOperation, STATE_VERSION};
