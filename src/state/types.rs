//! Edit session types.
//!
//! A session holds the baseline snapshot fetched from the backend and the
//! working snapshot the user edits locally. Pushing turns their difference
//! into backend calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CounterIdGenerator, FullPlan};

/// Current version of the session format.
pub const STATE_VERSION: &str = "1.0";

/// A checked-out plan being edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSession {
    /// Session format version.
    pub version: String,
    /// Plan being edited.
    pub plan_id: String,
    /// Last snapshot known to match the backend.
    pub baseline: FullPlan,
    /// Locally edited snapshot.
    pub working: FullPlan,
    /// Content hash of the baseline.
    pub baseline_hash: String,
    /// Number carried by the next temporary id.
    pub next_temp_id: u64,
    /// When the plan was checked out.
    pub checked_out_at: DateTime<Utc>,
    /// When the session last pushed successfully.
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Recent operations, oldest first.
    #[serde(default)]
    pub history: Vec<SyncHistoryEntry>,
}

/// A single entry in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    /// When the operation occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of operation.
    pub operation: SyncOperation,
    /// Baseline hash after the operation.
    pub baseline_hash: String,
    /// Entities created.
    #[serde(default)]
    pub created: usize,
    /// Entities deleted.
    #[serde(default)]
    pub deleted: usize,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Types of session operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Plan fetched into a new session.
    Checkout,
    /// Changes pushed to the backend.
    Push,
    /// Working snapshot reset to the baseline.
    Discard,
    /// Working snapshot replaced from a file.
    Import,
}

impl EditSession {
    /// Starts a session whose working snapshot equals the baseline.
    #[must_use]
    pub fn new(baseline: FullPlan, baseline_hash: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            plan_id: baseline.id.clone(),
            working: baseline.clone(),
            baseline,
            baseline_hash: baseline_hash.to_string(),
            next_temp_id: 1,
            checked_out_at: Utc::now(),
            last_synced_at: None,
            history: Vec::new(),
        }
    }

    /// Returns an id generator continuing this session's numbering.
    #[must_use]
    pub const fn id_generator(&self) -> CounterIdGenerator {
        CounterIdGenerator::starting_at(self.next_temp_id)
    }

    /// Records how far a generator handed out by [`Self::id_generator`] got.
    pub fn record_ids(&mut self, ids: &CounterIdGenerator) {
        self.next_temp_id = self.next_temp_id.max(ids.peek());
    }

    /// Returns true if the working snapshot differs from the baseline.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.working != self.baseline
    }

    /// Replaces the baseline after a sync.
    pub fn reset_baseline(&mut self, baseline: FullPlan, baseline_hash: &str) {
        self.baseline = baseline;
        self.baseline_hash = baseline_hash.to_string();
    }

    /// Throws away local edits.
    pub fn discard(&mut self) {
        self.working = self.baseline.clone();
    }

    /// Adds a history entry, keeping at most `limit` entries.
    pub fn add_history(&mut self, entry: SyncHistoryEntry, limit: usize) {
        self.history.push(entry);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }

    /// Returns the most recent push, if any.
    #[must_use]
    pub fn last_push(&self) -> Option<&SyncHistoryEntry> {
        self.history
            .iter()
            .rev()
            .find(|e| e.operation == SyncOperation::Push)
    }
}

impl SyncHistoryEntry {
    /// Creates a successful history entry.
    #[must_use]
    pub fn new(operation: SyncOperation, baseline_hash: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            baseline_hash: baseline_hash.to_string(),
            created: 0,
            deleted: 0,
            success: true,
            error: None,
        }
    }

    /// Sets the created and deleted counts.
    #[must_use]
    pub const fn with_counts(mut self, created: usize, deleted: usize) -> Self {
        self.created = created;
        self.deleted = deleted;
        self
    }

    /// Marks the entry as failed.
    #[must_use]
    pub fn failed(mut self, error: &str) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self
    }
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Checkout => "checkout",
            Self::Push => "push",
            Self::Discard => "discard",
            Self::Import => "import",
        };
        write!(f, "{op}")
    }
}
