//! Temporary identifier generation.
//!
//! Entities added in the editor receive ids from an injected [`IdGenerator`]
//! instead of module-level state, so tests can supply deterministic ids and a
//! persisted edit session can resume numbering where it stopped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::plan::TEMP_ID_PREFIX;

/// Mapping from temporary ids to backend-assigned ids.
pub type IdMap = HashMap<String, String>;

/// Source of fresh temporary identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns the next temporary identifier.
    fn next_id(&self) -> String;
}

/// Monotonic counter producing `temp-<n>` identifiers.
#[derive(Debug)]
pub struct CounterIdGenerator {
    next: AtomicU64,
}

impl CounterIdGenerator {
    /// Creates a generator starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a generator whose first id is `temp-<start>`.
    #[must_use]
    pub const fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Returns the number the next issued id will carry.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for CounterIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for CounterIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{TEMP_ID_PREFIX}{n}")
    }
}
