//! Planning module for sync operations.
//!
//! This module computes the changeset between the baseline and working
//! snapshots and turns it into an ordered plan of backend actions.

mod diff;
mod executor;
mod plan;

pub use diff::{compute_changeset, ChangesetEngine, LevelChanges, LevelSummary, PlanChangeset};
pub use executor::{ActionResult, ExecutionResult, SyncExecutor};
pub use plan::{ActionType, SyncAction, SyncPlan};
