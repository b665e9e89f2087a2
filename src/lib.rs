// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # fitplan sync
//!
//! Offline editing of training plans with changeset-based synchronization.
//!
//! ## Overview
//!
//! A training plan is a tree: weeks contain days, days contain sessions,
//! sessions contain exercises and exercises contain sets. fitplan lets you:
//!
//! - Check a plan out of the backend into a local session
//! - Edit the working snapshot offline; new entities get `temp-` ids
//! - Compute what was added and deleted at each level
//! - Push the changes back as ordered remote procedure calls
//!
//! ## Architecture
//!
//! The system is built around two snapshots of the same plan:
//!
//! 1. **Baseline**: the plan as last fetched from the backend
//! 2. **Working**: the plan as edited locally
//! 3. **Changeset**: entities with temporary ids are additions, ids missing
//!    from the working snapshot are deletions
//!
//! ## Modules
//!
//! - [`model`]: Plan hierarchy, temporary ids, editor and snapshot files
//! - [`planner`]: Changeset computation, sync planning and execution
//! - [`backend`]: Backend interface and remote procedure client
//! - [`state`]: Local session storage and locking
//! - [`sync`]: Checkout, edit and push workflow
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```
//! use fitplan_sync::model::{CounterIdGenerator, FullPlan, PlanEditor};
//! use fitplan_sync::planner::compute_changeset;
//!
//! let original = FullPlan::new("plan-1", "Strength block");
//! let mut current = original.clone();
//! let ids = CounterIdGenerator::new();
//! PlanEditor::new(&mut current, &ids).add_week(1, None);
//!
//! let changeset = compute_changeset(&original, &current);
//! assert_eq!(changeset.weeks.added.len(), 1);
//! assert_eq!(changeset.weeks.added[0].id, "temp-1");
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod planner;
pub mod state;
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{InMemoryBackend, PlanBackend, RpcClient};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, SyncConfig};
pub use error::{FitplanError, Result};
pub use model::{FullPlan, IdGenerator, Level, PlanEditor};
pub use planner::{compute_changeset, PlanChangeset, SyncExecutor, SyncPlan};
pub use state::{EditSession, LocalStateStore, StateStore};
pub use sync::Synchronizer;
