//! Training plan model.
//!
//! This module defines the plan hierarchy, temporary id generation, the
//! in-memory editor, and snapshot validation, hashing and file handling.

mod editor;
mod hash;
mod ids;
mod plan;
mod snapshot;
mod validator;

pub use editor::{PlanEditor, SetParams};
pub use hash::PlanHasher;
pub use ids::{CounterIdGenerator, IdGenerator, IdMap};
pub use plan::{
    is_temporary_id, Day, EntityPayload, FullPlan, Level, NewDay, NewExercise, NewSession, NewSet,
    NewWeek, PlanExercise, PlanSet, Session, Week, TEMP_ID_PREFIX,
};
pub use snapshot::{load_plan_file, parse_plan, save_plan_file, SnapshotFormat};
pub use validator::{PlanValidator, ValidationError, ValidationResult};
