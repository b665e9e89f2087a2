//! Structural validation of plan snapshots.
//!
//! The changeset computation itself accepts any tree. Validation runs before a
//! push so that malformed snapshots fail early instead of halfway through a
//! sequence of backend writes.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::{FitplanError, Result, SnapshotError};

use super::plan::{is_temporary_id, FullPlan, Level};

/// Validation result containing all errors and warnings found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

/// Validator for plan snapshots.
#[derive(Debug, Default)]
pub struct PlanValidator;

impl PlanValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a single plan snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, plan: &FullPlan) -> Result<ValidationResult> {
        let result = self.check(plan);

        if let Some(first) = result.errors.first() {
            return Err(FitplanError::Snapshot(SnapshotError::Invalid {
                field: first.field.clone(),
                message: first.message.clone(),
            }));
        }

        debug!(
            "Plan {} passed validation with {} warnings",
            plan.id,
            result.warnings.len()
        );
        Ok(result)
    }

    /// Validates that two snapshots describe the same plan, then validates each.
    ///
    /// # Errors
    ///
    /// Returns an error if the root ids differ or either snapshot is invalid.
    pub fn validate_pair(&self, original: &FullPlan, current: &FullPlan) -> Result<ValidationResult> {
        if original.id != current.id {
            return Err(FitplanError::Snapshot(SnapshotError::PlanMismatch {
                original: original.id.clone(),
                current: current.id.clone(),
            }));
        }

        let mut result = self.validate(original)?;
        let current_result = self.validate(current)?;
        result.warnings.extend(current_result.warnings);
        Ok(result)
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, plan: &FullPlan) -> ValidationResult {
        let mut result = ValidationResult::default();

        if plan.id.is_empty() {
            result.error("plan.id", "Plan id cannot be empty");
        } else if is_temporary_id(&plan.id) {
            result.error(
                "plan.id",
                format!("Plan id '{}' is temporary; the plan must be persisted first", plan.id),
            );
        }

        let mut seen: [HashSet<&str>; 5] = Default::default();
        let mut temporary: HashMap<&str, Level> = HashMap::new();
        let mut week_numbers = HashSet::new();

        for (wi, week) in plan.weeks.iter().enumerate() {
            let path = format!("weeks[{wi}]");
            result.check_id(Level::Week, &week.id, &path, &mut seen[0]);
            result.check_temporary(Level::Week, &week.id, &path, &mut temporary);
            result.check_parent(&path, "plan_id", &week.plan_id, &plan.id);
            if !week_numbers.insert(week.week_number) {
                result.warn(format!("{path}: duplicate week number {}", week.week_number));
            }

            for (di, day) in week.days.iter().enumerate() {
                let path = format!("{path}.days[{di}]");
                result.check_id(Level::Day, &day.id, &path, &mut seen[1]);
                result.check_temporary(Level::Day, &day.id, &path, &mut temporary);
                result.check_parent(&path, "week_id", &day.week_id, &week.id);

                for (si, session) in day.sessions.iter().enumerate() {
                    let path = format!("{path}.sessions[{si}]");
                    result.check_id(Level::Session, &session.id, &path, &mut seen[2]);
                    result.check_temporary(Level::Session, &session.id, &path, &mut temporary);
                    result.check_parent(&path, "day_id", &session.day_id, &day.id);

                    for (ei, exercise) in session.exercises.iter().enumerate() {
                        let path = format!("{path}.exercises[{ei}]");
                        result.check_id(Level::Exercise, &exercise.id, &path, &mut seen[3]);
                        result.check_temporary(Level::Exercise, &exercise.id, &path, &mut temporary);
                        result.check_parent(&path, "session_id", &exercise.session_id, &session.id);
                        if exercise.exercise_id.is_empty() {
                            result.error(
                                format!("{path}.exercise_id"),
                                "Exercise must reference a library exercise",
                            );
                        }

                        for (ti, set) in exercise.sets.iter().enumerate() {
                            let path = format!("{path}.sets[{ti}]");
                            result.check_id(Level::Set, &set.id, &path, &mut seen[4]);
                            result.check_temporary(Level::Set, &set.id, &path, &mut temporary);
                            result.check_parent(
                                &path,
                                "plan_exercise_id",
                                &set.plan_exercise_id,
                                &exercise.id,
                            );
                            if set.set_number == 0 {
                                result.warn(format!("{path}: set number is 0"));
                            }
                        }
                    }
                }
            }
        }

        result
    }
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn check_id<'a>(&mut self, level: Level, id: &'a str, path: &str, seen: &mut HashSet<&'a str>) {
        if id.is_empty() {
            self.error(format!("{path}.id"), format!("{level} id cannot be empty"));
        } else if !seen.insert(id) {
            self.error(format!("{path}.id"), format!("Duplicate {level} id '{id}'"));
        }
    }

    /// Temporary ids name one entity each across the whole tree, since
    /// persisted ids are mapped back by id alone.
    fn check_temporary<'a>(
        &mut self,
        level: Level,
        id: &'a str,
        path: &str,
        temporary: &mut HashMap<&'a str, Level>,
    ) {
        if !is_temporary_id(id) {
            return;
        }
        if let Some(&other) = temporary.get(id) {
            if other != level {
                self.error(
                    format!("{path}.id"),
                    format!("Temporary id '{id}' is used by both a {other} and a {level}"),
                );
            }
        } else {
            temporary.insert(id, level);
        }
    }

    /// An empty parent field is allowed; the tree position is authoritative.
    fn check_parent(&mut self, path: &str, field: &str, value: &str, expected: &str) {
        if !value.is_empty() && value != expected {
            self.warn(format!(
                "{path}.{field} is '{value}' but the entity is nested under '{expected}'"
            ));
        }
    }
}
