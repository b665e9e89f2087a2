//! Sync plan types and construction.
//!
//! A sync plan turns a changeset into an ordered list of backend actions:
//! deletions first, then creations level by level so that every parent is
//! created before its children. A creation under a not-yet-persisted parent
//! depends on the parent's creation action, whose backend id is substituted
//! at execution time.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::GuardrailsConfig;
use crate::error::{FitplanError, PlanError, Result};
use crate::model::{is_temporary_id, EntityPayload, FullPlan, Level};

use super::diff::{parent_index, PlanChangeset};

/// A complete sync plan.
#[derive(Debug)]
pub struct SyncPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Root plan id.
    pub plan_id: String,
    /// Planned actions in execution order.
    pub actions: Vec<SyncAction>,
    /// Deletions dropped because an ancestor deletion cascades to them.
    pub pruned_deletes: usize,
    /// Whether the plan passes guardrails.
    pub passes_guardrails: bool,
    /// Guardrail violations (if any).
    pub guardrail_violations: Vec<String>,
}

/// A single planned action.
#[derive(Debug, Clone)]
pub struct SyncAction {
    /// Action type.
    pub action_type: ActionType,
    /// Hierarchy level of the entity.
    pub level: Level,
    /// Entity id (temporary for creations).
    pub entity_id: String,
    /// Creation payload (creations only).
    pub payload: Option<EntityPayload>,
    /// Reason for this action.
    pub reason: String,
    /// Dependencies (action indices that must complete first).
    pub dependencies: Vec<usize>,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Create a new entity.
    Create,
    /// Delete an existing entity.
    Delete,
}

impl SyncPlan {
    /// Creates a new plan from a changeset.
    ///
    /// `original` is the baseline the changeset was computed from; it is used
    /// to drop deletions already covered by an ancestor's cascading delete.
    ///
    /// # Errors
    ///
    /// Returns an error if a creation references a temporary parent that is
    /// not itself created by the plan.
    pub fn from_changeset(
        changeset: &PlanChangeset,
        original: &FullPlan,
        guardrails: Option<&GuardrailsConfig>,
    ) -> Result<Self> {
        let mut actions = Vec::new();
        let mut pruned_deletes = 0;

        // Process deletes first, parents before children
        let parents = parent_index(original);
        for level in Level::ALL {
            for id in changeset.deleted(level) {
                if is_temporary_id(id) {
                    debug!("Skipping delete of unpersisted {level} {id}");
                    continue;
                }

                if ancestor_deleted(changeset, &parents, level, id) {
                    debug!("Delete of {level} {id} is covered by an ancestor delete");
                    pruned_deletes += 1;
                    continue;
                }

                actions.push(SyncAction {
                    action_type: ActionType::Delete,
                    level,
                    entity_id: id.clone(),
                    payload: None,
                    reason: format!("{level} removed from plan"),
                    dependencies: vec![],
                });
            }
        }

        // Process creates; payload levels are already ordered parents first.
        // Persisted ids are mapped back by id alone, so a temporary id may be
        // created only once across all levels.
        let mut create_index: HashMap<(Level, String), usize> = HashMap::new();
        let mut created_at_level: HashMap<String, Level> = HashMap::new();
        for payload in changeset.added_payloads() {
            let level = payload.level();
            if let Some(first) = created_at_level.insert(payload.id().to_string(), level) {
                return Err(FitplanError::Plan(PlanError::DuplicateTemporaryId {
                    id: payload.id().to_string(),
                    first: first.to_string(),
                    second: level.to_string(),
                }));
            }

            let parent_id = payload.parent_id();
            let dependencies = match level.parent() {
                Some(parent_level) if is_temporary_id(parent_id) => {
                    let key = (parent_level, parent_id.to_string());
                    let parent_idx = create_index.get(&key).copied().ok_or_else(|| {
                        FitplanError::Plan(PlanError::DependencyResolutionFailed {
                            message: format!(
                                "{level} '{}' references unpersisted {parent_level} '{parent_id}' that is not being created",
                                payload.id()
                            ),
                        })
                    })?;
                    vec![parent_idx]
                }
                _ => vec![],
            };

            create_index.insert((level, payload.id().to_string()), actions.len());
            actions.push(SyncAction {
                action_type: ActionType::Create,
                level,
                entity_id: payload.id().to_string(),
                reason: format!("{level} added in editor"),
                payload: Some(payload),
                dependencies,
            });
        }

        let guardrail_violations = Self::check_guardrails(guardrails, &actions);

        Ok(Self {
            created_at: Utc::now(),
            plan_id: changeset.plan_id.clone(),
            actions,
            pruned_deletes,
            passes_guardrails: guardrail_violations.is_empty(),
            guardrail_violations,
        })
    }

    /// Checks guardrails for the plan.
    fn check_guardrails(guardrails: Option<&GuardrailsConfig>, actions: &[SyncAction]) -> Vec<String> {
        let mut violations = Vec::new();

        let Some(guardrails) = guardrails else {
            return violations;
        };

        let deletes = actions
            .iter()
            .filter(|a| a.action_type == ActionType::Delete)
            .count();

        if let Some(max_deletes) = guardrails.max_deletes
            && deletes > max_deletes
        {
            violations.push(format!(
                "Plan deletes {deletes} entities but max_deletes is {max_deletes}"
            ));
        }

        if guardrails.block_week_deletes {
            for action in actions
                .iter()
                .filter(|a| a.action_type == ActionType::Delete && a.level == Level::Week)
            {
                violations.push(format!("Week '{}' would be deleted", action.entity_id));
            }
        }

        violations
    }

    /// Returns true if the plan is empty (no changes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub const fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of create actions.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == ActionType::Create)
            .count()
    }

    /// Returns the number of delete actions.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == ActionType::Delete)
            .count()
    }

    /// Gets actions that depend on a specific action index.
    #[must_use]
    pub fn dependent_actions(&self, action_idx: usize) -> Vec<(usize, &SyncAction)> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.dependencies.contains(&action_idx))
            .collect()
    }
}

/// Returns true if any ancestor of the entity is deleted in the same changeset.
fn ancestor_deleted(
    changeset: &PlanChangeset,
    parents: &HashMap<(Level, &str), &str>,
    level: Level,
    id: &str,
) -> bool {
    let mut current_level = level;
    let mut current_id = id;

    while let Some(parent_level) = current_level.parent() {
        let Some(parent_id) = parents.get(&(current_level, current_id)).copied() else {
            return false;
        };
        if changeset.deleted(parent_level).iter().any(|d| d == parent_id) {
            return true;
        }
        current_level = parent_level;
        current_id = parent_id;
    }

    false
}

impl SyncAction {
    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action_type {
            ActionType::Create => format!("Create {} '{}'", self.level, self.entity_id),
            ActionType::Delete => format!("Delete {} '{}'", self.level, self.entity_id),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.action_type, self.level, self.entity_id)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Sync Plan ({} actions):", self.actions.len())?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {i}. {action}")?;
        }

        if !self.guardrail_violations.is_empty() {
            writeln!(f, "\nGuardrail violations:")?;
            for violation in &self.guardrail_violations {
                writeln!(f, "  - {violation}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Day, Session, Week};
    use crate::planner::compute_changeset;

    fn base_plan() -> FullPlan {
        FullPlan {
            id: String::from("p1"),
            title: String::from("Plan"),
            weeks: vec![
                Week {
                    id: String::from("w1"),
                    week_number: 1,
                    days: vec![Day {
                        id: String::from("d1"),
                        sessions: vec![Session {
                            id: String::from("s1"),
                            title: String::from("Main"),
                            ..Session::default()
                        }],
                        ..Day::default()
                    }],
                    ..Week::default()
                },
                Week {
                    id: String::from("w2"),
                    week_number: 2,
                    ..Week::default()
                },
            ],
            ..FullPlan::default()
        }
    }

    #[test]
    fn test_deletes_come_first_and_cascades_are_pruned() {
        let original = base_plan();
        let mut current = base_plan();
        current.weeks.remove(0);
        current.weeks[0].days.push(Day {
            id: String::from("temp-1"),
            ..Day::default()
        });

        let changeset = compute_changeset(&original, &current);
        let plan = SyncPlan::from_changeset(&changeset, &original, None).expect("plan");

        assert_eq!(plan.delete_count(), 1);
        assert_eq!(plan.pruned_deletes, 2);
        assert_eq!(plan.actions[0].action_type, ActionType::Delete);
        assert_eq!(plan.actions[0].entity_id, "w1");
        assert_eq!(plan.actions[1].action_type, ActionType::Create);
        assert_eq!(plan.actions[1].entity_id, "temp-1");
        assert!(plan.actions[1].dependencies.is_empty());
    }

    #[test]
    fn test_creates_under_new_parent_depend_on_parent() {
        let original = base_plan();
        let mut current = base_plan();
        current.weeks[1].days.push(Day {
            id: String::from("temp-1"),
            sessions: vec![Session {
                id: String::from("temp-2"),
                title: String::from("Intervals"),
                ..Session::default()
            }],
            ..Day::default()
        });

        let changeset = compute_changeset(&original, &current);
        let plan = SyncPlan::from_changeset(&changeset, &original, None).expect("plan");

        assert_eq!(plan.create_count(), 2);
        assert_eq!(plan.actions[1].entity_id, "temp-2");
        assert_eq!(plan.actions[1].dependencies, vec![0]);
        assert_eq!(plan.dependent_actions(0).len(), 1);
    }

    #[test]
    fn test_unresolved_temporary_parent_fails() {
        let mut changeset = PlanChangeset {
            plan_id: String::from("p1"),
            ..PlanChangeset::default()
        };
        changeset.sessions.added.push(crate::model::NewSession {
            id: String::from("temp-5"),
            day_id: String::from("temp-4"),
            title: String::from("Orphan"),
            session_order: 1,
            notes: None,
        });

        let result = SyncPlan::from_changeset(&changeset, &base_plan(), None);
        assert!(matches!(
            result,
            Err(FitplanError::Plan(PlanError::DependencyResolutionFailed { .. }))
        ));
    }

    #[test]
    fn test_temporary_deletes_are_skipped() {
        let mut original = base_plan();
        original.weeks[1].days.push(Day {
            id: String::from("temp-9"),
            ..Day::default()
        });
        let current = base_plan();

        let changeset = compute_changeset(&original, &current);
        assert_eq!(changeset.days.deleted, vec!["temp-9"]);

        let plan = SyncPlan::from_changeset(&changeset, &original, None).expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_guardrails() {
        let original = base_plan();
        let mut current = base_plan();
        current.weeks.clear();

        let guardrails = GuardrailsConfig {
            max_deletes: Some(1),
            block_week_deletes: true,
        };
        let changeset = compute_changeset(&original, &current);
        let plan = SyncPlan::from_changeset(&changeset, &original, Some(&guardrails)).expect("plan");

        assert!(!plan.passes_guardrails);
        // One max_deletes violation plus one per deleted week.
        assert_eq!(plan.guardrail_violations.len(), 3);
    }

    #[test]
    fn test_temporary_id_created_at_two_levels_fails() {
        let original = base_plan();
        let mut current = base_plan();
        current.weeks.push(Week {
            id: String::from("temp-1"),
            week_number: 3,
            ..Week::default()
        });
        current.weeks[0].days[0].sessions.push(Session {
            id: String::from("temp-1"),
            title: String::from("Conditioning"),
            ..Session::default()
        });

        let changeset = compute_changeset(&original, &current);
        let result = SyncPlan::from_changeset(&changeset, &original, None);
        assert!(matches!(
            result,
            Err(FitplanError::Plan(PlanError::DuplicateTemporaryId { ref id, .. })) if id == "temp-1"
        ));
    }
}
