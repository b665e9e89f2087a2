//! Sync plan executor.
//!
//! This module applies a sync plan against a backend, substituting
//! backend-assigned ids for temporary parent ids as creations complete.

use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::backend::PlanBackend;
use crate::error::{FitplanError, Result, SyncError};
use crate::model::{is_temporary_id, IdMap};

use super::plan::{ActionType, SyncAction, SyncPlan};

/// Marker error for actions skipped because a dependency failed.
const SKIPPED: &str = "Skipped due to dependency failure";

/// Executor for sync plans.
#[derive(Debug)]
pub struct SyncExecutor<'a, B: PlanBackend + ?Sized> {
    /// Target backend.
    backend: &'a B,
    /// Whether to continue on errors.
    continue_on_error: bool,
    /// Whether to run a plan that violates guardrails.
    force: bool,
}

/// Result of executing a single action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Action index.
    pub index: usize,
    /// Action that was executed.
    pub action: SyncAction,
    /// Whether the action succeeded.
    pub success: bool,
    /// Backend id assigned to a created entity.
    pub backend_id: Option<String>,
    /// Error message (if failed).
    pub error: Option<String>,
}

/// Result of executing the entire plan.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Individual action results.
    pub results: Vec<ActionResult>,
    /// Temporary ids mapped to backend ids for every successful creation.
    pub id_map: IdMap,
    /// Total actions executed.
    pub total_executed: usize,
    /// Number of successful actions.
    pub successful: usize,
    /// Number of failed actions.
    pub failed: usize,
    /// Number of skipped actions (due to dependency failures).
    pub skipped: usize,
    /// Number of actions never attempted because execution stopped early.
    pub not_attempted: usize,
    /// Whether the entire plan succeeded.
    pub success: bool,
}

impl<'a, B: PlanBackend + ?Sized> SyncExecutor<'a, B> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self {
            backend,
            continue_on_error: false,
            force: false,
        }
    }

    /// Sets whether to continue on errors.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Sets whether guardrail violations are overridden.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Executes a sync plan.
    ///
    /// Individual action failures are reported in the result, not as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan violates guardrails and `force` is not set.
    pub async fn execute(&self, plan: &SyncPlan) -> Result<ExecutionResult> {
        info!("Executing sync plan with {} actions", plan.actions.len());

        if !plan.passes_guardrails {
            if !self.force {
                error!("Plan does not pass guardrails");
                for violation in &plan.guardrail_violations {
                    error!("  - {violation}");
                }
                return Err(FitplanError::Sync(SyncError::Aborted {
                    reason: String::from("Plan violates guardrails"),
                }));
            }
            warn!(
                "Overriding {} guardrail violations",
                plan.guardrail_violations.len()
            );
        }

        let mut results = Vec::new();
        let mut id_map = IdMap::new();
        let mut failed_indices: HashSet<usize> = HashSet::new();

        for (idx, action) in plan.actions.iter().enumerate() {
            let deps_failed = action
                .dependencies
                .iter()
                .any(|dep| failed_indices.contains(dep));

            if deps_failed {
                warn!("Skipping action {idx} due to failed dependencies");
                results.push(ActionResult {
                    index: idx,
                    action: action.clone(),
                    success: false,
                    backend_id: None,
                    error: Some(String::from(SKIPPED)),
                });
                failed_indices.insert(idx);
                continue;
            }

            let result = self.execute_action(idx, action, &id_map).await;

            if result.success {
                if let Some(backend_id) = &result.backend_id {
                    id_map.insert(action.entity_id.clone(), backend_id.clone());
                }
            } else {
                failed_indices.insert(idx);

                if !self.continue_on_error {
                    results.push(result);
                    break;
                }
            }

            results.push(result);
        }

        let successful = results.iter().filter(|r| r.success).count();
        let skipped = results
            .iter()
            .filter(|r| r.error.as_deref() == Some(SKIPPED))
            .count();
        let failed = results.iter().filter(|r| !r.success).count() - skipped;
        let not_attempted = plan.actions.len() - results.len();

        Ok(ExecutionResult {
            total_executed: results.len(),
            successful,
            failed,
            skipped,
            not_attempted,
            success: failed == 0 && skipped == 0 && not_attempted == 0,
            id_map,
            results,
        })
    }

    /// Executes a single action.
    async fn execute_action(&self, index: usize, action: &SyncAction, ids: &IdMap) -> ActionResult {
        info!("Executing action {index}: {}", action.description());

        match action.action_type {
            ActionType::Create => self.execute_create(index, action, ids).await,
            ActionType::Delete => self.execute_delete(index, action).await,
        }
    }

    /// Executes a create action.
    async fn execute_create(&self, index: usize, action: &SyncAction, ids: &IdMap) -> ActionResult {
        let failure = |error: String| ActionResult {
            index,
            action: action.clone(),
            success: false,
            backend_id: None,
            error: Some(error),
        };

        let Some(payload) = &action.payload else {
            return failure(String::from("Missing creation payload"));
        };

        let parent_id = payload.parent_id();
        let payload = if is_temporary_id(parent_id) {
            let Some(real_parent) = ids.get(parent_id) else {
                return failure(format!("Parent '{parent_id}' has not been persisted"));
            };
            debug!("Resolved parent {parent_id} -> {real_parent}");
            payload.with_parent(real_parent)
        } else {
            payload.clone()
        };

        match self.backend.create_entity(&payload).await {
            Ok(backend_id) => {
                info!("Created {} {} (ID: {backend_id})", action.level, action.entity_id);
                ActionResult {
                    index,
                    action: action.clone(),
                    success: true,
                    backend_id: Some(backend_id),
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to create {} {}: {e}", action.level, action.entity_id);
                failure(e.to_string())
            }
        }
    }

    /// Executes a delete action.
    async fn execute_delete(&self, index: usize, action: &SyncAction) -> ActionResult {
        match self.backend.delete_entity(action.level, &action.entity_id).await {
            Ok(()) => {
                info!("Deleted {} {}", action.level, action.entity_id);
                ActionResult {
                    index,
                    action: action.clone(),
                    success: true,
                    backend_id: None,
                    error: None,
                }
            }
            Err(e) if e.is_not_found() => {
                info!("{} {} was already deleted", action.level, action.entity_id);
                ActionResult {
                    index,
                    action: action.clone(),
                    success: true,
                    backend_id: None,
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to delete {} {}: {e}", action.level, action.entity_id);
                ActionResult {
                    index,
                    action: action.clone(),
                    success: false,
                    backend_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl ExecutionResult {
    /// Returns true if all actions succeeded.
    #[must_use]
    pub const fn all_successful(&self) -> bool {
        self.success
    }

    /// Returns the first failed action as a sync error, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<SyncError> {
        self.results
            .iter()
            .find(|r| !r.success && r.error.as_deref() != Some(SKIPPED))
            .map(|r| SyncError::ActionFailed {
                action: r.action.action_type.to_string(),
                level: r.action.level.to_string(),
                id: r.action.entity_id.clone(),
                reason: r.error.clone().unwrap_or_default(),
            })
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Executed {} actions: {} successful, {} failed, {} skipped",
            self.total_executed, self.successful, self.failed, self.skipped
        )?;
        if self.not_attempted > 0 {
            write!(f, ", {} not attempted", self.not_attempted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::config::GuardrailsConfig;
    use crate::model::{
        CounterIdGenerator, Day, FullPlan, Level, PlanEditor, SetParams, Week,
    };
    use crate::planner::compute_changeset;

    fn base_plan() -> FullPlan {
        let mut plan = FullPlan::new("p1", "Base");
        plan.weeks.push(Week {
            id: String::from("w1"),
            plan_id: String::from("p1"),
            week_number: 1,
            days: vec![Day {
                id: String::from("d1"),
                week_id: String::from("w1"),
                day_number: 1,
                ..Day::default()
            }],
            ..Week::default()
        });
        plan
    }

    fn edited() -> FullPlan {
        let mut plan = base_plan();
        let ids = CounterIdGenerator::new();
        let mut editor = PlanEditor::new(&mut plan, &ids);
        let session = editor.add_session("d1", "Squat day").expect("day exists");
        let exercise = editor.add_exercise(&session, "back-squat").expect("session exists");
        editor
            .add_set(
                &exercise,
                SetParams {
                    reps: Some(5),
                    weight_kg: Some(100.0),
                    ..SetParams::default()
                },
            )
            .expect("exercise exists");
        plan
    }

    fn sync_plan(original: &FullPlan, current: &FullPlan) -> SyncPlan {
        let changeset = compute_changeset(original, current);
        SyncPlan::from_changeset(&changeset, original, None).expect("plan")
    }

    #[tokio::test]
    async fn test_nested_creates_resolve_parents() {
        let backend = InMemoryBackend::with_plans([base_plan()]);
        let plan = sync_plan(&base_plan(), &edited());

        let result = SyncExecutor::new(&backend).execute(&plan).await.expect("execute");

        assert!(result.all_successful());
        assert_eq!(result.id_map.len(), 3);
        let stored = backend.plan("p1").await.expect("plan");
        let session = &stored.weeks[0].days[0].sessions[0];
        assert_eq!(session.id, result.id_map["temp-1"]);
        assert_eq!(session.exercises[0].sets[0].reps, Some(5));
    }

    #[tokio::test]
    async fn test_id_map_has_one_entry_per_create() {
        let backend = InMemoryBackend::with_plans([base_plan()]);
        let mut current = edited();
        let ids = CounterIdGenerator::starting_at(4);
        PlanEditor::new(&mut current, &ids).add_week(2, Some(String::from("Deload")));
        let plan = sync_plan(&base_plan(), &current);

        let result = SyncExecutor::new(&backend).execute(&plan).await.expect("execute");

        let creates = result
            .results
            .iter()
            .filter(|r| r.success && r.action.action_type == ActionType::Create)
            .count();
        assert_eq!(creates, 4);
        assert_eq!(result.id_map.len(), creates);
        let distinct: HashSet<&String> = result.id_map.values().collect();
        assert_eq!(distinct.len(), creates);
    }

    #[tokio::test]
    async fn test_failure_skips_dependents() {
        let backend = InMemoryBackend::with_plans([base_plan()]);
        backend.fail_level(Level::Exercise).await;
        let plan = sync_plan(&base_plan(), &edited());

        let result = SyncExecutor::new(&backend)
            .with_continue_on_error(true)
            .execute(&plan)
            .await
            .expect("execute");

        assert!(!result.success);
        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 1);
        assert!(result.id_map.contains_key("temp-1"));
        assert!(matches!(
            result.first_failure(),
            Some(SyncError::ActionFailed { ref id, .. }) if id == "temp-2"
        ));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let backend = InMemoryBackend::with_plans([base_plan()]);
        backend.fail_level(Level::Session).await;
        let plan = sync_plan(&base_plan(), &edited());

        let result = SyncExecutor::new(&backend).execute(&plan).await.expect("execute");

        assert_eq!(result.total_executed, 1);
        assert_eq!(result.not_attempted, 2);
        assert!(result.id_map.is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_missing_entity_succeeds() {
        let mut original = base_plan();
        original.weeks[0].days.push(Day {
            id: String::from("d-gone"),
            ..Day::default()
        });
        let backend = InMemoryBackend::with_plans([base_plan()]);
        let plan = sync_plan(&original, &base_plan());

        let result = SyncExecutor::new(&backend).execute(&plan).await.expect("execute");
        assert!(result.all_successful());
        assert_eq!(result.successful, 1);
    }

    #[tokio::test]
    async fn test_guardrails_block_unless_forced() {
        let backend = InMemoryBackend::with_plans([base_plan()]);
        let mut current = base_plan();
        current.weeks.clear();
        let changeset = compute_changeset(&base_plan(), &current);
        let guardrails = GuardrailsConfig {
            max_deletes: None,
            block_week_deletes: true,
        };
        let plan = SyncPlan::from_changeset(&changeset, &base_plan(), Some(&guardrails))
            .expect("plan");

        let blocked = SyncExecutor::new(&backend).execute(&plan).await;
        assert!(matches!(blocked, Err(FitplanError::Sync(SyncError::Aborted { .. }))));
        assert!(backend.calls().await.is_empty());

        let forced = SyncExecutor::new(&backend)
            .with_force(true)
            .execute(&plan)
            .await
            .expect("forced");
        assert!(forced.all_successful());
        assert_eq!(backend.calls().await, vec!["delete_plan_week"]);
    }
}
