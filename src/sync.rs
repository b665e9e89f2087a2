//! Synchronizer for edit sessions.
//!
//! This module ties the pieces together: it checks a plan out of the
//! backend into a local session, applies edits to the working snapshot,
//! and pushes the resulting changeset back under the session lock.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::PlanBackend;
use crate::config::{GuardrailsConfig, SyncOptions};
use crate::error::{FitplanError, Result, StateError, SyncError};
use crate::model::{CounterIdGenerator, FullPlan, PlanEditor, PlanHasher, PlanValidator};
use crate::planner::{
    ActionType, ChangesetEngine, ExecutionResult, PlanChangeset, SyncExecutor, SyncPlan,
};
use crate::state::{
    generate_holder_id, EditSession, LockInfo, StateStore, SyncHistoryEntry, SyncOperation,
};

/// Synchronizer between the local edit session and the backend.
pub struct Synchronizer<'a, S: StateStore, B: PlanBackend> {
    /// Session store.
    store: &'a S,
    /// Plan backend.
    backend: &'a B,
    /// Push behavior.
    options: SyncOptions,
    /// Guardrails applied to sync plans.
    guardrails: Option<GuardrailsConfig>,
    /// Plan hasher.
    hasher: PlanHasher,
    /// Snapshot validator.
    validator: PlanValidator,
    /// Changeset engine.
    engine: ChangesetEngine,
}

/// Outcome of a push.
#[derive(Debug)]
pub struct PushReport {
    /// Plan that was executed.
    pub plan: SyncPlan,
    /// Execution outcome; `None` when there was nothing to push.
    pub execution: Option<ExecutionResult>,
    /// Whether the baseline was refreshed from the backend.
    pub refetched: bool,
    /// Session after the push.
    pub session: EditSession,
}

/// Local view of the session.
#[derive(Debug)]
pub struct SessionStatus {
    /// Current session.
    pub session: EditSession,
    /// Pending changes.
    pub changeset: PlanChangeset,
    /// Lock currently held on the session.
    pub lock: Option<LockInfo>,
}

/// Comparison of the baseline with the backend.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteStatus {
    /// Plan id.
    pub plan_id: String,
    /// Hash recorded at checkout or last push.
    pub baseline_hash: String,
    /// Hash of the plan as the backend has it now.
    pub remote_hash: String,
    /// True when the backend changed since the baseline was taken.
    pub stale: bool,
}

impl<'a, S: StateStore, B: PlanBackend> Synchronizer<'a, S, B> {
    /// Creates a new synchronizer with default options.
    #[must_use]
    pub fn new(store: &'a S, backend: &'a B) -> Self {
        Self {
            store,
            backend,
            options: SyncOptions::default(),
            guardrails: None,
            hasher: PlanHasher::new(),
            validator: PlanValidator::new(),
            engine: ChangesetEngine::new(),
        }
    }

    /// Sets push behavior.
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets guardrails.
    #[must_use]
    pub fn with_guardrails(mut self, guardrails: Option<GuardrailsConfig>) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// Loads the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if no plan is checked out or the session is unreadable.
    pub async fn load_session(&self) -> Result<EditSession> {
        self.store.load().await?.ok_or_else(|| {
            FitplanError::State(StateError::NoSession {
                location: self.store.location(),
            })
        })
    }

    /// Fetches a plan and starts a new session on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the current session has unpushed edits and
    /// `force` is not set, or if the plan cannot be fetched.
    pub async fn checkout(&self, plan_id: &str, force: bool) -> Result<EditSession> {
        if !force
            && let Some(existing) = self.store.load().await?
            && existing.is_dirty()
        {
            return Err(FitplanError::Sync(SyncError::Aborted {
                reason: format!(
                    "plan {} has unpushed edits; push or discard them first",
                    existing.plan_id
                ),
            }));
        }

        info!("Checking out plan {plan_id}");
        let plan = self.backend.fetch_plan(plan_id).await?;
        let validation = self.validator.validate(&plan)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let hash = self.hasher.hash_plan(&plan);
        let mut session = EditSession::new(plan, &hash);
        session.add_history(
            SyncHistoryEntry::new(SyncOperation::Checkout, &hash),
            self.options.history_limit,
        );
        self.store.save(&session).await?;

        info!(
            "Checked out plan {plan_id} ({})",
            self.hasher.short_hash(&hash)
        );
        Ok(session)
    }

    /// Applies an edit to the working snapshot and saves the session.
    ///
    /// The editor hands out temporary ids continuing the session's numbering.
    ///
    /// # Errors
    ///
    /// Returns an error if no session exists, the edit fails, or saving fails.
    pub async fn edit<T>(
        &self,
        apply: impl FnOnce(&mut PlanEditor<'_, CounterIdGenerator>) -> Result<T> + Send,
    ) -> Result<T> {
        let mut session = self.load_session().await?;
        let ids = session.id_generator();

        let output = {
            let mut editor = PlanEditor::new(&mut session.working, &ids);
            apply(&mut editor)?
        };

        session.record_ids(&ids);
        self.store.save(&session).await?;
        Ok(output)
    }

    /// Replaces the working snapshot, e.g. with a plan edited as a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan belongs to a different plan id or is invalid.
    pub async fn import(&self, plan: FullPlan) -> Result<EditSession> {
        let mut session = self.load_session().await?;
        self.validator.validate_pair(&session.baseline, &plan)?;

        if let Some(max) = plan.max_temporary_number() {
            session.next_temp_id = session.next_temp_id.max(max.saturating_add(1));
        }
        session.working = plan;
        session.add_history(
            SyncHistoryEntry::new(SyncOperation::Import, &session.baseline_hash),
            self.options.history_limit,
        );
        self.store.save(&session).await?;

        info!("Imported working snapshot for plan {}", session.plan_id);
        Ok(session)
    }

    /// Computes the pending changeset of the session.
    ///
    /// # Errors
    ///
    /// Returns an error if no session exists or a snapshot is invalid.
    pub async fn changeset(&self) -> Result<PlanChangeset> {
        let session = self.load_session().await?;
        self.changeset_of(&session)
    }

    fn changeset_of(&self, session: &EditSession) -> Result<PlanChangeset> {
        self.validator.validate_pair(&session.baseline, &session.working)?;
        Ok(self.engine.compute(&session.baseline, &session.working))
    }

    /// Builds the sync plan for the pending changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the changeset cannot be computed or planned.
    pub async fn plan(&self) -> Result<SyncPlan> {
        let session = self.load_session().await?;
        let changeset = self.changeset_of(&session)?;
        SyncPlan::from_changeset(&changeset, &session.baseline, self.guardrails.as_ref())
    }

    /// Returns the session with its pending changes and lock.
    ///
    /// # Errors
    ///
    /// Returns an error if no session exists.
    pub async fn status(&self) -> Result<SessionStatus> {
        let session = self.load_session().await?;
        let changeset = self.changeset_of(&session)?;
        let lock = self.store.get_lock_info().await?;
        Ok(SessionStatus {
            session,
            changeset,
            lock,
        })
    }

    /// Pushes pending changes to the backend.
    ///
    /// Holds the session lock for the duration of the push and always
    /// releases it. Action failures do not make this return an error; they
    /// are reported in the execution result and the unapplied edits stay in
    /// the working snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is locked, the plan violates
    /// guardrails without `force`, or the session cannot be saved.
    pub async fn push(&self, force: bool) -> Result<PushReport> {
        let lock = self
            .store
            .acquire_lock(&generate_holder_id(), "push")
            .await?;

        let result = match self.load_session().await {
            Ok(mut session) => self.push_locked(&mut session, force).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.store.release_lock(&lock.lock_id).await {
            error!("Failed to release session lock {}: {e}", lock.lock_id);
        }

        result
    }

    async fn push_locked(&self, session: &mut EditSession, force: bool) -> Result<PushReport> {
        let changeset = self.changeset_of(session)?;
        let plan =
            SyncPlan::from_changeset(&changeset, &session.baseline, self.guardrails.as_ref())?;

        if plan.is_empty() {
            info!("Nothing to push for plan {}", session.plan_id);
            return Ok(PushReport {
                plan,
                execution: None,
                refetched: false,
                session: session.clone(),
            });
        }

        let execution = SyncExecutor::new(self.backend)
            .with_continue_on_error(self.options.continue_on_error)
            .with_force(force)
            .execute(&plan)
            .await?;

        info!("{execution}");
        session.working = session.working.remap_ids(&execution.id_map);

        let refetched = self.reset_baseline(session, &execution).await;

        let (created, deleted) = applied_counts(&execution);
        let mut entry = SyncHistoryEntry::new(SyncOperation::Push, &session.baseline_hash)
            .with_counts(created, deleted);
        if execution.all_successful() {
            session.last_synced_at = Some(Utc::now());
        } else if let Some(failure) = execution.first_failure() {
            entry = entry.failed(&failure.to_string());
        }
        session.add_history(entry, self.options.history_limit);

        self.store.save(session).await?;

        Ok(PushReport {
            plan,
            execution: Some(execution),
            refetched,
            session: session.clone(),
        })
    }

    /// Moves the baseline forward after an execution. Returns true if it was refetched.
    ///
    /// Without a refetch after a partial failure the old baseline is kept:
    /// created entities now carry backend ids in the working snapshot, and
    /// repeated deletes are reported as not found, which counts as success.
    async fn reset_baseline(&self, session: &mut EditSession, execution: &ExecutionResult) -> bool {
        if execution.all_successful() && !self.options.refetch_after_push {
            let hash = self.hasher.hash_plan(&session.working);
            session.reset_baseline(session.working.clone(), &hash);
            return false;
        }

        match self.backend.fetch_plan(&session.plan_id).await {
            Ok(remote) => {
                let hash = self.hasher.hash_plan(&remote);
                debug!("Refetched baseline {}", self.hasher.short_hash(&hash));
                session.reset_baseline(remote, &hash);
                if execution.all_successful() {
                    session.discard();
                }
                true
            }
            Err(e) => {
                warn!("Could not refetch plan {} after push: {e}", session.plan_id);
                false
            }
        }
    }

    /// Throws away local edits.
    ///
    /// # Errors
    ///
    /// Returns an error if no session exists or it cannot be saved.
    pub async fn discard(&self) -> Result<EditSession> {
        let mut session = self.load_session().await?;
        session.discard();
        session.add_history(
            SyncHistoryEntry::new(SyncOperation::Discard, &session.baseline_hash),
            self.options.history_limit,
        );
        self.store.save(&session).await?;

        info!("Discarded edits to plan {}", session.plan_id);
        Ok(session)
    }

    /// Compares the baseline with the plan currently on the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if no session exists or the plan cannot be fetched.
    pub async fn check_remote(&self) -> Result<RemoteStatus> {
        let session = self.load_session().await?;
        let remote = self.backend.fetch_plan(&session.plan_id).await?;
        let remote_hash = self.hasher.hash_plan(&remote);
        let stale = remote_hash != session.baseline_hash;

        if stale {
            warn!(
                "Plan {} changed on the backend since checkout ({} -> {})",
                session.plan_id,
                self.hasher.short_hash(&session.baseline_hash),
                self.hasher.short_hash(&remote_hash)
            );
        }

        Ok(RemoteStatus {
            plan_id: session.plan_id,
            baseline_hash: session.baseline_hash,
            remote_hash,
            stale,
        })
    }
}

/// Counts successful creates and deletes.
fn applied_counts(execution: &ExecutionResult) -> (usize, usize) {
    execution
        .results
        .iter()
        .filter(|r| r.success)
        .fold((0, 0), |(c, d), r| match r.action.action_type {
            ActionType::Create => (c + 1, d),
            ActionType::Delete => (c, d + 1),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::model::{Day, Level, SetParams, Week};
    use crate::state::LocalStateStore;
    use tempfile::TempDir;

    fn remote_plan() -> FullPlan {
        let mut plan = FullPlan::new("p1", "Strength block");
        plan.weeks = vec![
            Week {
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
            },
            Week {
                id: String::from("w2"),
                plan_id: String::from("p1"),
                week_number: 2,
                ..Week::default()
            },
        ];
        plan
    }

    fn fixture() -> (LocalStateStore, InMemoryBackend, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalStateStore::with_base_dir(temp.path());
        let backend = InMemoryBackend::with_plans([remote_plan()]);
        (store, backend, temp)
    }

    #[tokio::test]
    async fn test_checkout_creates_clean_session() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend);

        let session = sync.checkout("p1", false).await.expect("checkout");
        assert!(!session.is_dirty());
        assert!(sync.changeset().await.expect("changeset").is_empty());
        assert_eq!(session.history[0].operation, SyncOperation::Checkout);
    }

    #[tokio::test]
    async fn test_checkout_refuses_to_drop_edits() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend);
        sync.checkout("p1", false).await.expect("checkout");
        sync.edit(|e| Ok(e.add_week(3, None))).await.expect("edit");

        assert!(sync.checkout("p1", false).await.is_err());
        assert!(sync.checkout("p1", true).await.is_ok());
    }

    #[tokio::test]
    async fn test_commands_without_session() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend);

        let err = sync.changeset().await.expect_err("no session");
        assert!(matches!(err, FitplanError::State(StateError::NoSession { .. })));
    }

    #[tokio::test]
    async fn test_push_applies_edits_and_resets_baseline() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend);
        sync.checkout("p1", false).await.expect("checkout");

        sync.edit(|e| {
            let session = e.add_session("d1", "Heavy singles")?;
            let exercise = e.add_exercise(&session, "deadlift")?;
            e.add_set(
                &exercise,
                SetParams {
                    reps: Some(1),
                    weight_kg: Some(200.0),
                    ..SetParams::default()
                },
            )?;
            e.remove(Level::Week, "w2")
        })
        .await
        .expect("edit");

        let pending = sync.changeset().await.expect("changeset");
        assert_eq!(pending.added_count(), 3);
        assert_eq!(pending.weeks.deleted, vec!["w2"]);

        let report = sync.push(false).await.expect("push");
        let execution = report.execution.expect("executed");
        assert!(execution.all_successful());
        assert!(report.refetched);
        assert!(!report.session.is_dirty());
        assert!(!report.session.working.has_temporary_ids());
        assert!(report.session.last_synced_at.is_some());
        assert_eq!(
            report.session.last_push().map(|e| (e.created, e.deleted)),
            Some((3, 1))
        );

        let remote = backend.plan("p1").await.expect("plan");
        assert_eq!(remote.weeks.len(), 1);
        assert_eq!(remote.weeks[0].days[0].sessions[0].title, "Heavy singles");

        assert!(sync.changeset().await.expect("changeset").is_empty());
        assert!(!store.is_locked().await.expect("lock state"));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_unapplied_edits() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend).with_options(SyncOptions {
            continue_on_error: true,
            ..SyncOptions::default()
        });
        sync.checkout("p1", false).await.expect("checkout");
        sync.edit(|e| {
            let session = e.add_session("d1", "Accessories")?;
            e.add_exercise(&session, "curl")
        })
        .await
        .expect("edit");

        backend.fail_level(Level::Exercise).await;
        let report = sync.push(false).await.expect("push");
        let execution = report.execution.expect("executed");
        assert!(!execution.all_successful());
        assert!(!report.session.last_push().expect("entry").success);

        // The session now has a backend id; only the exercise is still pending.
        let pending = sync.changeset().await.expect("changeset");
        assert_eq!(pending.sessions.added.len(), 0);
        assert_eq!(pending.exercises.added.len(), 1);
        assert_eq!(
            pending.exercises.added[0].session_id,
            execution.id_map["temp-1"]
        );
        assert!(!store.is_locked().await.expect("lock state"));
    }

    #[tokio::test]
    async fn test_push_without_refetch_uses_working_tree() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend).with_options(SyncOptions {
            refetch_after_push: false,
            ..SyncOptions::default()
        });
        sync.checkout("p1", false).await.expect("checkout");
        sync.edit(|e| e.add_day("w2", 1, Some(String::from("Rest"))))
            .await
            .expect("edit");

        let report = sync.push(false).await.expect("push");
        assert!(!report.refetched);
        assert!(!report.session.is_dirty());
        assert!(!report.session.baseline.has_temporary_ids());
    }

    #[tokio::test]
    async fn test_guardrails_abort_push_and_release_lock() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend).with_guardrails(Some(GuardrailsConfig {
            max_deletes: None,
            block_week_deletes: true,
        }));
        sync.checkout("p1", false).await.expect("checkout");
        sync.edit(|e| e.remove(Level::Week, "w1")).await.expect("edit");

        assert!(!sync.plan().await.expect("plan").passes_guardrails);
        assert!(sync.push(false).await.is_err());
        assert!(!store.is_locked().await.expect("lock state"));
        assert_eq!(backend.plan("p1").await.expect("plan").weeks.len(), 2);

        let report = sync.push(true).await.expect("forced push");
        assert!(report.execution.expect("executed").all_successful());
    }

    #[tokio::test]
    async fn test_discard_and_empty_push() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend);
        sync.checkout("p1", false).await.expect("checkout");
        sync.edit(|e| Ok(e.add_week(3, None))).await.expect("edit");

        let session = sync.discard().await.expect("discard");
        assert!(!session.is_dirty());

        let report = sync.push(false).await.expect("push");
        assert!(report.execution.is_none());
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_import_rejects_other_plan() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend);
        sync.checkout("p1", false).await.expect("checkout");

        assert!(sync.import(FullPlan::new("p2", "Other")).await.is_err());

        let mut edited = remote_plan();
        edited.weeks.pop();
        let session = sync.import(edited).await.expect("import");
        assert!(session.is_dirty());
        assert_eq!(sync.changeset().await.expect("changeset").weeks.deleted, vec!["w2"]);
    }

    #[tokio::test]
    async fn test_import_then_edit_issues_fresh_temporary_ids() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend).with_options(SyncOptions {
            refetch_after_push: false,
            ..SyncOptions::default()
        });
        sync.checkout("p1", false).await.expect("checkout");

        let mut edited = remote_plan();
        edited.weeks.push(Week {
            id: String::from("temp-1"),
            plan_id: String::from("p1"),
            week_number: 3,
            ..Week::default()
        });
        let session = sync.import(edited).await.expect("import");
        assert_eq!(session.next_temp_id, 2);

        let session_id = sync
            .edit(|e| e.add_session("d1", "Conditioning"))
            .await
            .expect("edit");
        assert_eq!(session_id, "temp-2");

        let report = sync.push(false).await.expect("push");
        let execution = report.execution.expect("executed");
        assert!(execution.all_successful());
        assert_eq!(execution.id_map.len(), 2);

        let remote = backend.plan("p1").await.expect("plan");
        let baseline = &report.session.baseline;
        assert_eq!(baseline.weeks[2].id, remote.weeks[2].id);
        assert_eq!(
            baseline.weeks[0].days[0].sessions[0].id,
            remote.weeks[0].days[0].sessions[0].id
        );
        assert_ne!(baseline.weeks[2].id, baseline.weeks[0].days[0].sessions[0].id);
    }

    /// Store that finishes another process's push while this one waits for the lock.
    struct ConcurrentPushStore {
        inner: LocalStateStore,
    }

    #[async_trait::async_trait]
    impl StateStore for ConcurrentPushStore {
        async fn load(&self) -> Result<Option<EditSession>> {
            self.inner.load().await
        }

        async fn save(&self, session: &EditSession) -> Result<()> {
            self.inner.save(session).await
        }

        async fn delete(&self) -> Result<()> {
            self.inner.delete().await
        }

        async fn exists(&self) -> Result<bool> {
            self.inner.exists().await
        }

        async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
            if let Some(mut session) = self.inner.load().await? {
                session.working = session.baseline.clone();
                self.inner.save(&session).await?;
            }
            self.inner.acquire_lock(holder, operation).await
        }

        async fn release_lock(&self, lock_id: &str) -> Result<()> {
            self.inner.release_lock(lock_id).await
        }

        async fn force_unlock(&self) -> Result<()> {
            self.inner.force_unlock().await
        }

        async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
            self.inner.get_lock_info().await
        }

        async fn is_locked(&self) -> Result<bool> {
            self.inner.is_locked().await
        }

        fn location(&self) -> String {
            self.inner.location()
        }

        fn backend_type(&self) -> &'static str {
            "concurrent"
        }
    }

    #[tokio::test]
    async fn test_push_reads_session_after_locking() {
        let (inner, backend, _temp) = fixture();
        let store = ConcurrentPushStore { inner };
        let sync = Synchronizer::new(&store, &backend);
        sync.checkout("p1", false).await.expect("checkout");
        sync.edit(|e| Ok(e.add_week(3, None))).await.expect("edit");

        let report = sync.push(false).await.expect("push");
        assert!(report.execution.is_none());
        assert!(backend.calls().await.is_empty());
        assert!(!store.is_locked().await.expect("lock state"));
    }

    #[tokio::test]
    async fn test_check_remote_detects_stale_baseline() {
        let (store, backend, _temp) = fixture();
        let sync = Synchronizer::new(&store, &backend);
        sync.checkout("p1", false).await.expect("checkout");

        assert!(!sync.check_remote().await.expect("remote").stale);

        backend.delete_entity(Level::Week, "w2").await.expect("delete");
        assert!(sync.check_remote().await.expect("remote").stale);
    }
}
