//! In-process plan backend.
//!
//! Mirrors the remote backend's behavior: ids are assigned on creation,
//! deletes cascade to descendants, and missing entities are reported as
//! not found. Individual levels can be made to fail.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{BackendError, FitplanError, Result};
use crate::model::{
    CounterIdGenerator, Day, EntityPayload, FullPlan, Level, PlanEditor, PlanExercise, PlanSet,
    Session, Week,
};

use super::api::PlanBackend;

/// Plan backend holding plans in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    /// Stored plans by id.
    plans: Mutex<HashMap<String, FullPlan>>,
    /// Levels whose writes fail.
    failing: Mutex<HashSet<Level>>,
    /// Log of executed writes, e.g. `create_plan_week`.
    calls: Mutex<Vec<String>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend seeded with plans.
    #[must_use]
    pub fn with_plans(plans: impl IntoIterator<Item = FullPlan>) -> Self {
        let plans = plans.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            plans: Mutex::new(plans),
            ..Self::default()
        }
    }

    /// Makes every create and delete at `level` fail.
    pub async fn fail_level(&self, level: Level) {
        self.failing.lock().await.insert(level);
    }

    /// Returns the stored copy of a plan.
    pub async fn plan(&self, plan_id: &str) -> Option<FullPlan> {
        self.plans.lock().await.get(plan_id).cloned()
    }

    /// Returns the procedure names of all executed writes, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn check_failing(&self, level: Level, procedure: &str) -> Result<()> {
        if self.failing.lock().await.contains(&level) {
            return Err(BackendError::rpc(procedure, 500, format!("{level} writes are failing")).into());
        }
        Ok(())
    }
}

fn not_found(level: Level, id: &str) -> FitplanError {
    FitplanError::Backend(BackendError::NotFound {
        level: level.name().to_string(),
        id: id.to_string(),
    })
}

/// Inserts the entity under its parent, returning false if the parent is missing.
fn insert(plan: &mut FullPlan, payload: &EntityPayload, id: &str) -> bool {
    let now = Some(chrono::Utc::now());

    match payload {
        EntityPayload::Week(w) => {
            if w.plan_id != plan.id {
                return false;
            }
            plan.weeks.push(Week {
                id: id.to_string(),
                plan_id: w.plan_id.clone(),
                week_number: w.week_number,
                title: w.title.clone(),
                created_at: now,
                updated_at: now,
                days: vec![],
            });
        }
        EntityPayload::Day(d) => {
            let Some(week) = plan.week_mut(&d.week_id) else {
                return false;
            };
            week.days.push(Day {
                id: id.to_string(),
                week_id: d.week_id.clone(),
                day_number: d.day_number,
                title: d.title.clone(),
                is_rest_day: d.is_rest_day,
                created_at: now,
                updated_at: now,
                sessions: vec![],
            });
        }
        EntityPayload::Session(s) => {
            let Some(day) = plan.day_mut(&s.day_id) else {
                return false;
            };
            day.sessions.push(Session {
                id: id.to_string(),
                day_id: s.day_id.clone(),
                title: s.title.clone(),
                session_order: s.session_order,
                notes: s.notes.clone(),
                completed: Some(false),
                created_at: now,
                updated_at: now,
                exercises: vec![],
            });
        }
        EntityPayload::Exercise(e) => {
            let Some(session) = plan.session_mut(&e.session_id) else {
                return false;
            };
            session.exercises.push(PlanExercise {
                id: id.to_string(),
                session_id: e.session_id.clone(),
                exercise_id: e.exercise_id.clone(),
                exercise_order: e.exercise_order,
                notes: e.notes.clone(),
                created_at: now,
                updated_at: now,
                sets: vec![],
            });
        }
        EntityPayload::Set(s) => {
            let Some(exercise) = plan.exercise_mut(&s.plan_exercise_id) else {
                return false;
            };
            exercise.sets.push(PlanSet {
                id: id.to_string(),
                plan_exercise_id: s.plan_exercise_id.clone(),
                set_number: s.set_number,
                reps: s.reps,
                weight_kg: s.weight_kg,
                rpe: s.rpe,
                rest_seconds: s.rest_seconds,
                duration_seconds: s.duration_seconds,
                completed: Some(false),
                created_at: now,
                updated_at: now,
            });
        }
    }

    true
}

#[async_trait]
impl PlanBackend for InMemoryBackend {
    async fn fetch_plan(&self, plan_id: &str) -> Result<FullPlan> {
        self.plans.lock().await.get(plan_id).cloned().ok_or_else(|| {
            FitplanError::Backend(BackendError::NotFound {
                level: String::from("plan"),
                id: plan_id.to_string(),
            })
        })
    }

    async fn create_entity(&self, payload: &EntityPayload) -> Result<String> {
        let level = payload.level();
        let procedure = level.create_procedure();
        self.check_failing(level, procedure).await?;

        let id = Uuid::new_v4().to_string();
        let mut plans = self.plans.lock().await;
        let inserted = plans.values_mut().any(|plan| insert(plan, payload, &id));
        if !inserted {
            let parent = level.parent().map_or("plan", Level::name);
            return Err(BackendError::rpc(
                procedure,
                409,
                format!("{parent} '{}' does not exist", payload.parent_id()),
            )
            .into());
        }
        drop(plans);

        self.calls.lock().await.push(procedure.to_string());
        debug!("Created {level} {id}");
        Ok(id)
    }

    async fn delete_entity(&self, level: Level, id: &str) -> Result<()> {
        let procedure = level.delete_procedure();
        self.check_failing(level, procedure).await?;

        let ids = CounterIdGenerator::new();
        let mut plans = self.plans.lock().await;
        let removed = plans
            .values_mut()
            .any(|plan| PlanEditor::new(plan, &ids).remove(level, id).is_ok());
        drop(plans);

        if !removed {
            return Err(not_found(level, id));
        }

        self.calls.lock().await.push(procedure.to_string());
        debug!("Deleted {level} {id}");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
