//! In-memory editing of the working plan snapshot.
//!
//! Edits never touch the backend. Added entities receive temporary ids from
//! the injected generator; the changeset computation later picks them up.

use tracing::debug;

use crate::error::{FitplanError, Result, SnapshotError};

use super::ids::IdGenerator;
use super::plan::{Day, FullPlan, Level, PlanExercise, PlanSet, Session, Week};

/// Prescription for a new set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetParams {
    /// Target repetitions.
    pub reps: Option<u32>,
    /// Target load in kilograms.
    pub weight_kg: Option<f64>,
    /// Target rate of perceived exertion.
    pub rpe: Option<f32>,
    /// Rest after the set, in seconds.
    pub rest_seconds: Option<u32>,
    /// Duration for timed sets, in seconds.
    pub duration_seconds: Option<u32>,
}

/// Editor over a working plan snapshot.
pub struct PlanEditor<'a, G: IdGenerator> {
    plan: &'a mut FullPlan,
    ids: &'a G,
}

impl<'a, G: IdGenerator> PlanEditor<'a, G> {
    /// Creates an editor for the given plan.
    pub const fn new(plan: &'a mut FullPlan, ids: &'a G) -> Self {
        Self { plan, ids }
    }

    /// Appends a week to the plan.
    pub fn add_week(&mut self, week_number: u32, title: Option<String>) -> String {
        let id = self.ids.next_id();
        debug!("Adding week {id} (number {week_number})");
        self.plan.weeks.push(Week {
            id: id.clone(),
            plan_id: self.plan.id.clone(),
            week_number,
            title,
            ..Week::default()
        });
        id
    }

    /// Appends a day to a week.
    ///
    /// # Errors
    ///
    /// Returns an error if the week does not exist.
    pub fn add_day(&mut self, week_id: &str, day_number: u32, title: Option<String>) -> Result<String> {
        let id = self.ids.next_id();
        let week = self
            .plan
            .week_mut(week_id)
            .ok_or_else(|| not_found(Level::Week, week_id))?;
        debug!("Adding day {id} to week {week_id}");
        week.days.push(Day {
            id: id.clone(),
            week_id: week_id.to_string(),
            day_number,
            title,
            ..Day::default()
        });
        Ok(id)
    }

    /// Appends a session to a day. Its order is one past the day's last session.
    ///
    /// # Errors
    ///
    /// Returns an error if the day does not exist.
    pub fn add_session(&mut self, day_id: &str, title: &str) -> Result<String> {
        let id = self.ids.next_id();
        let day = self
            .plan
            .day_mut(day_id)
            .ok_or_else(|| not_found(Level::Day, day_id))?;
        let session_order = next_order(day.sessions.iter().map(|s| s.session_order));
        debug!("Adding session {id} to day {day_id}");
        day.sessions.push(Session {
            id: id.clone(),
            day_id: day_id.to_string(),
            title: title.to_string(),
            session_order,
            ..Session::default()
        });
        Ok(id)
    }

    /// Appends a library exercise to a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist.
    pub fn add_exercise(&mut self, session_id: &str, exercise_id: &str) -> Result<String> {
        let id = self.ids.next_id();
        let session = self
            .plan
            .session_mut(session_id)
            .ok_or_else(|| not_found(Level::Session, session_id))?;
        let exercise_order = next_order(session.exercises.iter().map(|e| e.exercise_order));
        debug!("Adding exercise {id} ({exercise_id}) to session {session_id}");
        session.exercises.push(PlanExercise {
            id: id.clone(),
            session_id: session_id.to_string(),
            exercise_id: exercise_id.to_string(),
            exercise_order,
            ..PlanExercise::default()
        });
        Ok(id)
    }

    /// Appends a set to a plan-exercise, numbered after the existing sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan-exercise does not exist.
    pub fn add_set(&mut self, plan_exercise_id: &str, params: SetParams) -> Result<String> {
        let id = self.ids.next_id();
        let exercise = self
            .plan
            .exercise_mut(plan_exercise_id)
            .ok_or_else(|| not_found(Level::Exercise, plan_exercise_id))?;
        let set_number = next_order(exercise.sets.iter().map(|s| s.set_number));
        debug!("Adding set {id} to exercise {plan_exercise_id}");
        exercise.sets.push(PlanSet {
            id: id.clone(),
            plan_exercise_id: plan_exercise_id.to_string(),
            set_number,
            reps: params.reps,
            weight_kg: params.weight_kg,
            rpe: params.rpe,
            rest_seconds: params.rest_seconds,
            duration_seconds: params.duration_seconds,
            ..PlanSet::default()
        });
        Ok(id)
    }

    /// Removes an entity and its whole subtree.
    ///
    /// # Errors
    ///
    /// Returns an error if no entity of that level has the id.
    pub fn remove(&mut self, level: Level, id: &str) -> Result<()> {
        let removed = match level {
            Level::Week => retain_count(&mut self.plan.weeks, |w| w.id != id),
            Level::Day => self
                .plan
                .weeks
                .iter_mut()
                .map(|w| retain_count(&mut w.days, |d| d.id != id))
                .sum(),
            Level::Session => self
                .plan
                .weeks
                .iter_mut()
                .flat_map(|w| w.days.iter_mut())
                .map(|d| retain_count(&mut d.sessions, |s| s.id != id))
                .sum(),
            Level::Exercise => self
                .plan
                .weeks
                .iter_mut()
                .flat_map(|w| w.days.iter_mut())
                .flat_map(|d| d.sessions.iter_mut())
                .map(|s| retain_count(&mut s.exercises, |e| e.id != id))
                .sum(),
            Level::Set => self
                .plan
                .weeks
                .iter_mut()
                .flat_map(|w| w.days.iter_mut())
                .flat_map(|d| d.sessions.iter_mut())
                .flat_map(|s| s.exercises.iter_mut())
                .map(|e| retain_count(&mut e.sets, |s| s.id != id))
                .sum(),
        };

        if removed == 0 {
            return Err(not_found(level, id));
        }

        debug!("Removed {level} {id}");
        Ok(())
    }
}

/// Retains matching items and returns how many were dropped.
fn retain_count<T>(items: &mut Vec<T>, keep: impl FnMut(&T) -> bool) -> usize {
    let before = items.len();
    items.retain(keep);
    before - items.len()
}

/// One past the highest existing ordinal, starting at 1.
fn next_order(existing: impl Iterator<Item = u32>) -> u32 {
    existing.max().map_or(1, |max| max.saturating_add(1))
}

fn not_found(level: Level, id: &str) -> FitplanError {
    FitplanError::Snapshot(SnapshotError::EntityNotFound {
        level: level.name().to_string(),
        id: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::CounterIdGenerator;

    fn persisted_plan() -> FullPlan {
        FullPlan {
            id: String::from("p1"),
            title: String::from("Base"),
            weeks: vec![Week {
                id: String::from("w1"),
                plan_id: String::from("p1"),
                week_number: 1,
                days: vec![Day {
                    id: String::from("d1"),
                    week_id: String::from("w1"),
                    day_number: 1,
                    sessions: vec![Session {
                        id: String::from("s1"),
                        day_id: String::from("d1"),
                        title: String::from("Push"),
                        session_order: 1,
                        ..Session::default()
                    }],
                    ..Day::default()
                }],
                ..Week::default()
            }],
            ..FullPlan::default()
        }
    }

    #[test]
    fn test_add_nested_entities() {
        let mut plan = persisted_plan();
        let ids = CounterIdGenerator::new();
        let mut editor = PlanEditor::new(&mut plan, &ids);

        let session = editor.add_session("d1", "Extra").expect("day exists");
        let exercise = editor.add_exercise(&session, "bench-press").expect("session exists");
        let set = editor
            .add_set(&exercise, SetParams { reps: Some(5), ..SetParams::default() })
            .expect("exercise exists");

        assert_eq!(session, "temp-1");
        assert_eq!(exercise, "temp-2");
        assert_eq!(set, "temp-3");

        let added = &plan.weeks[0].days[0].sessions[1];
        assert_eq!(added.session_order, 2);
        assert_eq!(added.day_id, "d1");
        assert_eq!(added.exercises[0].sets[0].set_number, 1);
        assert_eq!(added.exercises[0].sets[0].plan_exercise_id, "temp-2");
    }

    #[test]
    fn test_add_to_missing_parent_fails() {
        let mut plan = persisted_plan();
        let ids = CounterIdGenerator::new();
        let mut editor = PlanEditor::new(&mut plan, &ids);

        let result = editor.add_day("missing-week", 2, None);
        assert!(matches!(
            result,
            Err(FitplanError::Snapshot(SnapshotError::EntityNotFound { .. }))
        ));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut plan = persisted_plan();
        let ids = CounterIdGenerator::new();
        let mut editor = PlanEditor::new(&mut plan, &ids);

        editor.remove(Level::Day, "d1").expect("day exists");
        assert!(plan.weeks[0].days.is_empty());
        assert_eq!(plan.entity_counts(), [1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_remove_unknown_id_fails() {
        let mut plan = persisted_plan();
        let ids = CounterIdGenerator::new();
        let mut editor = PlanEditor::new(&mut plan, &ids);

        assert!(editor.remove(Level::Set, "nope").is_err());
    }

    #[test]
    fn test_add_week_uses_plan_id() {
        let mut plan = persisted_plan();
        let ids = CounterIdGenerator::starting_at(5);
        let mut editor = PlanEditor::new(&mut plan, &ids);

        let week = editor.add_week(2, Some(String::from("Deload")));
        assert_eq!(week, "temp-5");
        assert_eq!(plan.weeks[1].plan_id, "p1");
    }

    /// Hands out a fixed script of ids.
    struct ScriptedIds(std::sync::Mutex<Vec<&'static str>>);

    impl IdGenerator for ScriptedIds {
        fn next_id(&self) -> String {
            self.0
                .lock()
                .expect("ids lock")
                .pop()
                .unwrap_or("temp-exhausted")
                .to_string()
        }
    }

    #[test]
    fn test_injected_generator_controls_ids() {
        let mut plan = persisted_plan();
        let ids = ScriptedIds(std::sync::Mutex::new(vec!["temp-b", "temp-a"]));
        let mut editor = PlanEditor::new(&mut plan, &ids);

        assert_eq!(editor.add_week(2, None), "temp-a");
        assert_eq!(editor.add_day("temp-a", 1, None).expect("week exists"), "temp-b");
        assert_eq!(plan.weeks[1].days[0].week_id, "temp-a");
    }
}
