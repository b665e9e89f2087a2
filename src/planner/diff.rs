//! Changeset computation between two plan snapshots.
//!
//! Each snapshot is flattened into one list per level. Deletions are a pure
//! per-level id set difference (original minus current); additions are every
//! current entity whose id carries the temporary prefix. Updates to persisted
//! entities are not detected.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::model::{
    is_temporary_id, Day, EntityPayload, FullPlan, Level, NewDay, NewExercise, NewSession, NewSet,
    NewWeek, PlanExercise, PlanSet, Session, Week,
};

/// Additions and deletions at one hierarchy level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelChanges<T> {
    /// Creation payloads for entities not yet persisted.
    pub added: Vec<T>,
    /// Ids present in the original snapshot and absent from the current one.
    pub deleted: Vec<String>,
}

impl<T> Default for LevelChanges<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

impl<T> LevelChanges<T> {
    /// Returns true if nothing was added or deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Per-level additions and deletions between two snapshots of one plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanChangeset {
    /// Root plan id.
    pub plan_id: String,
    /// Week changes.
    pub weeks: LevelChanges<NewWeek>,
    /// Day changes.
    pub days: LevelChanges<NewDay>,
    /// Session changes.
    pub sessions: LevelChanges<NewSession>,
    /// Exercise changes.
    pub exercises: LevelChanges<NewExercise>,
    /// Set changes.
    pub sets: LevelChanges<NewSet>,
}

/// Count of changes at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    /// Hierarchy level.
    pub level: Level,
    /// Number of added entities.
    pub added: usize,
    /// Number of deleted entities.
    pub deleted: usize,
}

/// Engine computing changesets.
#[derive(Debug, Default)]
pub struct ChangesetEngine;

/// A plan entity that can be projected into a creation payload.
trait PlanNode {
    type Payload;

    fn id(&self) -> &str;

    fn payload(&self, parent_id: &str) -> Self::Payload;
}

macro_rules! plan_node {
    ($entity:ty, $payload:ty) => {
        impl PlanNode for $entity {
            type Payload = $payload;

            fn id(&self) -> &str {
                &self.id
            }

            fn payload(&self, parent_id: &str) -> Self::Payload {
                self.creation_payload(parent_id)
            }
        }
    };
}

plan_node!(Week, NewWeek);
plan_node!(Day, NewDay);
plan_node!(Session, NewSession);
plan_node!(PlanExercise, NewExercise);
plan_node!(PlanSet, NewSet);

/// Entities of a snapshot flattened per level, each paired with its parent id.
struct Flattened<'a> {
    weeks: Vec<(&'a str, &'a Week)>,
    days: Vec<(&'a str, &'a Day)>,
    sessions: Vec<(&'a str, &'a Session)>,
    exercises: Vec<(&'a str, &'a PlanExercise)>,
    sets: Vec<(&'a str, &'a PlanSet)>,
}

impl<'a> Flattened<'a> {
    /// Walks the tree in array order, parents before children.
    fn of(plan: &'a FullPlan) -> Self {
        let weeks: Vec<_> = plan.weeks.iter().map(|w| (plan.id.as_str(), w)).collect();
        let days: Vec<_> = weeks
            .iter()
            .flat_map(|&(_, w)| w.days.iter().map(move |d| (w.id.as_str(), d)))
            .collect();
        let sessions: Vec<_> = days
            .iter()
            .flat_map(|&(_, d)| d.sessions.iter().map(move |s| (d.id.as_str(), s)))
            .collect();
        let exercises: Vec<_> = sessions
            .iter()
            .flat_map(|&(_, s)| s.exercises.iter().map(move |e| (s.id.as_str(), e)))
            .collect();
        let sets: Vec<_> = exercises
            .iter()
            .flat_map(|&(_, e)| e.sets.iter().map(move |t| (e.id.as_str(), t)))
            .collect();

        Self {
            weeks,
            days,
            sessions,
            exercises,
            sets,
        }
    }
}

/// Computes the changes of one level.
fn level_changes<T: PlanNode>(
    original: &[(&str, &T)],
    current: &[(&str, &T)],
) -> LevelChanges<T::Payload> {
    let current_ids: HashSet<&str> = current.iter().map(|(_, e)| e.id()).collect();

    let deleted = original
        .iter()
        .map(|(_, e)| e.id())
        .filter(|id| !current_ids.contains(id))
        .map(String::from)
        .collect();

    let added = current
        .iter()
        .filter(|(_, e)| is_temporary_id(e.id()))
        .map(|(parent, e)| e.payload(parent))
        .collect();

    LevelChanges { added, deleted }
}

impl ChangesetEngine {
    /// Creates a new changeset engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the changeset turning `original` into `current`.
    ///
    /// Pure: neither input is modified and identical inputs give identical
    /// output. Deletions are not cascaded; a removed week's days show up in
    /// `days.deleted` only because they are absent from `current` as well.
    #[must_use]
    pub fn compute(&self, original: &FullPlan, current: &FullPlan) -> PlanChangeset {
        let before = Flattened::of(original);
        let after = Flattened::of(current);

        let changeset = PlanChangeset {
            plan_id: current.id.clone(),
            weeks: level_changes(&before.weeks, &after.weeks),
            days: level_changes(&before.days, &after.days),
            sessions: level_changes(&before.sessions, &after.sessions),
            exercises: level_changes(&before.exercises, &after.exercises),
            sets: level_changes(&before.sets, &after.sets),
        };

        debug!(
            "Changeset for plan {}: {} added, {} deleted",
            changeset.plan_id,
            changeset.added_count(),
            changeset.deleted_count()
        );

        changeset
    }
}

/// Computes the changeset turning `original` into `current`.
#[must_use]
pub fn compute_changeset(original: &FullPlan, current: &FullPlan) -> PlanChangeset {
    ChangesetEngine::new().compute(original, current)
}

/// Maps every entity of the plan to its parent id, keyed by level and id.
pub(crate) fn parent_index(plan: &FullPlan) -> HashMap<(Level, &str), &str> {
    let flat = Flattened::of(plan);
    let mut index = HashMap::new();

    index.extend(flat.weeks.iter().map(|&(p, e)| ((Level::Week, e.id.as_str()), p)));
    index.extend(flat.days.iter().map(|&(p, e)| ((Level::Day, e.id.as_str()), p)));
    index.extend(flat.sessions.iter().map(|&(p, e)| ((Level::Session, e.id.as_str()), p)));
    index.extend(flat.exercises.iter().map(|&(p, e)| ((Level::Exercise, e.id.as_str()), p)));
    index.extend(flat.sets.iter().map(|&(p, e)| ((Level::Set, e.id.as_str()), p)));

    index
}

impl PlanChangeset {
    /// Returns true if there are no changes at any level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
            && self.days.is_empty()
            && self.sessions.is_empty()
            && self.exercises.is_empty()
            && self.sets.is_empty()
    }

    /// Total number of added entities.
    #[must_use]
    pub fn added_count(&self) -> usize {
        self.summary().iter().map(|s| s.added).sum()
    }

    /// Total number of deleted entities.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.summary().iter().map(|s| s.deleted).sum()
    }

    /// Change counts per level, parents first.
    #[must_use]
    pub fn summary(&self) -> [LevelSummary; 5] {
        [
            LevelSummary {
                level: Level::Week,
                added: self.weeks.added.len(),
                deleted: self.weeks.deleted.len(),
            },
            LevelSummary {
                level: Level::Day,
                added: self.days.added.len(),
                deleted: self.days.deleted.len(),
            },
            LevelSummary {
                level: Level::Session,
                added: self.sessions.added.len(),
                deleted: self.sessions.deleted.len(),
            },
            LevelSummary {
                level: Level::Exercise,
                added: self.exercises.added.len(),
                deleted: self.exercises.deleted.len(),
            },
            LevelSummary {
                level: Level::Set,
                added: self.sets.added.len(),
                deleted: self.sets.deleted.len(),
            },
        ]
    }

    /// Deleted ids of one level.
    #[must_use]
    pub fn deleted(&self, level: Level) -> &[String] {
        match level {
            Level::Week => &self.weeks.deleted,
            Level::Day => &self.days.deleted,
            Level::Session => &self.sessions.deleted,
            Level::Exercise => &self.exercises.deleted,
            Level::Set => &self.sets.deleted,
        }
    }

    /// All added payloads, parents' levels before children's.
    #[must_use]
    pub fn added_payloads(&self) -> Vec<EntityPayload> {
        let weeks = self.weeks.added.iter().cloned().map(EntityPayload::Week);
        let days = self.days.added.iter().cloned().map(EntityPayload::Day);
        let sessions = self.sessions.added.iter().cloned().map(EntityPayload::Session);
        let exercises = self.exercises.added.iter().cloned().map(EntityPayload::Exercise);
        let sets = self.sets.added.iter().cloned().map(EntityPayload::Set);

        weeks.chain(days).chain(sessions).chain(exercises).chain(sets).collect()
    }
}

impl std::fmt::Display for LevelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: +{} -{}", self.level, self.added, self.deleted)
    }
}

impl std::fmt::Display for PlanChangeset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes");
        }

        let parts: Vec<String> = self
            .summary()
            .iter()
            .filter(|s| s.added > 0 || s.deleted > 0)
            .map(ToString::to_string)
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn week(id: &str, days: Vec<Day>) -> Week {
        Week {
            id: id.to_string(),
            plan_id: String::from("p1"),
            week_number: 1,
            days,
            ..Week::default()
        }
    }

    fn day(id: &str, sessions: Vec<Session>) -> Day {
        Day {
            id: id.to_string(),
            sessions,
            ..Day::default()
        }
    }

    fn session(id: &str, title: &str) -> Session {
        Session {
            id: id.to_string(),
            title: title.to_string(),
            ..Session::default()
        }
    }

    fn plan(weeks: Vec<Week>) -> FullPlan {
        FullPlan {
            id: String::from("p1"),
            title: String::from("Plan"),
            weeks,
            ..FullPlan::default()
        }
    }

    fn base_plan() -> FullPlan {
        plan(vec![week("w1", vec![day("d1", vec![session("s1", "Main")])])])
    }

    #[test]
    fn test_identical_snapshots_yield_empty_changeset() {
        let original = base_plan();
        let current = original.clone();

        let changeset = compute_changeset(&original, &current);
        assert!(changeset.is_empty());
        assert_eq!(changeset.added_count(), 0);
        assert_eq!(changeset.deleted_count(), 0);
    }

    #[test]
    fn test_pure_addition_from_empty_original() {
        let original = plan(vec![]);
        let current = plan(vec![week("temp-1", vec![]), week("temp-2", vec![]), week("temp-3", vec![])]);

        let changeset = compute_changeset(&original, &current);
        assert_eq!(changeset.weeks.added.len(), 3);
        assert!(changeset.weeks.deleted.is_empty());
        assert_eq!(changeset.weeks.added[1].id, "temp-2");
        assert_eq!(changeset.weeks.added[1].plan_id, "p1");
    }

    #[test]
    fn test_pure_deletion_to_empty_current() {
        let original = plan(vec![week("w1", vec![]), week("w2", vec![])]);
        let current = plan(vec![]);

        let changeset = compute_changeset(&original, &current);
        assert_eq!(changeset.weeks.deleted, vec!["w1", "w2"]);
        assert!(changeset.weeks.added.is_empty());
    }

    #[test]
    fn test_deletion_is_per_level_without_cascade() {
        let original = plan(vec![
            week("w1", vec![day("d1", vec![])]),
            week("w2", vec![]),
        ]);
        // Week w1 removed, its day moved under w2.
        let current = plan(vec![week("w2", vec![day("d1", vec![])])]);

        let changeset = compute_changeset(&original, &current);
        assert_eq!(changeset.weeks.deleted, vec!["w1"]);
        assert!(changeset.days.deleted.is_empty());
    }

    #[test]
    fn test_removed_subtree_is_reported_at_every_level() {
        let original = base_plan();
        let current = plan(vec![]);

        let changeset = compute_changeset(&original, &current);
        assert_eq!(changeset.weeks.deleted, vec!["w1"]);
        assert_eq!(changeset.days.deleted, vec!["d1"]);
        assert_eq!(changeset.sessions.deleted, vec!["s1"]);
    }

    #[test]
    fn test_classification_uses_only_the_id_prefix() {
        let original = base_plan();
        let mut current = base_plan();
        // Persisted id with edited fields is never an addition.
        current.weeks[0].days[0].sessions[0].title = String::from("Renamed");
        current.weeks[0].days[0].sessions.push(session("abc-123", "Unknown"));
        current.weeks[0].days[0].sessions.push(session("temp-42", ""));

        let changeset = compute_changeset(&original, &current);
        assert_eq!(changeset.sessions.added.len(), 1);
        assert_eq!(changeset.sessions.added[0].id, "temp-42");
        assert!(changeset.sessions.deleted.is_empty());
    }

    #[test]
    fn test_added_under_new_parent_is_reported_at_both_levels() {
        let original = base_plan();
        let mut current = base_plan();
        current.weeks[0]
            .days
            .push(day("temp-1", vec![session("temp-2", "Conditioning")]));

        let changeset = compute_changeset(&original, &current);
        assert_eq!(changeset.days.added.len(), 1);
        assert_eq!(changeset.sessions.added.len(), 1);
        assert_eq!(changeset.sessions.added[0].day_id, "temp-1");
    }

    #[test]
    fn test_added_session_strips_children_and_bookkeeping() {
        let original = base_plan();
        let mut current = base_plan();
        let mut extra = session("temp-1", "Extra");
        extra.completed = Some(true);
        extra.created_at = Some(Utc::now());
        extra.updated_at = Some(Utc::now());
        extra.exercises.push(PlanExercise {
            id: String::from("temp-2"),
            exercise_id: String::from("row"),
            ..PlanExercise::default()
        });
        current.weeks[0].days[0].sessions.push(extra);

        let changeset = compute_changeset(&original, &current);
        let value = serde_json::to_value(&changeset.sessions.added[0]).expect("serializable");
        let object = value.as_object().expect("object");
        for stripped in ["exercises", "created_at", "updated_at", "completed"] {
            assert!(!object.contains_key(stripped), "{stripped} should be stripped");
        }
        assert_eq!(object["title"], "Extra");
    }

    #[test]
    fn test_end_to_end_session_addition() {
        let original = base_plan();
        let mut current = base_plan();
        current.weeks[0].days[0].sessions.push(session("temp-1", "Extra"));

        let changeset = compute_changeset(&original, &current);
        assert_eq!(
            changeset.sessions.added,
            vec![NewSession {
                id: String::from("temp-1"),
                day_id: String::from("d1"),
                title: String::from("Extra"),
                session_order: 0,
                notes: None,
            }]
        );
        assert!(changeset.sessions.deleted.is_empty());
        for level in [&changeset.weeks.deleted, &changeset.days.deleted] {
            assert!(level.is_empty());
        }
        assert!(changeset.weeks.added.is_empty());
        assert!(changeset.days.added.is_empty());
        assert!(changeset.exercises.is_empty());
        assert!(changeset.sets.is_empty());
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let original = base_plan();
        let mut current = base_plan();
        current.weeks[0].days[0].sessions.push(session("temp-1", "Extra"));
        let original_copy = original.clone();
        let current_copy = current.clone();

        let first = compute_changeset(&original, &current);
        let second = compute_changeset(&original, &current);
        assert_eq!(first, second);
        assert_eq!(original, original_copy);
        assert_eq!(current, current_copy);
    }

    #[test]
    fn test_parent_index() {
        let plan = base_plan();
        let index = parent_index(&plan);
        assert_eq!(index.get(&(Level::Week, "w1")), Some(&"p1"));
        assert_eq!(index.get(&(Level::Session, "s1")), Some(&"d1"));
    }

    #[test]
    fn test_display_summary() {
        let original = base_plan();
        let mut current = plan(vec![]);
        current.weeks.push(week("temp-1", vec![]));

        let rendered = compute_changeset(&original, &current).to_string();
        assert!(rendered.contains("week: +1 -1"));
        assert!(rendered.contains("session: +0 -1"));
    }
}
