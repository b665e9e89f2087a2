//! Plan content hashing for change detection.
//!
//! Hashes cover ids and prescribed values only. Bookkeeping timestamps and
//! derived completion flags are left out, so a refetch of an untouched plan
//! hashes to the same value as the stored baseline.

use sha2::{Digest, Sha256};

use super::plan::{Day, FullPlan, PlanExercise, PlanSet, Session, Week};

/// Hasher for computing plan content hashes.
#[derive(Debug, Default)]
pub struct PlanHasher;

impl PlanHasher {
    /// Creates a new plan hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the whole plan tree, in tree order.
    #[must_use]
    pub fn hash_plan(&self, plan: &FullPlan) -> String {
        let mut hasher = Sha256::new();

        update_str(&mut hasher, &plan.id);
        update_str(&mut hasher, &plan.title);
        update_opt(&mut hasher, plan.description.as_deref());

        for week in &plan.weeks {
            Self::update_week(&mut hasher, week);
        }

        hex::encode(hasher.finalize())
    }

    fn update_week(hasher: &mut Sha256, week: &Week) {
        hasher.update(b"W");
        update_str(hasher, &week.id);
        hasher.update(week.week_number.to_be_bytes());
        update_opt(hasher, week.title.as_deref());
        for day in &week.days {
            Self::update_day(hasher, day);
        }
    }

    fn update_day(hasher: &mut Sha256, day: &Day) {
        hasher.update(b"D");
        update_str(hasher, &day.id);
        hasher.update(day.day_number.to_be_bytes());
        update_opt(hasher, day.title.as_deref());
        hasher.update([u8::from(day.is_rest_day)]);
        for session in &day.sessions {
            Self::update_session(hasher, session);
        }
    }

    fn update_session(hasher: &mut Sha256, session: &Session) {
        hasher.update(b"S");
        update_str(hasher, &session.id);
        update_str(hasher, &session.title);
        hasher.update(session.session_order.to_be_bytes());
        update_opt(hasher, session.notes.as_deref());
        for exercise in &session.exercises {
            Self::update_exercise(hasher, exercise);
        }
    }

    fn update_exercise(hasher: &mut Sha256, exercise: &PlanExercise) {
        hasher.update(b"E");
        update_str(hasher, &exercise.id);
        update_str(hasher, &exercise.exercise_id);
        hasher.update(exercise.exercise_order.to_be_bytes());
        update_opt(hasher, exercise.notes.as_deref());
        for set in &exercise.sets {
            Self::update_set(hasher, set);
        }
    }

    fn update_set(hasher: &mut Sha256, set: &PlanSet) {
        hasher.update(b"T");
        update_str(hasher, &set.id);
        hasher.update(set.set_number.to_be_bytes());
        hasher.update(set.reps.unwrap_or(0).to_be_bytes());
        hasher.update(set.weight_kg.unwrap_or(0.0).to_be_bytes());
        hasher.update(set.rpe.unwrap_or(0.0).to_be_bytes());
        hasher.update(set.rest_seconds.unwrap_or(0).to_be_bytes());
        hasher.update(set.duration_seconds.unwrap_or(0).to_be_bytes());
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

/// Hashes a string with its length first, so adjacent fields stay separated.
fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

/// Feeds an optional string with a presence marker so `None` and `""` differ.
fn update_opt(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            update_str(hasher, v);
        }
        None => hasher.update([0u8]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_plan() -> FullPlan {
        FullPlan {
            id: String::from("p1"),
            title: String::from("Hypertrophy"),
            weeks: vec![Week {
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
            }],
            ..FullPlan::default()
        }
    }

    #[test]
    fn test_plan_hash_deterministic() {
        let hasher = PlanHasher::new();
        let plan = create_test_plan();

        assert_eq!(hasher.hash_plan(&plan), hasher.hash_plan(&plan.clone()));
    }

    #[test]
    fn test_timestamps_do_not_affect_hash() {
        let hasher = PlanHasher::new();
        let plan = create_test_plan();
        let mut touched = plan.clone();
        touched.updated_at = Some(Utc::now());
        touched.weeks[0].created_at = Some(Utc::now());

        assert_eq!(hasher.hash_plan(&plan), hasher.hash_plan(&touched));
    }

    #[test]
    fn test_content_change_changes_hash() {
        let hasher = PlanHasher::new();
        let plan = create_test_plan();
        let mut edited = plan.clone();
        edited.weeks[0].days[0].is_rest_day = true;

        assert_ne!(hasher.hash_plan(&plan), hasher.hash_plan(&edited));
    }

    #[test]
    fn test_field_boundaries_affect_hash() {
        let hasher = PlanHasher::new();

        assert_ne!(
            hasher.hash_plan(&FullPlan::new("ab", "c")),
            hasher.hash_plan(&FullPlan::new("a", "bc"))
        );

        let mut split = create_test_plan();
        split.weeks[0].days[0].sessions.push(Session {
            id: String::from("s1"),
            title: String::from("x"),
            ..Session::default()
        });
        let mut joined = split.clone();
        joined.weeks[0].days[0].sessions[0].id = String::from("s1x");
        joined.weeks[0].days[0].sessions[0].title = String::new();
        assert_ne!(hasher.hash_plan(&split), hasher.hash_plan(&joined));
    }

    #[test]
    fn test_short_hash() {
        let hasher = PlanHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");

        assert_eq!(short, "abcdef12");
        assert_eq!(short.len(), 8);
    }
}
