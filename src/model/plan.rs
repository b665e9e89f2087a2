//! Training plan hierarchy types.
//!
//! A plan is a strict tree: Plan -> Weeks -> Days -> Sessions -> Exercises -> Sets.
//! Every entity carries a string id. Entities persisted by the backend carry a
//! backend-assigned id; entities created in the editor before persistence carry
//! a temporary id starting with [`TEMP_ID_PREFIX`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::IdMap;

/// Prefix reserved for client-side ids of entities not yet persisted.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Returns true if the id was issued client-side and has never been persisted.
#[must_use]
pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// The root training-plan entity with its full nested schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FullPlan {
    /// Plan identifier.
    pub id: String,
    /// Plan title.
    #[serde(default)]
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Weeks in schedule order.
    #[serde(default)]
    pub weeks: Vec<Week>,
}

/// A week of the plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Week {
    /// Week identifier.
    pub id: String,
    /// Owning plan.
    #[serde(default)]
    pub plan_id: String,
    /// Ordinal week number.
    #[serde(default)]
    pub week_number: u32,
    /// Optional title (e.g. "Deload").
    #[serde(default)]
    pub title: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Days of this week.
    #[serde(default)]
    pub days: Vec<Day>,
}

/// A training day within a week.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Day {
    /// Day identifier.
    pub id: String,
    /// Owning week.
    #[serde(default)]
    pub week_id: String,
    /// Day number within the week.
    #[serde(default)]
    pub day_number: u32,
    /// Optional title.
    #[serde(default)]
    pub title: Option<String>,
    /// Whether this is a scheduled rest day.
    #[serde(default)]
    pub is_rest_day: bool,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Sessions of this day.
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// A workout session within a day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Owning day.
    #[serde(default)]
    pub day_id: String,
    /// Session title.
    #[serde(default)]
    pub title: String,
    /// Position of the session within its day.
    #[serde(default)]
    pub session_order: u32,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Derived completion flag computed by the backend.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Exercises of this session.
    #[serde(default)]
    pub exercises: Vec<PlanExercise>,
}

/// An exercise entry of a session, referencing the exercise library.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanExercise {
    /// Plan-exercise identifier.
    pub id: String,
    /// Owning session.
    #[serde(default)]
    pub session_id: String,
    /// Exercise-library identifier.
    #[serde(default)]
    pub exercise_id: String,
    /// Position of the exercise within its session.
    #[serde(default)]
    pub exercise_order: u32,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Sets of this exercise.
    #[serde(default)]
    pub sets: Vec<PlanSet>,
}

/// A single prescribed set. Leaf of the hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanSet {
    /// Set identifier.
    pub id: String,
    /// Owning plan-exercise.
    #[serde(default)]
    pub plan_exercise_id: String,
    /// Set number within the exercise.
    #[serde(default)]
    pub set_number: u32,
    /// Target repetitions.
    #[serde(default)]
    pub reps: Option<u32>,
    /// Target load in kilograms.
    #[serde(default)]
    pub weight_kg: Option<f64>,
    /// Target rate of perceived exertion.
    #[serde(default)]
    pub rpe: Option<f32>,
    /// Rest after the set, in seconds.
    #[serde(default)]
    pub rest_seconds: Option<u32>,
    /// Duration for timed sets, in seconds.
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    /// Derived completion flag computed by the backend.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Hierarchy levels below the plan root, in parent-to-child order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Plan weeks.
    Week,
    /// Days of a week.
    Day,
    /// Sessions of a day.
    Session,
    /// Exercises of a session.
    Exercise,
    /// Sets of an exercise.
    Set,
}

impl Level {
    /// All levels, parents before children.
    pub const ALL: [Self; 5] = [Self::Week, Self::Day, Self::Session, Self::Exercise, Self::Set];

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Day => "day",
            Self::Session => "session",
            Self::Exercise => "exercise",
            Self::Set => "set",
        }
    }

    /// Name of the field holding the parent's id.
    #[must_use]
    pub const fn parent_field(self) -> &'static str {
        match self {
            Self::Week => "plan_id",
            Self::Day => "week_id",
            Self::Session => "day_id",
            Self::Exercise => "session_id",
            Self::Set => "plan_exercise_id",
        }
    }

    /// Parent level, `None` for weeks (whose parent is the plan root).
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Week => None,
            Self::Day => Some(Self::Week),
            Self::Session => Some(Self::Day),
            Self::Exercise => Some(Self::Session),
            Self::Set => Some(Self::Exercise),
        }
    }

    /// Remote procedure creating an entity of this level.
    #[must_use]
    pub const fn create_procedure(self) -> &'static str {
        match self {
            Self::Week => "create_plan_week",
            Self::Day => "create_plan_day",
            Self::Session => "create_plan_session",
            Self::Exercise => "create_plan_exercise",
            Self::Set => "create_plan_set",
        }
    }

    /// Remote procedure deleting an entity of this level.
    #[must_use]
    pub const fn delete_procedure(self) -> &'static str {
        match self {
            Self::Week => "delete_plan_week",
            Self::Day => "delete_plan_day",
            Self::Session => "delete_plan_session",
            Self::Exercise => "delete_plan_exercise",
            Self::Set => "delete_plan_set",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Creation payloads
// ============================================================================

/// Creation payload for a week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewWeek {
    /// Client-side id of the week.
    pub id: String,
    /// Parent plan id.
    pub plan_id: String,
    /// Ordinal week number.
    pub week_number: u32,
    /// Optional title.
    pub title: Option<String>,
}

/// Creation payload for a day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDay {
    /// Client-side id of the day.
    pub id: String,
    /// Parent week id.
    pub week_id: String,
    /// Day number within the week.
    pub day_number: u32,
    /// Optional title.
    pub title: Option<String>,
    /// Whether this is a rest day.
    pub is_rest_day: bool,
}

/// Creation payload for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewSession {
    /// Client-side id of the session.
    pub id: String,
    /// Parent day id.
    pub day_id: String,
    /// Session title.
    pub title: String,
    /// Position within the day.
    pub session_order: u32,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Creation payload for a plan-exercise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewExercise {
    /// Client-side id of the plan-exercise.
    pub id: String,
    /// Parent session id.
    pub session_id: String,
    /// Exercise-library identifier.
    pub exercise_id: String,
    /// Position within the session.
    pub exercise_order: u32,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Creation payload for a set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSet {
    /// Client-side id of the set.
    pub id: String,
    /// Parent plan-exercise id.
    pub plan_exercise_id: String,
    /// Set number within the exercise.
    pub set_number: u32,
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

/// A creation payload of any level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum EntityPayload {
    /// Week payload.
    Week(NewWeek),
    /// Day payload.
    Day(NewDay),
    /// Session payload.
    Session(NewSession),
    /// Exercise payload.
    Exercise(NewExercise),
    /// Set payload.
    Set(NewSet),
}

impl EntityPayload {
    /// Level of the payload.
    #[must_use]
    pub const fn level(&self) -> Level {
        match self {
            Self::Week(_) => Level::Week,
            Self::Day(_) => Level::Day,
            Self::Session(_) => Level::Session,
            Self::Exercise(_) => Level::Exercise,
            Self::Set(_) => Level::Set,
        }
    }

    /// Client-side id of the entity.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Week(w) => &w.id,
            Self::Day(d) => &d.id,
            Self::Session(s) => &s.id,
            Self::Exercise(e) => &e.id,
            Self::Set(s) => &s.id,
        }
    }

    /// Id of the parent entity.
    #[must_use]
    pub fn parent_id(&self) -> &str {
        match self {
            Self::Week(w) => &w.plan_id,
            Self::Day(d) => &d.week_id,
            Self::Session(s) => &s.day_id,
            Self::Exercise(e) => &e.session_id,
            Self::Set(s) => &s.plan_exercise_id,
        }
    }

    /// Returns a copy of the payload pointing at a different parent.
    #[must_use]
    pub fn with_parent(&self, parent_id: &str) -> Self {
        let mut payload = self.clone();
        let slot = match &mut payload {
            Self::Week(w) => &mut w.plan_id,
            Self::Day(d) => &mut d.week_id,
            Self::Session(s) => &mut s.day_id,
            Self::Exercise(e) => &mut e.session_id,
            Self::Set(s) => &mut s.plan_exercise_id,
        };
        parent_id.clone_into(slot);
        payload
    }

    /// Remote procedure parameters: the payload fields without the client-side id.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON.
    pub fn params(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = match self {
            Self::Week(w) => serde_json::to_value(w)?,
            Self::Day(d) => serde_json::to_value(d)?,
            Self::Session(s) => serde_json::to_value(s)?,
            Self::Exercise(e) => serde_json::to_value(e)?,
            Self::Set(s) => serde_json::to_value(s)?,
        };
        if let Some(object) = value.as_object_mut() {
            object.remove("id");
        }
        Ok(value)
    }
}

impl Week {
    /// Projects the week into its creation payload under the given plan.
    #[must_use]
    pub fn creation_payload(&self, plan_id: &str) -> NewWeek {
        NewWeek {
            id: self.id.clone(),
            plan_id: plan_id.to_string(),
            week_number: self.week_number,
            title: self.title.clone(),
        }
    }
}

impl Day {
    /// Projects the day into its creation payload under the given week.
    #[must_use]
    pub fn creation_payload(&self, week_id: &str) -> NewDay {
        NewDay {
            id: self.id.clone(),
            week_id: week_id.to_string(),
            day_number: self.day_number,
            title: self.title.clone(),
            is_rest_day: self.is_rest_day,
        }
    }
}

impl Session {
    /// Projects the session into its creation payload under the given day.
    #[must_use]
    pub fn creation_payload(&self, day_id: &str) -> NewSession {
        NewSession {
            id: self.id.clone(),
            day_id: day_id.to_string(),
            title: self.title.clone(),
            session_order: self.session_order,
            notes: self.notes.clone(),
        }
    }
}

impl PlanExercise {
    /// Projects the exercise into its creation payload under the given session.
    #[must_use]
    pub fn creation_payload(&self, session_id: &str) -> NewExercise {
        NewExercise {
            id: self.id.clone(),
            session_id: session_id.to_string(),
            exercise_id: self.exercise_id.clone(),
            exercise_order: self.exercise_order,
            notes: self.notes.clone(),
        }
    }
}

impl PlanSet {
    /// Projects the set into its creation payload under the given exercise.
    #[must_use]
    pub fn creation_payload(&self, plan_exercise_id: &str) -> NewSet {
        NewSet {
            id: self.id.clone(),
            plan_exercise_id: plan_exercise_id.to_string(),
            set_number: self.set_number,
            reps: self.reps,
            weight_kg: self.weight_kg,
            rpe: self.rpe,
            rest_seconds: self.rest_seconds,
            duration_seconds: self.duration_seconds,
        }
    }
}

// ============================================================================
// Tree helpers
// ============================================================================

impl FullPlan {
    /// Creates an empty plan with the given id and title.
    #[must_use]
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Counts entities at every level, in [`Level::ALL`] order.
    #[must_use]
    pub fn entity_counts(&self) -> [usize; 5] {
        let mut counts = [0usize; 5];
        for week in &self.weeks {
            counts[0] += 1;
            for day in &week.days {
                counts[1] += 1;
                for session in &day.sessions {
                    counts[2] += 1;
                    for exercise in &session.exercises {
                        counts[3] += 1;
                        counts[4] += exercise.sets.len();
                    }
                }
            }
        }
        counts
    }

    /// Returns the highest `<n>` among `temp-<n>` ids in the tree.
    ///
    /// Temporary ids with a non-numeric suffix are ignored.
    #[must_use]
    pub fn max_temporary_number(&self) -> Option<u64> {
        let number = |id: &str| id.strip_prefix(TEMP_ID_PREFIX)?.parse::<u64>().ok();
        let mut max = None;
        for week in &self.weeks {
            max = max.max(number(&week.id));
            for day in &week.days {
                max = max.max(number(&day.id));
                for session in &day.sessions {
                    max = max.max(number(&session.id));
                    for exercise in &session.exercises {
                        max = max.max(number(&exercise.id));
                        for set in &exercise.sets {
                            max = max.max(number(&set.id));
                        }
                    }
                }
            }
        }
        max
    }

    /// Returns true if the tree contains any temporary id.
    #[must_use]
    pub fn has_temporary_ids(&self) -> bool {
        self.weeks.iter().any(|w| {
            is_temporary_id(&w.id)
                || w.days.iter().any(|d| {
                    is_temporary_id(&d.id)
                        || d.sessions.iter().any(|s| {
                            is_temporary_id(&s.id)
                                || s.exercises.iter().any(|e| {
                                    is_temporary_id(&e.id)
                                        || e.sets.iter().any(|set| is_temporary_id(&set.id))
                                })
                        })
                })
        })
    }

    /// Finds a week by id.
    pub fn week_mut(&mut self, id: &str) -> Option<&mut Week> {
        self.weeks.iter_mut().find(|w| w.id == id)
    }

    /// Finds a day by id anywhere in the tree.
    pub fn day_mut(&mut self, id: &str) -> Option<&mut Day> {
        self.weeks
            .iter_mut()
            .flat_map(|w| w.days.iter_mut())
            .find(|d| d.id == id)
    }

    /// Finds a session by id anywhere in the tree.
    pub fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.weeks
            .iter_mut()
            .flat_map(|w| w.days.iter_mut())
            .flat_map(|d| d.sessions.iter_mut())
            .find(|s| s.id == id)
    }

    /// Finds a plan-exercise by id anywhere in the tree.
    pub fn exercise_mut(&mut self, id: &str) -> Option<&mut PlanExercise> {
        self.weeks
            .iter_mut()
            .flat_map(|w| w.days.iter_mut())
            .flat_map(|d| d.sessions.iter_mut())
            .flat_map(|s| s.exercises.iter_mut())
            .find(|e| e.id == id)
    }

    /// Returns a copy of the tree with persisted temporary ids replaced.
    ///
    /// Parent-reference fields are rewritten along with the ids.
    #[must_use]
    pub fn remap_ids(&self, ids: &IdMap) -> Self {
        let mut plan = self.clone();
        if ids.is_empty() {
            return plan;
        }

        for week in &mut plan.weeks {
            remap(&mut week.id, ids);
            remap(&mut week.plan_id, ids);
            for day in &mut week.days {
                remap(&mut day.id, ids);
                remap(&mut day.week_id, ids);
                for session in &mut day.sessions {
                    remap(&mut session.id, ids);
                    remap(&mut session.day_id, ids);
                    for exercise in &mut session.exercises {
                        remap(&mut exercise.id, ids);
                        remap(&mut exercise.session_id, ids);
                        for set in &mut exercise.sets {
                            remap(&mut set.id, ids);
                            remap(&mut set.plan_exercise_id, ids);
                        }
                    }
                }
            }
        }

        plan
    }
}

/// Replaces `id` in place when the map has a persisted id for it.
fn remap(id: &mut String, ids: &IdMap) {
    if let Some(real) = ids.get(id.as_str()) {
        real.clone_into(id);
    }
}
