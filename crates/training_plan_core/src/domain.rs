//! crates/training_plan_core/src/domain.rs
//!
//! Defines the core data structures for the application: the workout history
//! that feeds the prompt, and the training schedule the model produces.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Workout History (external input)
//=========================================================================================

/// A recorded workout as delivered by the history source.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Total distance in meters.
    pub distance_meters: Option<f64>,
    /// Total active energy in kilocalories.
    pub energy_kcal: Option<f64>,
}

impl WorkoutRecord {
    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds().max(0)
    }
}

/// A single heart-rate reading taken during a workout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartRateSample {
    pub timestamp: DateTime<Utc>,
    pub bpm: f64,
}

/// Per-workout statistics derived from a `WorkoutRecord` and its heart-rate samples.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSummary {
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub distance_km: f64,
    /// Minutes per kilometer.
    pub pace_min_per_km: f64,
    pub average_heart_rate: i64,
    pub max_heart_rate: i64,
    pub energy_kcal: i64,
}

//=========================================================================================
// Training Schedule
//=========================================================================================

/// Effort level of a planned workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Intensity {
    #[serde(rename = "Easy")]
    Easy,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Hard")]
    Hard,
    #[serde(rename = "Recovery")]
    Recovery,
    #[serde(rename = "Moderate to Hard")]
    ModerateToHard,
    /// Strength training. No generated plan emits it today, but it stays decodable.
    #[serde(rename = "Medium")]
    Medium,
}

impl Intensity {
    pub const ALL: [Intensity; 6] = [
        Intensity::Easy,
        Intensity::Moderate,
        Intensity::Hard,
        Intensity::Recovery,
        Intensity::ModerateToHard,
        Intensity::Medium,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Intensity::Easy => "Easy",
            Intensity::Moderate => "Moderate",
            Intensity::Hard => "Hard",
            Intensity::Recovery => "Recovery",
            Intensity::ModerateToHard => "Moderate to Hard",
            Intensity::Medium => "Medium",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a label is not one of the six canonical intensity strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown intensity '{0}'")]
pub struct UnknownIntensity(pub String);

impl FromStr for Intensity {
    type Err = UnknownIntensity;

    /// Exact, case-sensitive match against the display labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intensity::ALL
            .into_iter()
            .find(|intensity| intensity.label() == s)
            .ok_or_else(|| UnknownIntensity(s.to_string()))
    }
}

/// A single planned workout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    #[serde(skip)]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub intensity: Intensity,
    /// Duration in seconds, always positive.
    pub duration: f64,
    /// Distance in kilometers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_pace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate_zone: Option<String>,
}

impl Workout {
    /// Creates a workout with a freshly generated identifier.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        intensity: Intensity,
        duration: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            intensity,
            duration,
            distance: None,
            target_pace: None,
            heart_rate_zone: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_distance(mut self, distance_km: f64) -> Self {
        self.distance = Some(distance_km);
        self
    }
}

/// One day of a training week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingDay {
    #[serde(skip)]
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_number: Option<u8>,
    /// Ordered; an empty list is a rest day.
    pub workouts: Vec<Workout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_focus: Option<bool>,
}

impl TrainingDay {
    pub fn new(day_number: Option<u8>, workouts: Vec<Workout>) -> Self {
        Self {
            id: Uuid::new_v4(),
            day_number,
            workouts,
            notes: None,
            recovery_focus: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// A day with no workouts, or only recovery work, counts as a rest day.
    pub fn is_rest_day(&self) -> bool {
        self.workouts
            .iter()
            .all(|workout| workout.intensity == Intensity::Recovery)
    }
}

/// A week of training.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingWeek {
    #[serde(skip)]
    pub id: Uuid,
    pub week_number: u32,
    pub goal: String,
    pub days: Vec<TrainingDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_weekly_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_goal: Option<String>,
}

impl TrainingWeek {
    pub fn new(week_number: u32, goal: impl Into<String>, days: Vec<TrainingDay>) -> Self {
        Self {
            id: Uuid::new_v4(),
            week_number,
            goal: goal.into(),
            days,
            total_weekly_distance: None,
            weekly_goal: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sum of the distances of every workout in the week, in kilometers.
    pub fn planned_distance_km(&self) -> f64 {
        self.days
            .iter()
            .flat_map(|day| day.workouts.iter())
            .filter_map(|workout| workout.distance)
            .sum()
    }

    pub fn day(&self, day_number: u8) -> Option<&TrainingDay> {
        self.days
            .iter()
            .find(|day| day.day_number == Some(day_number))
    }
}

/// The complete multi-week plan; the root artifact of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingSchedule {
    pub weeks: Vec<TrainingWeek>,
}

/// A deviation from the plan shape the prompt asks for. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeIssue {
    WeekCount { expected: usize, found: usize },
    DayCount { week_number: u32, found: usize },
    WeekNumbering { position: usize, found: u32 },
    RestDays { week_number: u32, found: usize },
}

impl fmt::Display for ShapeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeIssue::WeekCount { expected, found } => {
                write!(f, "expected {expected} weeks, found {found}")
            }
            ShapeIssue::DayCount { week_number, found } => {
                write!(f, "week {week_number} has {found} days instead of 7")
            }
            ShapeIssue::WeekNumbering { position, found } => {
                write!(f, "week at position {position} is numbered {found}")
            }
            ShapeIssue::RestDays { week_number, found } => {
                write!(f, "week {week_number} has {found} rest days instead of 2-3")
            }
        }
    }
}

pub const PLAN_WEEKS: usize = 4;
pub const DAYS_PER_WEEK: usize = 7;

impl TrainingSchedule {
    pub fn new(weeks: Vec<TrainingWeek>) -> Self {
        Self { weeks }
    }

    /// Checks the schedule against the requested plan structure.
    pub fn shape_issues(&self) -> Vec<ShapeIssue> {
        let mut issues = Vec::new();
        if self.weeks.len() != PLAN_WEEKS {
            issues.push(ShapeIssue::WeekCount {
                expected: PLAN_WEEKS,
                found: self.weeks.len(),
            });
        }
        for (position, week) in self.weeks.iter().enumerate() {
            let expected_number = position as u32 + 1;
            if week.week_number != expected_number {
                issues.push(ShapeIssue::WeekNumbering {
                    position,
                    found: week.week_number,
                });
            }
            if week.days.len() != DAYS_PER_WEEK {
                issues.push(ShapeIssue::DayCount {
                    week_number: week.week_number,
                    found: week.days.len(),
                });
            }
            let rest_days = week.days.iter().filter(|day| day.is_rest_day()).count();
            if !(2..=3).contains(&rest_days) {
                issues.push(ShapeIssue::RestDays {
                    week_number: week.week_number,
                    found: rest_days,
                });
            }
        }
        issues
    }
}
