//! crates/training_plan_core/src/store.rs
//!
//! The mutable collection of training weeks consumed by the rendering layer.

use crate::domain::{TrainingDay, TrainingSchedule, TrainingWeek};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Replaced { index: usize },
    Appended,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleStore {
    weeks: Vec<TrainingWeek>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weeks(&self) -> &[TrainingWeek] {
        &self.weeks
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn schedule(&self) -> TrainingSchedule {
        TrainingSchedule::new(self.weeks.clone())
    }

    pub fn week(&self, week_number: u32) -> Option<&TrainingWeek> {
        self.weeks.iter().find(|week| week.week_number == week_number)
    }

    pub fn day(&self, week_number: u32, day_number: u8) -> Option<&TrainingDay> {
        self.week(week_number)?.day(day_number)
    }

    /// Swaps in a freshly generated set of weeks.
    pub fn replace_all(&mut self, weeks: Vec<TrainingWeek>) {
        info!("Replacing schedule with {} weeks.", weeks.len());
        self.weeks = weeks;
    }

    /// Replaces the week with the same identifier, or appends it when none matches.
    pub fn upsert(&mut self, week: TrainingWeek) -> UpsertOutcome {
        match self.weeks.iter().position(|existing| existing.id == week.id) {
            Some(index) => {
                debug!("Updating week {} at index {}.", week.week_number, index);
                self.weeks[index] = week;
                UpsertOutcome::Replaced { index }
            }
            None => {
                warn!(
                    "No week with ID {} found for update; appending week {}.",
                    week.id, week.week_number
                );
                self.weeks.push(week);
                UpsertOutcome::Appended
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Intensity, Workout};

    fn week(number: u32) -> TrainingWeek {
        TrainingWeek::new(
            number,
            format!("Week {number}"),
            vec![TrainingDay::new(
                Some(1),
                vec![Workout::new("Tempo", "", Intensity::Moderate, 2400.0)],
            )],
        )
    }

    #[test]
    fn upsert_on_empty_store_appends() {
        let mut store = ScheduleStore::new();
        assert_eq!(store.upsert(week(1)), UpsertOutcome::Appended);
        assert_eq!(store.weeks().len(), 1);
    }

    #[test]
    fn upsert_with_matching_id_replaces_in_place() {
        let mut store = ScheduleStore::new();
        let first = week(1);
        store.replace_all(vec![first.clone(), week(2)]);

        let mut edited = first.clone();
        edited.goal = "Recovery week".to_string();
        assert_eq!(store.upsert(edited), UpsertOutcome::Replaced { index: 0 });

        assert_eq!(store.weeks().len(), 2);
        assert_eq!(store.weeks()[0].goal, "Recovery week");
        assert_eq!(store.weeks()[0].id, first.id);
    }

    #[test]
    fn upsert_with_unknown_id_appends() {
        let mut store = ScheduleStore::new();
        store.replace_all(vec![week(1)]);
        assert_eq!(store.upsert(week(1)), UpsertOutcome::Appended);
        assert_eq!(store.weeks().len(), 2);
    }

    #[test]
    fn lookups_select_by_number() {
        let mut store = ScheduleStore::new();
        store.replace_all(vec![week(1), week(2)]);
        assert_eq!(store.week(2).map(|w| w.goal.as_str()), Some("Week 2"));
        assert!(store.day(2, 1).is_some());
        assert!(store.day(2, 5).is_none());
        assert!(store.week(3).is_none());
    }
}
