//! crates/training_plan_core/src/summarizer.rs
//!
//! Turns raw workout records and their heart-rate samples into per-workout
//! statistics and the textual report that is fed into the prompt.

use crate::domain::{HeartRateSample, WorkoutRecord, WorkoutSummary};
use crate::ports::WorkoutHistorySource;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%b %-d, %Y at %-I:%M %p";

/// Minutes per kilometer. The distance floors at 1 km so unreported distances
/// never divide by zero (such workouts show an artificially low pace).
pub fn pace_min_per_km(duration_minutes: i64, distance_km: f64) -> f64 {
    duration_minutes as f64 / distance_km.max(1.0)
}

/// Builds the statistics for one workout. Empty samples give zero heart rates.
pub fn summarize_record(record: &WorkoutRecord, samples: &[HeartRateSample]) -> WorkoutSummary {
    let duration_minutes = record.duration_seconds() / 60;
    let distance_km = record.distance_meters.unwrap_or(0.0) / 1000.0;

    let (average_heart_rate, max_heart_rate) = if samples.is_empty() {
        (0, 0)
    } else {
        let total: f64 = samples.iter().map(|sample| sample.bpm).sum();
        let peak = samples
            .iter()
            .map(|sample| sample.bpm)
            .fold(f64::MIN, f64::max);
        ((total / samples.len() as f64) as i64, peak as i64)
    };

    WorkoutSummary {
        date: record.start,
        duration_minutes,
        distance_km,
        pace_min_per_km: pace_min_per_km(duration_minutes, distance_km),
        average_heart_rate,
        max_heart_rate,
        energy_kcal: record.energy_kcal.unwrap_or(0.0) as i64,
    }
}

/// Renders a summary as the fixed seven-line block used in the report.
pub fn format_summary(summary: &WorkoutSummary) -> String {
    format!(
        "Date: {}\n\
         Duration: {} minutes\n\
         Distance: {:.2} km\n\
         Average Pace: {:.2} min/km\n\
         Average Heart Rate: {} bpm\n\
         Max Heart Rate: {} bpm\n\
         Energy: {} kcal",
        summary.date.format(DATE_FORMAT),
        summary.duration_minutes,
        summary.distance_km,
        summary.pace_min_per_km,
        summary.average_heart_rate,
        summary.max_heart_rate,
        summary.energy_kcal,
    )
}

/// Joins the summaries under the dated preamble.
pub fn build_report(summaries: &[WorkoutSummary], now: DateTime<Utc>) -> String {
    let blocks = summaries
        .iter()
        .map(format_summary)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Today's date is {}.\n\
         Here are my detailed running workouts from the past 2 months. \
         I'm training to improve my 5K and 10K times:\n\n{}",
        now.format(DATE_FORMAT),
        blocks
    )
}

/// Summarizes workout history, fetching heart-rate samples per record.
#[derive(Clone)]
pub struct WorkoutSummarizer {
    source: Arc<dyn WorkoutHistorySource>,
}

impl WorkoutSummarizer {
    pub fn new(source: Arc<dyn WorkoutHistorySource>) -> Self {
        Self { source }
    }

    /// One summary per record, in the order of `records`.
    ///
    /// Heart-rate fetches run concurrently. A failed fetch only zeroes the
    /// heart rates of its own workout.
    pub async fn summarize(&self, records: &[WorkoutRecord]) -> Vec<WorkoutSummary> {
        let fetches = records.iter().map(|record| async move {
            let samples = match self.source.fetch_heart_rate(record).await {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(
                        "Heart-rate fetch failed for workout {}; reporting zero heart rate: {}",
                        record.id, e
                    );
                    Vec::new()
                }
            };
            summarize_record(record, &samples)
        });

        let summaries = join_all(fetches).await;
        debug!("Summarized {} workouts.", summaries.len());
        summaries
    }

    /// Summarizes `records` and renders the full report.
    pub async fn report(&self, records: &[WorkoutRecord], now: DateTime<Utc>) -> String {
        let summaries = self.summarize(records).await;
        build_report(&summaries, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{LookbackWindow, PortError, PortResult};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;
    use uuid::Uuid;

    struct FakeHistory {
        heart_rates: HashMap<Uuid, Vec<f64>>,
    }

    #[async_trait]
    impl WorkoutHistorySource for FakeHistory {
        async fn fetch_workouts(&self, _window: LookbackWindow) -> PortResult<Vec<WorkoutRecord>> {
            Ok(Vec::new())
        }

        async fn fetch_heart_rate(&self, record: &WorkoutRecord) -> PortResult<Vec<HeartRateSample>> {
            let bpms = self
                .heart_rates
                .get(&record.id)
                .ok_or_else(|| PortError::Unavailable("sensor offline".to_string()))?;
            Ok(bpms
                .iter()
                .map(|&bpm| HeartRateSample {
                    timestamp: record.start,
                    bpm,
                })
                .collect())
        }
    }

    fn record(day: u32, minutes: i64, meters: Option<f64>) -> WorkoutRecord {
        let start = Utc.with_ymd_and_hms(2024, 11, day, 7, 30, 0).unwrap();
        WorkoutRecord {
            id: Uuid::new_v4(),
            start,
            end: start + Duration::minutes(minutes),
            distance_meters: meters,
            energy_kcal: Some(312.7),
        }
    }

    #[test]
    fn zero_distance_uses_unit_denominator() {
        assert!((pace_min_per_km(30, 0.0) - 30.0).abs() < f64::EPSILON);
        assert!((pace_min_per_km(30, -2.0) - 30.0).abs() < f64::EPSILON);
        assert!((pace_min_per_km(30, 5.0) - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_block_has_fixed_layout() {
        let record = record(12, 30, Some(5000.0));
        let samples = [140.0, 150.0, 171.9].map(|bpm| HeartRateSample {
            timestamp: record.start,
            bpm,
        });
        let summary = summarize_record(&record, &samples);
        assert_eq!(summary.average_heart_rate, 153);
        assert_eq!(summary.max_heart_rate, 171);

        let block = format_summary(&summary);
        assert_eq!(
            block,
            "Date: Nov 12, 2024 at 7:30 AM\n\
             Duration: 30 minutes\n\
             Distance: 5.00 km\n\
             Average Pace: 6.00 min/km\n\
             Average Heart Rate: 153 bpm\n\
             Max Heart Rate: 171 bpm\n\
             Energy: 312 kcal"
        );
    }

    #[tokio::test]
    async fn heart_rate_failure_only_degrades_its_own_workout() {
        let newest = record(20, 40, Some(8000.0));
        let middle = record(15, 30, None);
        let oldest = record(10, 25, Some(4000.0));

        let mut heart_rates = HashMap::new();
        heart_rates.insert(newest.id, vec![150.0, 160.0]);
        heart_rates.insert(oldest.id, vec![140.0, 148.0]);
        let summarizer = WorkoutSummarizer::new(Arc::new(FakeHistory { heart_rates }));

        let records = vec![newest.clone(), middle.clone(), oldest.clone()];
        let summaries = summarizer.summarize(&records).await;

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].date, newest.start);
        assert_eq!((summaries[0].average_heart_rate, summaries[0].max_heart_rate), (155, 160));
        assert_eq!(summaries[1].date, middle.start);
        assert_eq!((summaries[1].average_heart_rate, summaries[1].max_heart_rate), (0, 0));
        assert!((summaries[1].pace_min_per_km - 30.0).abs() < f64::EPSILON);
        assert_eq!(summaries[2].date, oldest.start);
        assert_eq!((summaries[2].average_heart_rate, summaries[2].max_heart_rate), (144, 148));
    }

    #[tokio::test]
    async fn report_is_framed_with_date_and_goal() {
        let summarizer = WorkoutSummarizer::new(Arc::new(FakeHistory {
            heart_rates: HashMap::new(),
        }));
        let now = Utc.with_ymd_and_hms(2024, 11, 30, 18, 5, 0).unwrap();
        let records = vec![record(20, 40, Some(8000.0)), record(10, 25, Some(4000.0))];

        let report = summarizer.report(&records, now).await;

        assert!(report.starts_with(
            "Today's date is Nov 30, 2024 at 6:05 PM.\n\
             Here are my detailed running workouts from the past 2 months. \
             I'm training to improve my 5K and 10K times:\n\nDate: Nov 20, 2024"
        ));
        assert_eq!(report.matches("\n\nDate: ").count(), 2);
    }
}
