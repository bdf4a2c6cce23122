//! services/api/src/adapters/history_file.rs
//!
//! The workout history adapter. It implements the `WorkoutHistorySource` port
//! on top of JSON exports of a health store: one file of workouts and an
//! optional file of heart-rate samples.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use training_plan_core::{
    HeartRateSample, LookbackWindow, PortError, PortResult, WorkoutHistorySource, WorkoutRecord,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Reads workout history from JSON files on disk.
///
/// Files are read on every call so a refreshed export is picked up without a restart.
#[derive(Clone, Debug)]
pub struct JsonFileHistorySource {
    workouts_path: PathBuf,
    heart_rate_path: Option<PathBuf>,
}

impl JsonFileHistorySource {
    pub fn new(workouts_path: PathBuf, heart_rate_path: Option<PathBuf>) -> Self {
        Self {
            workouts_path,
            heart_rate_path,
        }
    }
}

//=========================================================================================
// "Impure" Export Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct WorkoutEntry {
    id: Option<Uuid>,
    #[serde(default)]
    activity_type: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    distance_meters: Option<f64>,
    #[serde(default)]
    energy_kcal: Option<f64>,
}

impl WorkoutEntry {
    /// Entries without an activity type are assumed to be runs.
    fn is_run(&self) -> bool {
        self.activity_type
            .as_deref()
            .map_or(true, |kind| kind.eq_ignore_ascii_case("running"))
    }

    fn to_domain(self) -> WorkoutRecord {
        WorkoutRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            start: self.start,
            end: self.end,
            distance_meters: self.distance_meters,
            energy_kcal: self.energy_kcal,
        }
    }
}

#[derive(Deserialize)]
struct HeartRateEntry {
    timestamp: DateTime<Utc>,
    bpm: f64,
}

impl HeartRateEntry {
    fn to_domain(self) -> HeartRateSample {
        HeartRateSample {
            timestamp: self.timestamp,
            bpm: self.bpm,
        }
    }
}

async fn read_entries<T: for<'de> Deserialize<'de>>(path: &Path) -> PortResult<Vec<T>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PortError::NotFound(path.display().to_string()),
        _ => PortError::Unavailable(format!("{}: {}", path.display(), e)),
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| PortError::Unexpected(format!("{}: {}", path.display(), e)))
}

//=========================================================================================
// `WorkoutHistorySource` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkoutHistorySource for JsonFileHistorySource {
    async fn fetch_workouts(&self, window: LookbackWindow) -> PortResult<Vec<WorkoutRecord>> {
        let entries: Vec<WorkoutEntry> = read_entries(&self.workouts_path).await?;
        let mut records: Vec<WorkoutRecord> = entries
            .into_iter()
            .filter(|entry| entry.is_run() && window.contains(entry.start))
            .map(WorkoutEntry::to_domain)
            .collect();
        records.sort_by(|a, b| b.start.cmp(&a.start));
        debug!(
            "Loaded {} running workouts from {}",
            records.len(),
            self.workouts_path.display()
        );
        Ok(records)
    }

    async fn fetch_heart_rate(&self, record: &WorkoutRecord) -> PortResult<Vec<HeartRateSample>> {
        let path = self
            .heart_rate_path
            .as_deref()
            .ok_or_else(|| PortError::NotFound("no heart-rate export configured".to_string()))?;
        let entries: Vec<HeartRateEntry> = read_entries(path).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.timestamp >= record.start && entry.timestamp <= record.end)
            .map(HeartRateEntry::to_domain)
            .collect())
    }
}
