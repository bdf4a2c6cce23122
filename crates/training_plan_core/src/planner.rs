//! crates/training_plan_core/src/planner.rs
//!
//! Wires the pipeline together: history → report → prompt → model → schedule.

use crate::domain::{ShapeIssue, TrainingDay, TrainingSchedule, TrainingWeek};
use crate::error::PlanError;
use crate::parser::ScheduleParser;
use crate::ports::{LanguageModel, LookbackWindow, ModelLoader, WorkoutHistorySource};
use crate::prompt::build_prompt;
use crate::session::{
    GenerationOutcome, GenerationProgress, GenerationResult, ModelSession, SessionConfig,
    SessionSnapshot, StreamControl,
};
use crate::store::{ScheduleStore, UpsertOutcome};
use crate::summarizer::WorkoutSummarizer;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub lookback_days: i64,
    pub session: SessionConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lookback_days: LookbackWindow::DEFAULT_DAYS,
            session: SessionConfig::default(),
        }
    }
}

/// The result of a completed generation cycle.
#[derive(Debug, Clone)]
pub struct PlanReport {
    pub weeks: usize,
    pub generation: GenerationResult,
    pub shape_issues: Vec<ShapeIssue>,
}

#[derive(Debug)]
pub enum PlanRun {
    /// A generation was already in flight.
    Skipped,
    Completed(PlanReport),
}

pub struct PlanGenerator {
    history: Arc<dyn WorkoutHistorySource>,
    summarizer: WorkoutSummarizer,
    session: ModelSession,
    parser: ScheduleParser,
    store: RwLock<ScheduleStore>,
    lookback_days: i64,
}

impl PlanGenerator {
    pub fn new(
        history: Arc<dyn WorkoutHistorySource>,
        loader: Arc<dyn ModelLoader>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            summarizer: WorkoutSummarizer::new(history.clone()),
            history,
            session: ModelSession::new(loader, config.session),
            parser: ScheduleParser::new(),
            store: RwLock::new(ScheduleStore::new()),
            lookback_days: config.lookback_days,
        }
    }

    pub fn with_parser(mut self, parser: ScheduleParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn session(&self) -> &ModelSession {
        &self.session
    }

    /// Pre-loads the model so the first plan request does not pay for it.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn LanguageModel>, PlanError> {
        self.session.ensure_loaded().await
    }

    pub async fn request_plan<F>(&self, on_update: F) -> Result<PlanRun, PlanError>
    where
        F: FnMut(GenerationProgress<'_>) -> StreamControl + Send,
    {
        self.request_plan_at(Utc::now(), on_update).await
    }

    /// Runs one generation cycle as of `now`.
    ///
    /// The store is replaced only when the whole cycle succeeds; on any error
    /// it keeps its previous weeks and the raw model output stays available
    /// through the session.
    pub async fn request_plan_at<F>(&self, now: DateTime<Utc>, on_update: F) -> Result<PlanRun, PlanError>
    where
        F: FnMut(GenerationProgress<'_>) -> StreamControl + Send,
    {
        if self.session.is_running() {
            info!("Plan generation already in progress, skipping request.");
            return Ok(PlanRun::Skipped);
        }

        let window = LookbackWindow::last_days(self.lookback_days, now);
        let records = self
            .history
            .fetch_workouts(window)
            .await
            .map_err(|e| {
                warn!("Workout history fetch failed: {}", e);
                PlanError::DataAcquisition(e)
            })?;
        info!("Fetched {} workouts since {}.", records.len(), window.start);

        let report = self.summarizer.report(&records, now).await;
        let prompt = build_prompt(&report);

        let generation = match self.session.generate(&prompt, on_update).await {
            GenerationOutcome::Skipped => return Ok(PlanRun::Skipped),
            GenerationOutcome::Failed(e) => return Err(e),
            GenerationOutcome::Completed(result) => result,
        };

        let schedule = self.parser.parse(&generation.output).map_err(|e| {
            warn!("Model output is not a valid schedule: {}", e);
            PlanError::from(e)
        })?;

        let shape_issues = schedule.shape_issues();
        for issue in &shape_issues {
            warn!("Generated plan deviates from the requested shape: {}", issue);
        }

        let weeks = schedule.weeks.len();
        info!("Successfully parsed training schedule with {} weeks.", weeks);
        self.store.write().await.replace_all(schedule.weeks);

        Ok(PlanRun::Completed(PlanReport {
            weeks,
            generation,
            shape_issues,
        }))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Raw text of the last generation ("copy output").
    pub fn last_output(&self) -> String {
        self.session.last_output()
    }

    pub async fn schedule(&self) -> TrainingSchedule {
        self.store.read().await.schedule()
    }

    pub async fn week(&self, week_number: u32) -> Option<TrainingWeek> {
        self.store.read().await.week(week_number).cloned()
    }

    pub async fn day(&self, week_number: u32, day_number: u8) -> Option<TrainingDay> {
        self.store.read().await.day(week_number, day_number).cloned()
    }

    pub async fn upsert_week(&self, week: TrainingWeek) -> UpsertOutcome {
        self.store.write().await.upsert(week)
    }
}
