//! services/api/src/web/plan_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! running a single plan generation cycle and announcing its progress.

use crate::web::{protocol::ServerMessage, state::AppState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use training_plan_core::{PlanRun, StreamControl};

/// Represents the outcome of the `plan_process` task.
#[derive(Debug, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Another cycle was already in flight.
    Skipped,
    /// A new schedule with this many weeks was stored.
    Completed { weeks: usize },
    /// The cycle failed and the previous schedule was kept.
    Failed,
}

/// Runs one generation cycle, broadcasting every step to connected clients.
///
/// `GenerationStarted` goes out once the model produces output, so a request
/// that loses the race for the session is only ever announced as skipped.
pub async fn plan_process(app_state: Arc<AppState>) -> PlanOutcome {
    if app_state.planner.session().is_running() {
        info!("Plan requested while a generation is running; ignoring.");
        app_state.publish(ServerMessage::GenerationSkipped);
        return PlanOutcome::Skipped;
    }

    let start_time = Instant::now();
    info!("Plan process started.");

    let announced = AtomicBool::new(false);
    let announce = || {
        if !announced.swap(true, Ordering::AcqRel) {
            app_state.publish(ServerMessage::GenerationStarted);
        }
    };

    let result = app_state
        .planner
        .request_plan(|progress| {
            announce();
            app_state.publish(ServerMessage::Progress {
                output_tokens: progress.output_tokens,
                partial_output: progress.output.to_string(),
            });
            StreamControl::Continue
        })
        .await;

    match result {
        Ok(PlanRun::Skipped) => {
            app_state.publish(ServerMessage::GenerationSkipped);
            PlanOutcome::Skipped
        }
        Ok(PlanRun::Completed(report)) => {
            info!("⏱️ Plan generation took: {:?}", start_time.elapsed());
            // Short replies finish before the first progress update.
            announce();
            app_state.publish(ServerMessage::GenerationFinished {
                weeks: report.weeks,
                input_tokens: report.generation.input_tokens,
                output_tokens: report.generation.output_tokens,
                tokens_per_second: report.generation.tokens_per_second,
            });
            app_state.publish(ServerMessage::ScheduleUpdated {
                schedule: app_state.planner.schedule().await,
            });
            PlanOutcome::Completed {
                weeks: report.weeks,
            }
        }
        Err(e) => {
            error!("Plan process failed: {}", e);
            app_state.publish(ServerMessage::GenerationFailed {
                message: e.to_string(),
            });
            PlanOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use tokio::sync::Notify;
    use training_plan_core::{
        ChatMessage, HeartRateSample, LanguageModel, LookbackWindow, ModelLoader, PlanGenerator,
        PlannerConfig, PortError, PortResult, TokenStream, WorkoutHistorySource, WorkoutRecord,
    };

    struct EmptyHistory;

    #[async_trait]
    impl WorkoutHistorySource for EmptyHistory {
        async fn fetch_workouts(&self, _window: LookbackWindow) -> PortResult<Vec<WorkoutRecord>> {
            Ok(Vec::new())
        }

        async fn fetch_heart_rate(&self, _record: &WorkoutRecord) -> PortResult<Vec<HeartRateSample>> {
            Ok(Vec::new())
        }
    }

    struct FixedModel(String);

    #[async_trait]
    impl LanguageModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn count_prompt_tokens(&self, _messages: &[ChatMessage]) -> PortResult<usize> {
            Ok(10)
        }

        async fn stream_completion(&self, _messages: &[ChatMessage]) -> PortResult<TokenStream> {
            let tokens = self
                .0
                .split_inclusive(',')
                .map(|piece| Ok(piece.to_string()))
                .collect::<Vec<_>>();
            Ok(Box::pin(stream::iter(tokens)))
        }
    }

    struct FixedLoader(Option<String>);

    #[async_trait]
    impl ModelLoader for FixedLoader {
        async fn load(&self) -> PortResult<Arc<dyn LanguageModel>> {
            match &self.0 {
                Some(reply) => Ok(Arc::new(FixedModel(reply.clone()))),
                None => Err(PortError::Unavailable("connection refused".to_string())),
            }
        }
    }

    /// Replies in one piece, but only once released.
    struct GatedModel {
        reply: String,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl LanguageModel for GatedModel {
        fn name(&self) -> &str {
            "gated"
        }

        fn count_prompt_tokens(&self, _messages: &[ChatMessage]) -> PortResult<usize> {
            Ok(10)
        }

        async fn stream_completion(&self, _messages: &[ChatMessage]) -> PortResult<TokenStream> {
            self.entered.notify_one();
            let release = self.release.clone();
            let reply = self.reply.clone();
            Ok(Box::pin(stream::once(async move {
                release.notified().await;
                Ok(reply)
            })))
        }
    }

    struct GatedLoader(Arc<GatedModel>);

    #[async_trait]
    impl ModelLoader for GatedLoader {
        async fn load(&self) -> PortResult<Arc<dyn LanguageModel>> {
            Ok(self.0.clone())
        }
    }

    fn state_with(loader: Arc<dyn ModelLoader>) -> Arc<AppState> {
        let planner = PlanGenerator::new(Arc::new(EmptyHistory), loader, PlannerConfig::default());
        Arc::new(AppState::new(Arc::new(planner)))
    }

    fn app_state(reply: Option<&str>) -> Arc<AppState> {
        state_with(Arc::new(FixedLoader(reply.map(str::to_string))))
    }

    fn drain(events: &mut tokio::sync::broadcast::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut received = Vec::new();
        while let Ok(message) = events.try_recv() {
            received.push(message);
        }
        received
    }

    const ONE_WEEK: &str = r#"{"weeks":[{"weekNumber":1,"goal":"Base","days":[{"dayNumber":1,"workouts":[{"name":"Easy","description":"","intensity":"Easy","duration":1800}]},{"dayNumber":2,"workouts":[]}]}]}"#;

    #[tokio::test]
    async fn completed_cycle_announces_the_new_schedule() {
        let state = app_state(Some(ONE_WEEK));
        let mut events = state.events.subscribe();

        let outcome = plan_process(state.clone()).await;
        assert_eq!(outcome, PlanOutcome::Completed { weeks: 1 });

        let received = drain(&mut events);
        assert!(matches!(received.first(), Some(ServerMessage::GenerationStarted)));
        assert!(received
            .iter()
            .any(|m| matches!(m, ServerMessage::Progress { .. })));
        assert!(matches!(
            received.last(),
            Some(ServerMessage::ScheduleUpdated { schedule }) if schedule.weeks.len() == 1
        ));
    }

    #[tokio::test]
    async fn failed_cycle_is_broadcast() {
        let state = app_state(None);
        let mut events = state.events.subscribe();

        assert_eq!(plan_process(state.clone()).await, PlanOutcome::Failed);

        let received = drain(&mut events);
        assert!(!received
            .iter()
            .any(|m| matches!(m, ServerMessage::GenerationStarted)));
        assert!(matches!(
            received.last(),
            Some(ServerMessage::GenerationFailed { message }) if message.contains("connection refused")
        ));
        assert!(state.planner.schedule().await.weeks.is_empty());
    }

    #[tokio::test]
    async fn request_during_a_run_is_only_announced_as_skipped() {
        let model = Arc::new(GatedModel {
            reply: ONE_WEEK.to_string(),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        });
        let state = state_with(Arc::new(GatedLoader(model.clone())));
        let mut events = state.events.subscribe();

        let first = tokio::spawn(plan_process(state.clone()));
        model.entered.notified().await;
        assert_eq!(plan_process(state.clone()).await, PlanOutcome::Skipped);

        model.release.notify_one();
        assert_eq!(first.await.unwrap(), PlanOutcome::Completed { weeks: 1 });

        let received = drain(&mut events);
        let started = received
            .iter()
            .filter(|m| matches!(m, ServerMessage::GenerationStarted))
            .count();
        assert_eq!(started, 1);
        assert!(matches!(received.first(), Some(ServerMessage::GenerationSkipped)));
        assert!(matches!(received[1], ServerMessage::GenerationStarted));
        assert!(matches!(received[2], ServerMessage::GenerationFinished { weeks: 1, .. }));
    }
}
