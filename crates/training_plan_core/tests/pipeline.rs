//! End-to-end generation cycles against in-memory collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::stream;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use training_plan_core::{
    ChatMessage, DecodeErrorKind, HeartRateSample, LanguageModel, LookbackWindow, ModelLoader,
    PlanError, PlanGenerator, PlanRun, PlannerConfig, PortError, PortResult, StreamControl,
    TokenStream, WorkoutHistorySource, WorkoutRecord,
};
use uuid::Uuid;

struct FakeHistory {
    records: Option<Vec<WorkoutRecord>>,
    heart_rates: HashMap<Uuid, Vec<f64>>,
}

#[async_trait]
impl WorkoutHistorySource for FakeHistory {
    async fn fetch_workouts(&self, window: LookbackWindow) -> PortResult<Vec<WorkoutRecord>> {
        let records = self
            .records
            .clone()
            .ok_or_else(|| PortError::Unavailable("health store locked".to_string()))?;
        Ok(records
            .into_iter()
            .filter(|record| window.contains(record.start))
            .collect())
    }

    async fn fetch_heart_rate(&self, record: &WorkoutRecord) -> PortResult<Vec<HeartRateSample>> {
        let bpms = self
            .heart_rates
            .get(&record.id)
            .ok_or_else(|| PortError::NotFound(format!("samples for {}", record.id)))?;
        Ok(bpms
            .iter()
            .map(|&bpm| HeartRateSample {
                timestamp: record.start,
                bpm,
            })
            .collect())
    }
}

/// Replies with queued outputs, split into small chunks like a token stream.
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn count_prompt_tokens(&self, messages: &[ChatMessage]) -> PortResult<usize> {
        Ok(messages.iter().map(|m| m.content.len() / 4).sum())
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> PortResult<TokenStream> {
        self.prompts
            .lock()
            .unwrap()
            .extend(messages.iter().map(|m| m.content.clone()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PortError::Unexpected("no scripted reply".to_string()))?;
        let chunks = reply
            .chars()
            .collect::<Vec<_>>()
            .chunks(8)
            .map(|chunk| Ok(chunk.iter().collect::<String>()))
            .collect::<Vec<_>>();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

struct ScriptedLoader {
    model: Arc<ScriptedModel>,
    loads: AtomicUsize,
    broken: bool,
}

#[async_trait]
impl ModelLoader for ScriptedLoader {
    async fn load(&self) -> PortResult<Arc<dyn LanguageModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(PortError::NotFound("model weights".to_string()));
        }
        Ok(self.model.clone())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 30, 18, 0, 0).unwrap()
}

fn record(days_ago: i64, minutes: i64, meters: f64) -> WorkoutRecord {
    let start = now() - Duration::days(days_ago);
    WorkoutRecord {
        id: Uuid::new_v4(),
        start,
        end: start + Duration::minutes(minutes),
        distance_meters: Some(meters),
        energy_kcal: Some(400.0),
    }
}

fn plan_json(first_intensity: &str) -> String {
    let weeks = (1..=4)
        .map(|week| {
            let days = (1..=7)
                .map(|day| {
                    let workouts = match day {
                        3 | 7 => vec![],
                        1 if week == 1 => vec![json!({
                            "name": "Easy Run",
                            "description": "Conversational pace",
                            "intensity": first_intensity,
                            "duration": 1800,
                            "distance": 5.0
                        })],
                        _ => vec![json!({
                            "name": "Steady Run",
                            "description": "Comfortable effort",
                            "intensity": "Moderate",
                            "duration": 2400,
                            "distance": 6.0,
                            "targetPace": "6:00 min/km",
                            "heartRateZone": "Zone 3"
                        })],
                    };
                    json!({ "dayNumber": day, "workouts": workouts })
                })
                .collect::<Vec<Value>>();
            json!({ "weekNumber": week, "goal": format!("Week {week}"), "days": days })
        })
        .collect::<Vec<Value>>();
    json!({ "weeks": weeks }).to_string()
}

struct Fixture {
    generator: PlanGenerator,
    model: Arc<ScriptedModel>,
    loader: Arc<ScriptedLoader>,
    records: Vec<WorkoutRecord>,
}

fn fixture(replies: Vec<String>, history_available: bool, broken_model: bool) -> Fixture {
    let records = vec![
        record(2, 40, 8000.0),
        record(5, 30, 5000.0),
        record(9, 25, 4000.0),
    ];
    let mut heart_rates = HashMap::new();
    heart_rates.insert(records[0].id, vec![150.0, 162.0]);
    heart_rates.insert(records[2].id, vec![140.0, 146.0]);

    let history = Arc::new(FakeHistory {
        records: history_available.then(|| records.clone()),
        heart_rates,
    });
    let model = Arc::new(ScriptedModel {
        replies: Mutex::new(replies.into()),
        prompts: Mutex::new(Vec::new()),
    });
    let loader = Arc::new(ScriptedLoader {
        model: model.clone(),
        loads: AtomicUsize::new(0),
        broken: broken_model,
    });
    let generator = PlanGenerator::new(history, loader.clone(), PlannerConfig::default());
    Fixture {
        generator,
        model,
        loader,
        records,
    }
}

#[tokio::test]
async fn successful_cycle_fills_the_store() {
    let fx = fixture(vec![plan_json("Easy")], true, false);
    let mut updates = 0;

    let run = fx
        .generator
        .request_plan_at(now(), |_| {
            updates += 1;
            StreamControl::Continue
        })
        .await
        .unwrap();

    let PlanRun::Completed(report) = run else {
        panic!("expected a completed run");
    };
    assert_eq!(report.weeks, 4);
    assert!(report.shape_issues.is_empty());
    assert!(updates > 0);

    let schedule = fx.generator.schedule().await;
    assert_eq!(schedule.weeks.len(), 4);
    assert!(schedule.weeks.iter().all(|week| week.days.len() == 7));
    assert_eq!(
        fx.generator.day(1, 1).await.unwrap().workouts[0].name,
        "Easy Run"
    );

    let prompts = fx.model.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.starts_with("Today's date is Nov 30, 2024 at 6:00 PM."));
    assert!(prompt.contains("Create a 4-week progressive training plan"));

    // Newest first, and the workout without heart-rate samples reports zero.
    let newest = prompt.find("Average Heart Rate: 156 bpm").unwrap();
    let middle = prompt.find("Average Heart Rate: 0 bpm").unwrap();
    let oldest = prompt.find("Average Heart Rate: 143 bpm").unwrap();
    assert!(newest < middle && middle < oldest);
    assert!(prompt.contains("Max Heart Rate: 0 bpm"));
    assert_eq!(fx.records.len(), 3);
}

#[tokio::test]
async fn invalid_output_leaves_previous_schedule_in_place() {
    let bad = plan_json("Extreme");
    let fx = fixture(vec![plan_json("Easy"), bad.clone()], true, false);
    fx.generator
        .request_plan_at(now(), |_| StreamControl::Continue)
        .await
        .unwrap();
    let before = fx.generator.schedule().await;

    let err = fx
        .generator
        .request_plan_at(now(), |_| StreamControl::Continue)
        .await
        .unwrap_err();

    let PlanError::Decoding(decode) = err else {
        panic!("expected a decoding error");
    };
    assert_eq!(decode.kind, DecodeErrorKind::InvalidValue);
    assert_eq!(decode.path, "weeks[0].days[0].workouts[0].intensity");
    assert_eq!(fx.generator.schedule().await, before);
    assert_eq!(fx.generator.last_output(), bad);
    assert_eq!(fx.loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn history_failure_surfaces_without_loading_the_model() {
    let fx = fixture(vec![plan_json("Easy")], false, false);

    let err = fx
        .generator
        .request_plan_at(now(), |_| StreamControl::Continue)
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::DataAcquisition(_)));
    assert!(fx.generator.schedule().await.weeks.is_empty());
    assert_eq!(fx.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_load_failure_is_reported_and_recorded() {
    let fx = fixture(vec![plan_json("Easy")], true, true);

    let err = fx
        .generator
        .request_plan_at(now(), |_| StreamControl::Continue)
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::ModelLoad(_)));
    assert!(fx.generator.last_output().starts_with("Failed: Failed to load model"));
    assert!(fx.generator.schedule().await.weeks.is_empty());
    assert!(!fx.generator.session().is_running());
}
