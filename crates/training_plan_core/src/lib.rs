pub mod domain;
pub mod error;
pub mod parser;
pub mod planner;
pub mod ports;
pub mod prompt;
pub mod session;
pub mod store;
pub mod summarizer;

pub use domain::{
    HeartRateSample, Intensity, ShapeIssue, TrainingDay, TrainingSchedule, TrainingWeek, Workout,
    WorkoutRecord, WorkoutSummary,
};
pub use error::{DecodeError, DecodeErrorKind, PlanError};
pub use parser::{SalvageReport, ScheduleParser};
pub use planner::{PlanGenerator, PlanReport, PlanRun, PlannerConfig};
pub use ports::{
    ChatMessage, ChatRole, LanguageModel, LookbackWindow, ModelLoader, PortError, PortResult,
    TokenStream, WorkoutHistorySource,
};
pub use session::{
    GenerationOutcome, GenerationProgress, GenerationResult, LoadState, ModelSession,
    SessionConfig, SessionSnapshot, StreamControl,
};
pub use store::{ScheduleStore, UpsertOutcome};
pub use summarizer::WorkoutSummarizer;
