//! crates/training_plan_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the pipeline's external collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the workout data source and the inference backend.

use crate::domain::{HeartRateSample, WorkoutRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., file system, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Supporting Types
//=========================================================================================

/// The time range of history to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    pub const DEFAULT_DAYS: i64 = 60;

    /// The `days` days leading up to `now`.
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Output tokens as they are produced, one item per token (or backend delta).
pub type TokenStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait WorkoutHistorySource: Send + Sync {
    /// Fetches the workouts inside `window`, newest first.
    async fn fetch_workouts(&self, window: LookbackWindow) -> PortResult<Vec<WorkoutRecord>>;

    /// Fetches the heart-rate samples recorded during a workout.
    async fn fetch_heart_rate(&self, record: &WorkoutRecord) -> PortResult<Vec<HeartRateSample>>;
}

#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Loads the model and returns a handle that is shared read-only from then on.
    /// May be slow (download, disk, warm-up).
    async fn load(&self) -> PortResult<Arc<dyn LanguageModel>>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Tokenizes the templated conversation and returns its token count.
    fn count_prompt_tokens(&self, messages: &[ChatMessage]) -> PortResult<usize>;

    /// Starts generating a reply, yielding output tokens until the model stops.
    async fn stream_completion(&self, messages: &[ChatMessage]) -> PortResult<TokenStream>;
}
