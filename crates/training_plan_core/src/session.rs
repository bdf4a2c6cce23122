//! crates/training_plan_core/src/session.rs
//!
//! Owns the lazily loaded language model and runs at most one streaming
//! generation at a time, exposing its progress as observable fields.

use crate::error::PlanError;
use crate::ports::{ChatMessage, LanguageModel, ModelLoader, PortError};
use futures::StreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Pushing an update on every token costs noticeable throughput; every 4th
/// token still looks continuous.
pub const DEFAULT_DISPLAY_EVERY_N_TOKENS: usize = 4;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub display_every_n_tokens: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_every_n_tokens: DEFAULT_DISPLAY_EVERY_N_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    Unloaded,
    Loaded { model: String },
}

/// The observable fields of a session at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub running: bool,
    pub output: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub stat: String,
}

/// Returned by a progress callback to continue or end the stream early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    Stop,
}

/// Partial output handed to the progress callback.
#[derive(Debug, Clone, Copy)]
pub struct GenerationProgress<'a> {
    pub output: &'a str,
    pub output_tokens: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub output: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub tokens_per_second: f64,
    pub elapsed: Duration,
    pub stopped_early: bool,
}

#[derive(Debug)]
pub enum GenerationOutcome {
    /// Another generation was already running; nothing happened.
    Skipped,
    Completed(GenerationResult),
    Failed(PlanError),
}

/// Wraps the prompt into the conversation format the model expects.
pub fn apply_chat_template(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(prompt)]
}

/// Holds the single-flight flag for the lifetime of one generation.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Observed {
    output: String,
    input_tokens: usize,
    output_tokens: usize,
    stat: String,
}

pub struct ModelSession {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn LanguageModel>>,
    running: AtomicBool,
    observed: Mutex<Observed>,
    config: SessionConfig,
}

impl ModelSession {
    pub fn new(loader: Arc<dyn ModelLoader>, config: SessionConfig) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
            running: AtomicBool::new(false),
            observed: Mutex::new(Observed::default()),
            config,
        }
    }

    pub fn load_state(&self) -> LoadState {
        match self.model.get() {
            Some(model) => LoadState::Loaded {
                model: model.name().to_string(),
            },
            None => LoadState::Unloaded,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let running = self.is_running();
        self.with_observed(|observed| SessionSnapshot {
            running,
            output: observed.output.clone(),
            input_tokens: observed.input_tokens,
            output_tokens: observed.output_tokens,
            stat: observed.stat.clone(),
        })
    }

    /// The text of the last generation, or its failure message.
    pub fn last_output(&self) -> String {
        self.with_observed(|observed| observed.output.clone())
    }

    /// Loads the model on first use and returns the shared handle.
    ///
    /// Concurrent callers during a load all wait for that one load. A failed
    /// load leaves the session unloaded so the next call tries again.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn LanguageModel>, PlanError> {
        if let Some(model) = self.model.get() {
            debug!("Returning already loaded model '{}'.", model.name());
            return Ok(Arc::clone(model));
        }

        let model = self
            .model
            .get_or_try_init(|| async {
                info!("Starting model load.");
                let started = Instant::now();
                let model = self.loader.load().await?;
                info!(
                    "Model '{}' loaded in {:?}.",
                    model.name(),
                    started.elapsed()
                );
                Ok::<_, PortError>(model)
            })
            .await
            .map_err(|e| {
                error!("Model load failed: {}", e);
                PlanError::ModelLoad(e)
            })?;

        Ok(Arc::clone(model))
    }

    /// Streams a completion for `prompt`.
    ///
    /// `on_update` sees the partial output every `display_every_n_tokens`
    /// tokens and may stop the stream. Returns `Skipped` without touching any
    /// state if a generation is already running. Failures are recorded as the
    /// last output and returned, never raised.
    pub async fn generate<F>(&self, prompt: &str, mut on_update: F) -> GenerationOutcome
    where
        F: FnMut(GenerationProgress<'_>) -> StreamControl + Send,
    {
        let Some(_running) = RunningGuard::acquire(&self.running) else {
            info!("Generation already in progress, skipping.");
            return GenerationOutcome::Skipped;
        };

        info!("Starting generation with prompt length: {}", prompt.len());
        self.with_observed(|observed| *observed = Observed::default());

        let outcome = match self.run(prompt, &mut on_update).await {
            Ok(result) => {
                let stat = format!("Tokens/second: {:.3}", result.tokens_per_second);
                info!(
                    "{} (input tokens: {}, output tokens: {})",
                    stat, result.input_tokens, result.output_tokens
                );
                self.with_observed(|observed| {
                    observed.output.clone_from(&result.output);
                    observed.output_tokens = result.output_tokens;
                    observed.stat = stat;
                });
                GenerationOutcome::Completed(result)
            }
            Err(e) => {
                error!("Generation failed: {}", e);
                self.with_observed(|observed| observed.output = format!("Failed: {e}"));
                GenerationOutcome::Failed(e)
            }
        };

        info!("Generation completed.");
        outcome
    }

    async fn run<F>(&self, prompt: &str, on_update: &mut F) -> Result<GenerationResult, PlanError>
    where
        F: FnMut(GenerationProgress<'_>) -> StreamControl + Send,
    {
        let model = self.ensure_loaded().await?;

        let messages = apply_chat_template(prompt);
        let input_tokens = model
            .count_prompt_tokens(&messages)
            .map_err(PlanError::Generation)?;
        self.with_observed(|observed| observed.input_tokens = input_tokens);

        let started = Instant::now();
        let mut stream = model
            .stream_completion(&messages)
            .await
            .map_err(PlanError::Generation)?;

        let every = self.config.display_every_n_tokens.max(1);
        let mut output = String::new();
        let mut output_tokens = 0usize;
        let mut stopped_early = false;

        while let Some(token) = stream.next().await {
            let token = token.map_err(PlanError::Generation)?;
            output.push_str(&token);
            output_tokens += 1;

            if output_tokens % every == 0 {
                self.with_observed(|observed| {
                    observed.output.clone_from(&output);
                    observed.output_tokens = output_tokens;
                });
                let progress = GenerationProgress {
                    output: &output,
                    output_tokens,
                };
                if on_update(progress) == StreamControl::Stop {
                    debug!("Stream stopped by caller after {} tokens.", output_tokens);
                    stopped_early = true;
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        let seconds = elapsed.as_secs_f64();
        let tokens_per_second = if seconds > 0.0 {
            output_tokens as f64 / seconds
        } else {
            0.0
        };

        Ok(GenerationResult {
            output,
            input_tokens,
            output_tokens,
            tokens_per_second,
            elapsed,
            stopped_early,
        })
    }

    fn with_observed<R>(&self, f: impl FnOnce(&mut Observed) -> R) -> R {
        let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut observed)
    }
}
