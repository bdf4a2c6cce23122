//! services/api/src/adapters/openai_model.rs
//!
//! This module contains the adapter for the plan-writing LLM. It implements the
//! `ModelLoader` and `LanguageModel` ports against any OpenAI-compatible chat
//! completion endpoint (OpenAI itself, or a local server such as Ollama).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;
use training_plan_core::{
    ChatMessage, ChatRole, LanguageModel, ModelLoader, PortError, PortResult, TokenStream,
};

/// Rough characters-per-token ratio for English text.
const CHARS_PER_TOKEN: usize = 4;
/// Framing tokens a chat template adds around each message.
const TOKENS_PER_MESSAGE: usize = 4;

/// Sampling settings shared by the loader and the model handle it produces.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

//=========================================================================================
// The Loader
//=========================================================================================

/// Produces an `OpenAiChatModel` after confirming the backend can serve the model.
#[derive(Clone)]
pub struct OpenAiModelLoader {
    client: Client<OpenAIConfig>,
    settings: GenerationSettings,
}

impl OpenAiModelLoader {
    pub fn new(client: Client<OpenAIConfig>, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl ModelLoader for OpenAiModelLoader {
    /// Issues a one-token completion. Local servers load the weights on the first
    /// request, and a wrong model name or key fails here instead of mid-plan.
    async fn load(&self) -> PortResult<Arc<dyn LanguageModel>> {
        info!("Warming up model '{}'...", self.settings.model);
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(vec![ChatCompletionRequestUserMessageArgs::default()
                .content("Hello")
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()])
            .max_completion_tokens(1u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        info!("Model '{}' is ready.", self.settings.model);
        Ok(Arc::new(OpenAiChatModel {
            client: self.client.clone(),
            settings: self.settings.clone(),
        }))
    }
}

//=========================================================================================
// The Model Handle
//=========================================================================================

/// A loaded chat model. Cheap to share; every call is an independent request.
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
    settings: GenerationSettings,
}

impl OpenAiChatModel {
    fn request(&self, messages: &[ChatMessage]) -> PortResult<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<PortResult<Vec<_>>>()?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(messages)
            .max_completion_tokens(self.settings.max_output_tokens)
            .temperature(self.settings.temperature)
            .stream(true)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

fn to_request_message(message: &ChatMessage) -> PortResult<ChatCompletionRequestMessage> {
    let content = message.content.clone();
    let built: ChatCompletionRequestMessage = match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    };
    Ok(built)
}

/// Remote backends do not expose their tokenizer, so this is an estimate.
fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|m| m.content.chars().count().div_ceil(CHARS_PER_TOKEN) + TOKENS_PER_MESSAGE)
        .sum()
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.settings.model
    }

    fn count_prompt_tokens(&self, messages: &[ChatMessage]) -> PortResult<usize> {
        Ok(estimate_tokens(messages))
    }

    /// Streams the reply; each non-empty content delta counts as one token.
    async fn stream_completion(&self, messages: &[ChatMessage]) -> PortResult<TokenStream> {
        let request = self.request(messages)?;
        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        let tokens = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(PortError::Unexpected(e.to_string()))),
            }
        });
        Ok(Box::pin(tokens))
    }
}
