//! services/api/src/adapters/openai_llm.rs
//!
//! This module contains the OpenAI-backed model client. It implements the
//! `ModelClient` port from the `core` crate using the Chat Completions API.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use trhovisko_core::domain::{ChatRole, ChatTurn, GenerationConfig, ImageSource};
use trhovisko_core::ports::{ModelClient, ModelError, ModelReply, ModelResult};

/// Substrings in provider error messages that indicate a capacity problem
/// rather than a genuine failure.
const OVERLOAD_MARKERS: &[&str] = &["rate limit", "overloaded", "quota", "too many requests"];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ModelClient` port against the OpenAI API.
#[derive(Clone)]
pub struct OpenAiModelClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiModelClient {
    /// Creates a new `OpenAiModelClient`.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }

    /// Classifies a provider error into the port's two-variant taxonomy.
    fn classify(error: &OpenAIError) -> ModelError {
        classify_message(&error.to_string())
    }

    async fn run(&self, request: CreateChatCompletionRequest) -> ModelResult<ModelReply> {
        let chat = self.client.chat();
        let call = chat.create(request);
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ModelError::Failed("Model call timed out".to_string()))?
            .map_err(|e| Self::classify(&e))?;

        let token_usage = response.usage.as_ref().map(|u| i64::from(u.total_tokens));
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Failed("Model response contained no text".to_string()))?;

        if text.trim().is_empty() {
            return Err(ModelError::Failed("Model response was empty".to_string()));
        }
        Ok(ModelReply {
            text,
            token_usage,
        })
    }

    fn base_request(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        config: &GenerationConfig,
    ) -> ModelResult<CreateChatCompletionRequest> {
        // OpenAI has no top_k knob; that field only applies to Gemini.
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(config.temperature)
            .top_p(config.top_p)
            .max_tokens(config.max_output_tokens)
            .build()
            .map_err(|e| ModelError::Failed(e.to_string()))
    }
}

/// Shared overload classification over a provider error message.
fn classify_message(message: &str) -> ModelError {
    let lowered = message.to_lowercase();
    if lowered.contains("429") || OVERLOAD_MARKERS.iter().any(|m| lowered.contains(m)) {
        ModelError::Overloaded
    } else {
        ModelError::Failed(message.to_string())
    }
}

//=========================================================================================
// `ModelClient` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModelClient for OpenAiModelClient {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> ModelResult<ModelReply> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| ModelError::Failed(e.to_string()))?
            .into()];
        let request = self.base_request(messages, config)?;
        self.run(request).await
    }

    async fn chat(
        &self,
        instructions: &str,
        history: &[ChatTurn],
        new_message: &str,
        config: &GenerationConfig,
    ) -> ModelResult<ModelReply> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instructions)
                .build()
                .map_err(|e| ModelError::Failed(e.to_string()))?
                .into(),
        ];
        for turn in history {
            let message = match turn.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.as_str())
                    .build()
                    .map_err(|e| ModelError::Failed(e.to_string()))?
                    .into(),
                ChatRole::Model => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.as_str())
                    .build()
                    .map_err(|e| ModelError::Failed(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(new_message)
                .build()
                .map_err(|e| ModelError::Failed(e.to_string()))?
                .into(),
        );

        let request = self.base_request(messages, config)?;
        self.run(request).await
    }

    async fn complete_with_image(
        &self,
        image: &ImageSource,
        prompt: &str,
        config: &GenerationConfig,
    ) -> ModelResult<ModelReply> {
        // The Chat Completions API accepts both remote URLs and data URIs in
        // the same image_url field.
        let url = match image {
            ImageSource::Url(url) => url.clone(),
            ImageSource::Base64DataUri(uri) => uri.clone(),
        };

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(prompt)
                .build()
                .map_err(|e| ModelError::Failed(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(url)
                        .build()
                        .map_err(|e| ModelError::Failed(e.to_string()))?,
                )
                .build()
                .map_err(|e| ModelError::Failed(e.to_string()))?
                .into(),
        ];

        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| ModelError::Failed(e.to_string()))?
            .into()];
        let request = self.base_request(messages, config)?;
        self.run(request).await
    }
}
