//! services/api/src/adapters/gemini_llm.rs
//!
//! This module contains the Gemini-backed model client. It implements the
//! `ModelClient` port from the `core` crate by calling the Generative
//! Language API directly over `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trhovisko_core::domain::{ChatRole, ChatTurn, GenerationConfig, ImageSource};
use trhovisko_core::ports::{ModelClient, ModelError, ModelReply, ModelResult};

/// Base URL for the Generative Language API.
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Substrings of Gemini error messages that indicate capacity exhaustion.
const OVERLOAD_MARKERS: &[&str] = &["overloaded", "quota", "resource has been exhausted"];

//=========================================================================================
// API Request/Response Types
//=========================================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
struct FileData {
    #[serde(rename = "fileUri")]
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
    error: Option<GeminiErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<i64>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    message: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ModelClient` port against Gemini.
#[derive(Clone)]
pub struct GeminiModelClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiModelClient {
    /// Creates a new `GeminiModelClient`. The request timeout is applied on
    /// the underlying HTTP client; an elapsed timeout surfaces as `Failed`.
    pub fn new(api_key: String, model: String, timeout: Duration) -> ModelResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Failed(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    fn build_url(&self) -> String {
        format!(
            "{API_BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    fn generation_config(config: &GenerationConfig) -> GeminiGenerationConfig {
        GeminiGenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }

    fn user_text(text: &str) -> GeminiContent {
        GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart::Text {
                text: text.to_string(),
            }],
        }
    }

    /// Maps an API error status and body to the port's error taxonomy.
    fn map_api_error(status: u16, body: &str) -> ModelError {
        let message = serde_json::from_str::<GeminiResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| body.to_string(), |e| e.message);

        let lowered = message.to_lowercase();
        if status == 429 || OVERLOAD_MARKERS.iter().any(|m| lowered.contains(m)) {
            ModelError::Overloaded
        } else {
            ModelError::Failed(format!("Gemini API error ({status}): {message}"))
        }
    }

    async fn run(&self, request: GeminiRequest) -> ModelResult<ModelReply> {
        let response = self
            .http
            .post(self.build_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Failed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Failed(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(Self::map_api_error(status, &body));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::Failed(format!("Malformed Gemini response: {e}")))?;

        let token_usage = parsed
            .usage_metadata
            .as_ref()
            .and_then(|u| u.total_token_count);

        let text = parsed
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|content| {
                content.parts.iter().find_map(|part| match part {
                    GeminiPart::Text { text } => Some(text.clone()),
                    _ => None,
                })
            })
            .ok_or_else(|| ModelError::Failed("No content in Gemini response".to_string()))?;

        if text.trim().is_empty() {
            return Err(ModelError::Failed("Model response was empty".to_string()));
        }
        Ok(ModelReply { text, token_usage })
    }
}

/// Splits a `data:<mime>;base64,<payload>` URI into its mime type and payload.
fn split_data_uri(uri: &str) -> ModelResult<(String, String)> {
    let without_scheme = uri
        .strip_prefix("data:")
        .ok_or_else(|| ModelError::Failed("Image data is not a data URI".to_string()))?;
    let (mime, payload) = without_scheme
        .split_once(";base64,")
        .ok_or_else(|| ModelError::Failed("Image data URI is not base64-encoded".to_string()))?;
    Ok((mime.to_string(), payload.to_string()))
}

//=========================================================================================
// `ModelClient` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModelClient for GeminiModelClient {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> ModelResult<ModelReply> {
        let request = GeminiRequest {
            contents: vec![Self::user_text(prompt)],
            system_instruction: None,
            generation_config: Self::generation_config(config),
        };
        self.run(request).await
    }

    async fn chat(
        &self,
        instructions: &str,
        history: &[ChatTurn],
        new_message: &str,
        config: &GenerationConfig,
    ) -> ModelResult<ModelReply> {
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .map(|turn| GeminiContent {
                role: Some(
                    match turn.role {
                        ChatRole::User => "user",
                        ChatRole::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart::Text {
                    text: turn.text.clone(),
                }],
            })
            .collect();
        contents.push(Self::user_text(new_message));

        let request = GeminiRequest {
            contents,
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: instructions.to_string(),
                }],
            }),
            generation_config: Self::generation_config(config),
        };
        self.run(request).await
    }

    async fn complete_with_image(
        &self,
        image: &ImageSource,
        prompt: &str,
        config: &GenerationConfig,
    ) -> ModelResult<ModelReply> {
        let image_part = match image {
            ImageSource::Url(url) => GeminiPart::FileData {
                file_data: FileData {
                    file_uri: url.clone(),
                },
            },
            ImageSource::Base64DataUri(uri) => {
                let (mime_type, data) = split_data_uri(uri)?;
                GeminiPart::InlineData {
                    inline_data: InlineData { mime_type, data },
                }
            }
        };

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![
                    GeminiPart::Text {
                        text: prompt.to_string(),
                    },
                    image_part,
                ],
            }],
            system_instruction: None,
            generation_config: Self::generation_config(config),
        };
        self.run(request).await
    }
}
