//! crates/trhovisko_core/src/structured.rs
//!
//! Turns an unreliable free-text completion into a typed value: bounded
//! retry around `ModelClient::complete`, extraction of the first balanced
//! JSON object from the returned text, and strict deserialization into the
//! expected shape. An incompletely-shaped object rejects into a decode
//! error instead of passing through.

use crate::domain::GenerationConfig;
use crate::ports::{ModelClient, ModelError};
use serde::de::DeserializeOwned;
use std::time::Duration;

//=========================================================================================
// Error Types
//=========================================================================================

/// Why a model response could not be decoded into the expected shape.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No JSON object found in the model response")]
    NoJsonFound,
    #[error("The JSON in the model response is invalid: {0}")]
    InvalidJson(String),
}

/// The combined failure modes of a structured generation call.
#[derive(Debug, thiserror::Error)]
pub enum StructuredError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

//=========================================================================================
// JSON Extraction
//=========================================================================================

/// Scans `text` for the first balanced `{...}` object and returns it as a
/// string slice. String literals are honored, so braces inside quoted values
/// do not affect the balance count.
pub fn extract_json(text: &str) -> Result<&str, DecodeError> {
    let start = text.find('{').ok_or(DecodeError::NoJsonFound)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, character) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if character == '\\' {
                escaped = true;
            } else if character == '"' {
                in_string = false;
            }
            continue;
        }
        match character {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    Err(DecodeError::InvalidJson(
        "Unbalanced braces in model response".to_string(),
    ))
}

//=========================================================================================
// Retry Policy
//=========================================================================================

/// Bounded retry with linear backoff: the delay before attempt `n` is
/// `base_delay * n`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

//=========================================================================================
// Structured Generation
//=========================================================================================

/// A decoded structured result plus the token usage of the call it came from.
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub value: T,
    pub token_usage: Option<i64>,
}

/// Appends the JSON shape hint to `prompt`, calls `ModelClient::complete`
/// with bounded retry, and decodes the first JSON object in the response
/// into `T`.
///
/// `ModelError::Overloaded` is surfaced immediately without retrying, so the
/// caller can return a distinguished "busy" response instead of piling on a
/// rate-limited provider. Decode failures are terminal for the call: a
/// response that arrived but does not parse is not retried at this layer.
pub async fn generate_structured<T: DeserializeOwned>(
    client: &dyn ModelClient,
    prompt: &str,
    schema: &str,
    config: &GenerationConfig,
    retry: &RetryPolicy,
) -> Result<Structured<T>, StructuredError> {
    let full_prompt = format!("{}\n\n{}", prompt, schema);

    let mut attempt = 0u32;
    let reply = loop {
        attempt += 1;
        match client.complete(&full_prompt, config).await {
            Ok(reply) => break reply,
            Err(ModelError::Overloaded) => return Err(ModelError::Overloaded.into()),
            Err(error @ ModelError::Failed(_)) => {
                if attempt > retry.max_retries {
                    return Err(error.into());
                }
                tokio::time::sleep(retry.base_delay * attempt).await;
            }
        }
    };

    let json = extract_json(&reply.text)?;
    let value = serde_json::from_str::<T>(json)
        .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    Ok(Structured {
        value,
        token_usage: reply.token_usage,
    })
}
