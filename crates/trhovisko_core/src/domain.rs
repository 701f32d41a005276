//! crates/trhovisko_core/src/domain.rs
//!
//! Defines the pure, core data structures for the AI orchestration layer.
//! These structs are independent of any database or HTTP framework; the
//! structured-result types derive `Deserialize` because their shape is the
//! contract the model's JSON output is decoded against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user-facing capability a model invocation was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    DescriptionGeneration,
    QualityEvaluation,
    SemanticSearch,
    ProductComparison,
    Chat,
}

impl FeatureType {
    /// Stable identifier used in the usage log.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::DescriptionGeneration => "description_generation",
            FeatureType::QualityEvaluation => "quality_evaluation",
            FeatureType::SemanticSearch => "semantic_search",
            FeatureType::ProductComparison => "product_comparison",
            FeatureType::Chat => "chat",
        }
    }
}

/// How a model invocation failed, as recorded in the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    Overloaded,
    Decode,
    Failed,
}

impl InvocationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationErrorKind::Overloaded => "overloaded",
            InvocationErrorKind::Decode => "decode",
            InvocationErrorKind::Failed => "failed",
        }
    }
}

/// One row of the append-only model usage log.
#[derive(Debug, Clone)]
pub struct ModelInvocation {
    pub feature: FeatureType,
    pub started_at: DateTime<Utc>,
    pub response_time_ms: i64,
    pub success: bool,
    pub token_usage: Option<i64>,
    pub error_kind: Option<InvocationErrorKind>,
}

impl ModelInvocation {
    /// A successful invocation record.
    pub fn success(feature: FeatureType, response_time_ms: i64, token_usage: Option<i64>) -> Self {
        Self {
            feature,
            started_at: Utc::now(),
            response_time_ms,
            success: true,
            token_usage,
            error_kind: None,
        }
    }

    /// A failed invocation record.
    pub fn failure(
        feature: FeatureType,
        response_time_ms: i64,
        error_kind: InvocationErrorKind,
    ) -> Self {
        Self {
            feature,
            started_at: Utc::now(),
            response_time_ms,
            success: false,
            token_usage: None,
            error_kind: Some(error_kind),
        }
    }

    /// A cache hit recorded as a zero-duration success, so the usage log
    /// stays complete even when no provider call was made.
    pub fn cache_hit(feature: FeatureType) -> Self {
        Self {
            feature,
            started_at: Utc::now(),
            response_time_ms: 0,
            success: true,
            token_usage: Some(0),
            error_kind: None,
        }
    }
}

/// A cached structured result keyed by a content hash of its normalized input.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_key: String,
    pub payload: serde_json::Value,
    pub hit_count: i64,
    pub tokens_saved: i64,
    pub created_at: DateTime<Utc>,
}

/// Sampling parameters forwarded to the model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1024,
            top_p: 0.95,
            top_k: None,
        }
    }
}

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// A single turn of an assistant conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// The assistant persona requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatContextType {
    General,
    AdHelp,
    BuyingGuide,
    Support,
}

/// Image input for image-conditioned completions. The variant is detected
/// from the string prefix, never guessed from content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Base64DataUri(String),
}

impl ImageSource {
    /// Routes `http(s)://...` to `Url` and `data:...;base64,...` to
    /// `Base64DataUri`. Anything else is rejected by the caller.
    pub fn detect(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Some(ImageSource::Url(trimmed.to_string()))
        } else if trimmed.starts_with("data:") && trimmed.contains(";base64,") {
            Some(ImageSource::Base64DataUri(trimmed.to_string()))
        } else {
            None
        }
    }
}

/// Structured attributes of a product, used by the description and
/// comparison prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub price_eur: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

/// The listing fields the quality evaluation prompt is rendered from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdData {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub price_eur: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default)]
    pub specifications: Vec<String>,
}

/// Per-category subscores of a quality evaluation. The model's arithmetic
/// is advisory: `total_score` is not guaranteed to equal the sum here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityBreakdown {
    pub description: i32,
    pub photos: i32,
    pub specifications: i32,
    pub pricing: i32,
}

/// Decoded result of the quality evaluation feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityEvaluation {
    pub total_score: i32,
    pub breakdown: QualityBreakdown,
    pub suggestions: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

/// Decoded result of the semantic search query parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalysis {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub min_price_eur: Option<f64>,
    #[serde(default)]
    pub max_price_eur: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

/// A listing returned by the semantic search filter query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSummary {
    pub id: uuid::Uuid,
    pub title: String,
    pub category: String,
    pub price_eur: Option<f64>,
    pub location: Option<String>,
}

/// Decoded result of the product comparison feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub summary: String,
    pub comparison: String,
    pub recommendation: String,
    pub suitability: Vec<String>,
}
