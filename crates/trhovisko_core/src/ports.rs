//! crates/trhovisko_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the AI orchestration core.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific providers and stores. Only the web layer
//! translates the error types here into user-facing responses.

use crate::domain::{
    AdSummary, CacheEntry, ChatTurn, GenerationConfig, ImageSource, ModelInvocation,
    QualityEvaluation, SearchAnalysis,
};
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Model Client Error Types
//=========================================================================================

/// The error taxonomy surfaced by every model provider adapter.
///
/// `Overloaded` is the only variant callers are expected to branch on: it maps
/// to a "temporarily busy" response and must never be retried silently.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model provider is overloaded or rate-limited")]
    Overloaded,
    #[error("Model call failed: {0}")]
    Failed(String),
}

/// A convenience type alias for `Result<T, ModelError>`.
pub type ModelResult<T> = Result<T, ModelError>;

/// The text of a completion plus the provider-reported token usage, when the
/// provider supplies one.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub token_usage: Option<i64>,
}

//=========================================================================================
// Store Error Types
//=========================================================================================

/// A generic error type for all store operations (usage log, cache, domain
/// persistence). Abstracts away the specific errors of the database library.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected store error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Single point of contact with a generative-language-model provider.
///
/// Implementations perform the outbound network call and nothing else: no
/// retry, no logging, no persistence. Those concerns are composed by callers.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Single-turn text completion.
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> ModelResult<ModelReply>;

    /// Multi-turn completion seeded with prior conversation turns.
    async fn chat(
        &self,
        instructions: &str,
        history: &[ChatTurn],
        new_message: &str,
        config: &GenerationConfig,
    ) -> ModelResult<ModelReply>;

    /// Image-conditioned completion.
    async fn complete_with_image(
        &self,
        image: &ImageSource,
        prompt: &str,
        config: &GenerationConfig,
    ) -> ModelResult<ModelReply>;
}

/// Append-only log of model invocations for observability.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Records one invocation. Callers treat failures as best-effort: a
    /// ledger error must never fail the parent request.
    async fn record_invocation(&self, invocation: &ModelInvocation) -> StoreResult<()>;
}

/// Content-keyed cache for expensive, stable computations (product
/// comparisons). Not used for chat or per-ad quality scores.
#[async_trait]
pub trait ComparisonCache: Send + Sync {
    async fn lookup(&self, cache_key: &str) -> StoreResult<Option<CacheEntry>>;

    async fn store(
        &self,
        cache_key: &str,
        payload: &serde_json::Value,
        tokens_estimate: i64,
    ) -> StoreResult<()>;

    /// Atomically increments `hit_count` and `tokens_saved` for an entry.
    async fn record_hit(&self, cache_key: &str) -> StoreResult<()>;
}

/// Domain persistence touched by the feature endpoints: quality scores,
/// conversations, and the ad table the semantic search filters against.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    // --- Quality Scores ---
    async fn save_quality_score(
        &self,
        ad_id: Uuid,
        user_id: &str,
        evaluation: &QualityEvaluation,
    ) -> StoreResult<()>;

    // --- Conversations ---
    async fn create_conversation(&self, user_id: &str) -> StoreResult<Uuid>;

    /// Returns the turns of a conversation in the order they were appended.
    async fn get_conversation(&self, conversation_id: Uuid) -> StoreResult<Vec<ChatTurn>>;

    async fn append_turn(&self, conversation_id: Uuid, turn: &ChatTurn) -> StoreResult<()>;

    // --- Ads (semantic search) ---
    async fn search_ads(&self, analysis: &SearchAnalysis) -> StoreResult<Vec<AdSummary>>;
}
