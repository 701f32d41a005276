//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the AI feature endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every handler follows the same contract: validate required fields (400),
//! build the prompt, consult the cache where the feature is cacheable, call
//! the model, record the invocation in the usage ledger (best-effort), then
//! persist and respond. A provider overload is the only error distinguished
//! by status: 503, so clients can offer a "try again shortly" affordance
//! instead of a hard error (500).

use crate::web::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use trhovisko_core::{
    cache_key, prompt,
    structured::{generate_structured, StructuredError},
    AdData, AdSummary, ChatContextType, ChatTurn, ComparisonResult, FeatureType, ImageSource,
    InvocationErrorKind, ModelError, ModelInvocation, ProductInfo, QualityEvaluation,
    SearchAnalysis, StoreError,
};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        chat_handler,
        evaluate_quality_handler,
        semantic_search_handler,
        compare_products_handler,
        generate_description_handler,
    ),
    components(schemas(
        ChatRequest,
        ChatResponse,
        EvaluateQualityRequest,
        QualityResponse,
        SemanticSearchRequest,
        SemanticSearchResponse,
        CompareProductsRequest,
        ComparisonResponse,
        GenerateDescriptionRequest,
        DescriptionResponse,
        ErrorBody,
    )),
    tags(
        (name = "Trhovisko AI API", description = "AI feature endpoints for the Trhovisko marketplace.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Error Shape
//=========================================================================================

/// The generic error body shared by all endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// The uniform error half of every handler's return type.
pub type HandlerError = (StatusCode, Json<ErrorBody>);

fn validation_error(message: impl Into<String>) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn busy_error() -> HandlerError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody {
            error: "Služba AI je momentálne preťažená, skúste to o chvíľu znova.".to_string(),
        }),
    )
}

fn internal_error(message: impl Into<String>) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Best-effort ledger write: a failure to record telemetry must never fail
/// the user-visible request.
async fn record(state: &AppState, invocation: ModelInvocation) {
    if let Err(e) = state.ledger.record_invocation(&invocation).await {
        warn!("Failed to record model invocation: {}", e);
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Translates a structured-generation failure into an HTTP response and the
/// error kind to log, recording the failed invocation along the way.
async fn structured_failure(
    state: &AppState,
    feature: FeatureType,
    started: Instant,
    error: &StructuredError,
) -> HandlerError {
    let (kind, response) = match error {
        StructuredError::Model(ModelError::Overloaded) => {
            (InvocationErrorKind::Overloaded, busy_error())
        }
        StructuredError::Model(ModelError::Failed(message)) => {
            error!("Model call failed for {}: {}", feature.as_str(), message);
            (
                InvocationErrorKind::Failed,
                internal_error("Generovanie zlyhalo, skúste to prosím znova."),
            )
        }
        StructuredError::Decode(decode) => {
            error!(
                "Could not decode model response for {}: {}",
                feature.as_str(),
                decode
            );
            (
                InvocationErrorKind::Decode,
                internal_error("Odpoveď AI sa nepodarilo spracovať."),
            )
        }
    };
    record(
        state,
        ModelInvocation::failure(feature, elapsed_ms(started), kind),
    )
    .await;
    response
}

/// The same translation for plain (non-structured) model failures.
async fn model_failure(
    state: &AppState,
    feature: FeatureType,
    started: Instant,
    error: &ModelError,
) -> HandlerError {
    let (kind, response) = match error {
        ModelError::Overloaded => (InvocationErrorKind::Overloaded, busy_error()),
        ModelError::Failed(message) => {
            error!("Model call failed for {}: {}", feature.as_str(), message);
            (
                InvocationErrorKind::Failed,
                internal_error("Generovanie zlyhalo, skúste to prosím znova."),
            )
        }
    };
    record(
        state,
        ModelInvocation::failure(feature, elapsed_ms(started), kind),
    )
    .await;
    response
}

//=========================================================================================
// POST /ai/chat
//=========================================================================================

fn default_context() -> ChatContextType {
    ChatContextType::General
}

/// Request payload for the chat assistant.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub user_id: String,
    #[serde(default = "default_context")]
    #[schema(value_type = String)]
    pub context_type: ChatContextType,
}

/// Response payload of the chat assistant.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Answer one turn of an assistant conversation.
#[utoipa::path(
    post,
    path = "/ai/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Missing message or userId", body = ErrorBody),
        (status = 503, description = "Model provider overloaded", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), HandlerError> {
    if request.message.trim().is_empty() {
        return Err(validation_error("Pole 'message' je povinné."));
    }
    if request.user_id.trim().is_empty() {
        return Err(validation_error("Pole 'userId' je povinné."));
    }

    // Resolve the conversation: continue an existing one or open a new one.
    let (conversation_id, history) = match &request.conversation_id {
        Some(raw) => {
            let id = Uuid::parse_str(raw)
                .map_err(|_| validation_error("Pole 'conversationId' nie je platné UUID."))?;
            let history = match state.store.get_conversation(id).await {
                Ok(history) => history,
                // A typo in the caller's conversation id is their error, not ours.
                Err(StoreError::NotFound(_)) => {
                    return Err(validation_error(
                        "Konverzácia s daným 'conversationId' neexistuje.",
                    ))
                }
                Err(e) => {
                    return Err(internal_error(format!(
                        "Konverzáciu sa nepodarilo načítať: {}",
                        e
                    )))
                }
            };
            (id, history)
        }
        None => {
            let id = state
                .store
                .create_conversation(&request.user_id)
                .await
                .map_err(|e| internal_error(format!("Konverzáciu sa nepodarilo založiť: {}", e)))?;
            (id, Vec::new())
        }
    };

    let instructions = prompt::chat_instructions(request.context_type);
    let windowed = prompt::window_history(&history, state.config.chat_history_window);

    let started = Instant::now();
    let reply = match state
        .model
        .chat(instructions, windowed, &request.message, &state.config.generation)
        .await
    {
        Ok(reply) => reply,
        Err(e) => return Err(model_failure(&state, FeatureType::Chat, started, &e).await),
    };
    record(
        &state,
        ModelInvocation::success(FeatureType::Chat, elapsed_ms(started), reply.token_usage),
    )
    .await;

    // Persist both turns. One writer per conversation is assumed; a store
    // failure here is logged but the reply is still returned.
    for turn in [
        ChatTurn::user(request.message.clone()),
        ChatTurn::model(reply.text.clone()),
    ] {
        if let Err(e) = state.store.append_turn(conversation_id, &turn).await {
            warn!("Failed to append chat turn: {}", e);
        }
    }

    Ok((
        StatusCode::OK,
        Json(ChatResponse {
            response: reply.text,
            conversation_id,
            timestamp: Utc::now(),
        }),
    ))
}

//=========================================================================================
// POST /ai/evaluate-quality
//=========================================================================================

/// Request payload for the listing quality evaluation.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateQualityRequest {
    #[schema(value_type = Object)]
    pub ad_data: AdData,
    pub user_id: String,
    #[serde(default)]
    pub ad_id: Option<String>,
}

/// Response payload of the quality evaluation: the decoded evaluation plus
/// timing metadata.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QualityResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub evaluation: QualityEvaluation,
    pub generation_time: i64,
}

/// Score the quality of a listing.
#[utoipa::path(
    post,
    path = "/ai/evaluate-quality",
    request_body = EvaluateQualityRequest,
    responses(
        (status = 200, description = "Quality evaluation", body = QualityResponse),
        (status = 400, description = "Missing required ad fields", body = ErrorBody),
        (status = 503, description = "Model provider overloaded", body = ErrorBody),
        (status = 500, description = "Decode failure or internal error", body = ErrorBody)
    )
)]
pub async fn evaluate_quality_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluateQualityRequest>,
) -> Result<(StatusCode, Json<QualityResponse>), HandlerError> {
    if request.user_id.trim().is_empty() {
        return Err(validation_error("Pole 'userId' je povinné."));
    }
    if request.ad_data.title.trim().is_empty() || request.ad_data.description.trim().is_empty() {
        return Err(validation_error(
            "Inzerát musí mať vyplnený nadpis aj popis.",
        ));
    }
    let ad_id = match &request.ad_id {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| validation_error("Pole 'adId' nie je platné UUID."))?,
        ),
        None => None,
    };

    let rendered = prompt::quality_prompt(&request.ad_data);
    let started = Instant::now();
    let result = generate_structured::<QualityEvaluation>(
        state.model.as_ref(),
        &rendered,
        prompt::QUALITY_SCHEMA,
        &state.config.generation,
        &state.retry_policy(),
    )
    .await;

    let structured = match result {
        Ok(structured) => structured,
        Err(e) => {
            return Err(
                structured_failure(&state, FeatureType::QualityEvaluation, started, &e).await,
            )
        }
    };
    let generation_time = elapsed_ms(started);
    record(
        &state,
        ModelInvocation::success(
            FeatureType::QualityEvaluation,
            generation_time,
            structured.token_usage,
        ),
    )
    .await;

    // The computed evaluation is returned even when persisting it fails.
    if let Some(ad_id) = ad_id {
        if let Err(e) = state
            .store
            .save_quality_score(ad_id, &request.user_id, &structured.value)
            .await
        {
            warn!("Failed to persist quality score for ad {}: {}", ad_id, e);
        }
    }

    Ok((
        StatusCode::OK,
        Json(QualityResponse {
            evaluation: structured.value,
            generation_time,
        }),
    ))
}

//=========================================================================================
// POST /ai/semantic-search
//=========================================================================================

/// Request payload for the semantic search query parser.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Response payload of the semantic search: the decoded filters plus the
/// listings they matched.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchResponse {
    #[schema(value_type = Object)]
    pub analysis: SearchAnalysis,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<AdSummary>,
    pub generation_time: i64,
}

/// Parse a free-text query into filters and run them against the ad store.
#[utoipa::path(
    post,
    path = "/ai/semantic-search",
    request_body = SemanticSearchRequest,
    responses(
        (status = 200, description = "Parsed filters and matching ads", body = SemanticSearchResponse),
        (status = 400, description = "Missing query", body = ErrorBody),
        (status = 503, description = "Model provider overloaded", body = ErrorBody),
        (status = 500, description = "Decode failure or internal error", body = ErrorBody)
    )
)]
pub async fn semantic_search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SemanticSearchRequest>,
) -> Result<(StatusCode, Json<SemanticSearchResponse>), HandlerError> {
    if request.query.trim().is_empty() {
        return Err(validation_error("Pole 'query' je povinné."));
    }

    let rendered = prompt::search_prompt(&request.query);
    let started = Instant::now();
    let result = generate_structured::<SearchAnalysis>(
        state.model.as_ref(),
        &rendered,
        prompt::SEARCH_SCHEMA,
        &state.config.generation,
        &state.retry_policy(),
    )
    .await;

    let structured = match result {
        Ok(structured) => structured,
        Err(e) => {
            return Err(structured_failure(&state, FeatureType::SemanticSearch, started, &e).await)
        }
    };
    let generation_time = elapsed_ms(started);
    record(
        &state,
        ModelInvocation::success(
            FeatureType::SemanticSearch,
            generation_time,
            structured.token_usage,
        ),
    )
    .await;

    let results = state
        .store
        .search_ads(&structured.value)
        .await
        .map_err(|e| internal_error(format!("Vyhľadávanie zlyhalo: {}", e)))?;

    Ok((
        StatusCode::OK,
        Json(SemanticSearchResponse {
            analysis: structured.value,
            results,
            generation_time,
        }),
    ))
}

//=========================================================================================
// POST /ai/compare-products
//=========================================================================================

/// Request payload for the product comparison.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompareProductsRequest {
    #[schema(value_type = Vec<Object>)]
    pub products: Vec<ProductInfo>,
    pub category: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Response payload of the product comparison.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    #[schema(value_type = Object)]
    pub comparison: ComparisonResult,
    pub cached: bool,
}

/// Compare 2-4 products, serving repeated comparisons from the cache.
#[utoipa::path(
    post,
    path = "/ai/compare-products",
    request_body = CompareProductsRequest,
    responses(
        (status = 200, description = "Comparison result", body = ComparisonResponse),
        (status = 400, description = "Wrong number of products or missing category", body = ErrorBody),
        (status = 503, description = "Model provider overloaded", body = ErrorBody),
        (status = 500, description = "Decode failure or internal error", body = ErrorBody)
    )
)]
pub async fn compare_products_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompareProductsRequest>,
) -> Result<(StatusCode, Json<ComparisonResponse>), HandlerError> {
    if !(2..=4).contains(&request.products.len()) {
        return Err(validation_error("Porovnať možno 2 až 4 produkty."));
    }
    if request.category.trim().is_empty() {
        return Err(validation_error("Pole 'category' je povinné."));
    }
    if request.products.iter().any(|p| p.name.trim().is_empty()) {
        return Err(validation_error("Každý produkt musí mať názov."));
    }

    let key = cache_key::comparison_key(&request.products, &request.category);

    // Cache first: a hit answers without a model call. Lookup failures are
    // treated as a miss so a flaky cache store cannot take the feature down.
    match state.cache.lookup(&key).await {
        Ok(Some(entry)) => {
            if let Ok(comparison) = serde_json::from_value::<ComparisonResult>(entry.payload) {
                if let Err(e) = state.cache.record_hit(&key).await {
                    warn!("Failed to record cache hit: {}", e);
                }
                record(
                    &state,
                    ModelInvocation::cache_hit(FeatureType::ProductComparison),
                )
                .await;
                return Ok((
                    StatusCode::OK,
                    Json(ComparisonResponse {
                        comparison,
                        cached: true,
                    }),
                ));
            }
            warn!("Discarding undecodable cache entry {}", key);
        }
        Ok(None) => {}
        Err(e) => warn!("Comparison cache lookup failed: {}", e),
    }

    let rendered = prompt::comparison_prompt(&request.products, &request.category);
    let started = Instant::now();
    let result = generate_structured::<ComparisonResult>(
        state.model.as_ref(),
        &rendered,
        prompt::COMPARISON_SCHEMA,
        &state.config.generation,
        &state.retry_policy(),
    )
    .await;

    let structured = match result {
        Ok(structured) => structured,
        Err(e) => {
            return Err(
                structured_failure(&state, FeatureType::ProductComparison, started, &e).await,
            )
        }
    };
    record(
        &state,
        ModelInvocation::success(
            FeatureType::ProductComparison,
            elapsed_ms(started),
            structured.token_usage,
        ),
    )
    .await;

    match serde_json::to_value(&structured.value) {
        Ok(payload) => {
            let tokens_estimate = structured.token_usage.unwrap_or(0);
            if let Err(e) = state.cache.store(&key, &payload, tokens_estimate).await {
                warn!("Failed to store comparison in cache: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize comparison for cache: {}", e),
    }

    Ok((
        StatusCode::OK,
        Json(ComparisonResponse {
            comparison: structured.value,
            cached: false,
        }),
    ))
}

//=========================================================================================
// POST /ai/generate-description
//=========================================================================================

/// Request payload for the ad description generation.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDescriptionRequest {
    #[schema(value_type = Object)]
    pub product: ProductInfo,
    /// Optional photo of the product: an http(s) URL or a base64 data URI.
    #[serde(default)]
    pub image_data: Option<String>,
    pub user_id: String,
}

/// Response payload of the description generation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionResponse {
    pub description: String,
    pub generation_time: i64,
}

/// Generate an ad description from structured product attributes, optionally
/// conditioned on a product photo.
#[utoipa::path(
    post,
    path = "/ai/generate-description",
    request_body = GenerateDescriptionRequest,
    responses(
        (status = 200, description = "Generated description", body = DescriptionResponse),
        (status = 400, description = "Missing product fields or unusable image data", body = ErrorBody),
        (status = 503, description = "Model provider overloaded", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn generate_description_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateDescriptionRequest>,
) -> Result<(StatusCode, Json<DescriptionResponse>), HandlerError> {
    if request.user_id.trim().is_empty() {
        return Err(validation_error("Pole 'userId' je povinné."));
    }
    if request.product.name.trim().is_empty() || request.product.category.trim().is_empty() {
        return Err(validation_error(
            "Produkt musí mať vyplnený názov aj kategóriu.",
        ));
    }
    let image = match &request.image_data {
        Some(raw) => Some(ImageSource::detect(raw).ok_or_else(|| {
            validation_error("Pole 'imageData' musí byť URL alebo base64 data URI.")
        })?),
        None => None,
    };

    let rendered = prompt::description_prompt(&request.product);
    let started = Instant::now();
    let result = match &image {
        Some(image) => {
            state
                .model
                .complete_with_image(image, &rendered, &state.config.generation)
                .await
        }
        None => state.model.complete(&rendered, &state.config.generation).await,
    };

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            return Err(
                model_failure(&state, FeatureType::DescriptionGeneration, started, &e).await,
            )
        }
    };
    let generation_time = elapsed_ms(started);
    record(
        &state,
        ModelInvocation::success(
            FeatureType::DescriptionGeneration,
            generation_time,
            reply.token_usage,
        ),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(DescriptionResponse {
            description: reply.text,
            generation_time,
        }),
    ))
}
