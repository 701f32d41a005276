//! services/api/tests/endpoints.rs
//!
//! End-to-end handler tests against mock implementations of the core ports.
//! The mocks count model calls so the tests can assert that validation
//! failures and cache hits never reach the provider, and that retry stays
//! within its configured bound.

use api_lib::config::{Config, ModelProvider};
use api_lib::web::rest::{
    chat_handler, compare_products_handler, evaluate_quality_handler,
    generate_description_handler, semantic_search_handler, ChatRequest, CompareProductsRequest,
    EvaluateQualityRequest, GenerateDescriptionRequest, SemanticSearchRequest,
};
use api_lib::web::state::AppState;
use async_trait::async_trait;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trhovisko_core::domain::{
    AdSummary, CacheEntry, ChatContextType, ChatTurn, GenerationConfig, ImageSource,
    InvocationErrorKind, ModelInvocation, ProductInfo, QualityEvaluation, SearchAnalysis,
};
use trhovisko_core::ports::{
    ComparisonCache, MarketplaceStore, ModelClient, ModelError, ModelReply, ModelResult,
    StoreError, StoreResult, UsageLedger,
};
use trhovisko_core::AdData;
use uuid::Uuid;

//=========================================================================================
// Mock Ports
//=========================================================================================

/// A scripted model client: every operation pops the next canned outcome and
/// bumps a per-operation call counter.
struct MockModel {
    outcomes: Mutex<Vec<ModelResult<ModelReply>>>,
    complete_calls: AtomicUsize,
    chat_calls: AtomicUsize,
    image_calls: AtomicUsize,
}

impl MockModel {
    fn new(outcomes: Vec<ModelResult<ModelReply>>) -> Self {
        let mut reversed = outcomes;
        reversed.reverse();
        Self {
            outcomes: Mutex::new(reversed),
            complete_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> ModelResult<ModelReply> {
        self.outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(ModelError::Failed("script exhausted".to_string())))
    }

    fn total_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
            + self.chat_calls.load(Ordering::SeqCst)
            + self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, _prompt: &str, _config: &GenerationConfig) -> ModelResult<ModelReply> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.next()
    }

    async fn chat(
        &self,
        _instructions: &str,
        _history: &[ChatTurn],
        _new_message: &str,
        _config: &GenerationConfig,
    ) -> ModelResult<ModelReply> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.next()
    }

    async fn complete_with_image(
        &self,
        _image: &ImageSource,
        _prompt: &str,
        _config: &GenerationConfig,
    ) -> ModelResult<ModelReply> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.next()
    }
}

/// Ledger mock. Flipping `fail` makes every write error, for exercising the
/// best-effort telemetry contract.
#[derive(Default)]
struct MockLedger {
    invocations: Mutex<Vec<ModelInvocation>>,
    fail: AtomicBool,
}

#[async_trait]
impl UsageLedger for MockLedger {
    async fn record_invocation(&self, invocation: &ModelInvocation) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected("ledger unavailable".to_string()));
        }
        self.invocations.lock().unwrap().push(invocation.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MockCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

#[async_trait]
impl ComparisonCache for MockCache {
    async fn lookup(&self, cache_key: &str) -> StoreResult<Option<CacheEntry>> {
        Ok(self.entries.lock().unwrap().get(cache_key).cloned())
    }

    async fn store(
        &self,
        cache_key: &str,
        payload: &serde_json::Value,
        tokens_estimate: i64,
    ) -> StoreResult<()> {
        self.entries.lock().unwrap().insert(
            cache_key.to_string(),
            CacheEntry {
                cache_key: cache_key.to_string(),
                payload: payload.clone(),
                hit_count: 0,
                tokens_saved: tokens_estimate,
                created_at: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn record_hit(&self, cache_key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(cache_key)
            .ok_or_else(|| StoreError::NotFound(cache_key.to_string()))?;
        entry.hit_count += 1;
        Ok(())
    }
}

/// Marketplace store mock. Flipping `fail_writes` makes the domain
/// persistence writes error while reads keep working, for exercising the
/// return-the-computed-result-anyway contract.
#[derive(Default)]
struct MockStore {
    conversations: Mutex<HashMap<Uuid, Vec<ChatTurn>>>,
    quality_scores: Mutex<Vec<(Uuid, QualityEvaluation)>>,
    ads: Mutex<Vec<AdSummary>>,
    fail_writes: AtomicBool,
}

#[async_trait]
impl MarketplaceStore for MockStore {
    async fn save_quality_score(
        &self,
        ad_id: Uuid,
        _user_id: &str,
        evaluation: &QualityEvaluation,
    ) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected("store unavailable".to_string()));
        }
        self.quality_scores
            .lock()
            .unwrap()
            .push((ad_id, evaluation.clone()));
        Ok(())
    }

    async fn create_conversation(&self, _user_id: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.conversations.lock().unwrap().insert(id, Vec::new());
        Ok(id)
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> StoreResult<Vec<ChatTurn>> {
        self.conversations
            .lock()
            .unwrap()
            .get(&conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn append_turn(&self, conversation_id: Uuid, turn: &ChatTurn) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected("store unavailable".to_string()));
        }
        self.conversations
            .lock()
            .unwrap()
            .entry(conversation_id)
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn search_ads(&self, _analysis: &SearchAnalysis) -> StoreResult<Vec<AdSummary>> {
        Ok(self.ads.lock().unwrap().clone())
    }
}

//=========================================================================================
// Harness
//=========================================================================================

struct Harness {
    state: Arc<AppState>,
    model: Arc<MockModel>,
    ledger: Arc<MockLedger>,
    cache: Arc<MockCache>,
    store: Arc<MockStore>,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        provider: ModelProvider::Gemini,
        openai_api_key: None,
        gemini_api_key: None,
        model: "test-model".to_string(),
        generation: GenerationConfig::default(),
        max_retries: 2,
        retry_base_delay: Duration::from_millis(1),
        model_timeout: Duration::from_secs(5),
        chat_history_window: 20,
    }
}

fn harness(outcomes: Vec<ModelResult<ModelReply>>) -> Harness {
    let model = Arc::new(MockModel::new(outcomes));
    let ledger = Arc::new(MockLedger::default());
    let cache = Arc::new(MockCache::default());
    let store = Arc::new(MockStore::default());
    let state = Arc::new(AppState {
        config: Arc::new(test_config()),
        model: model.clone(),
        ledger: ledger.clone(),
        cache: cache.clone(),
        store: store.clone(),
    });
    Harness {
        state,
        model,
        ledger,
        cache,
        store,
    }
}

fn reply(text: &str) -> ModelResult<ModelReply> {
    Ok(ModelReply {
        text: text.to_string(),
        token_usage: Some(120),
    })
}

fn product(name: &str) -> ProductInfo {
    ProductInfo {
        name: name.to_string(),
        category: "Mobily".to_string(),
        brand: None,
        condition: Some("používaný".to_string()),
        features: vec![],
        price_eur: Some(300.0),
        location: None,
    }
}

fn ad_data() -> AdData {
    AdData {
        title: "Predám iPhone 13".to_string(),
        description: "Výborný stav, kupovaný na Slovensku.".to_string(),
        category: "Mobily".to_string(),
        price_eur: Some(450.0),
        location: Some("Bratislava".to_string()),
        photo_count: 4,
        specifications: vec!["128 GB".to_string()],
    }
}

const QUALITY_JSON: &str = r#"{"totalScore":72,"breakdown":{"description":20,"photos":18,"specifications":20,"pricing":14},"suggestions":["x"],"strengths":["y"],"weaknesses":["z"]}"#;

const COMPARISON_JSON: &str = r#"{"summary":"Oba telefóny sú dobrá voľba.","comparison":"iPhone má lepší fotoaparát, Galaxy väčší displej.","recommendation":"Pre fotenie iPhone.","suitability":["iPhone pre fotografov","Galaxy pre multimédiá"]}"#;

//=========================================================================================
// Chat
//=========================================================================================

#[tokio::test]
async fn chat_rejects_missing_message_without_model_call() {
    let h = harness(vec![reply("nepoužité")]);
    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "   ".to_string(),
            conversation_id: None,
            user_id: "u1".to_string(),
            context_type: ChatContextType::General,
        }),
    )
    .await;

    let (status, _) = result.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.total_calls(), 0);
    assert!(h.ledger.invocations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn chat_rejects_missing_user_id() {
    let h = harness(vec![]);
    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "Ahoj".to_string(),
            conversation_id: None,
            user_id: "".to_string(),
            context_type: ChatContextType::General,
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.total_calls(), 0);
}

#[tokio::test]
async fn chat_returns_reply_and_new_conversation() {
    let fixed = "Dobrý deň! Inzerát vytvoríte cez tlačidlo Pridať inzerát.";
    let h = harness(vec![reply(fixed)]);
    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "Ahoj, ako vytvorím inzerát?".to_string(),
            conversation_id: None,
            user_id: "u1".to_string(),
            context_type: ChatContextType::AdHelp,
        }),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.response, fixed);

    // Both turns were appended to the new conversation, in order.
    let conversations = h.store.conversations.lock().unwrap();
    let turns = conversations.get(&body.conversation_id).unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, "Ahoj, ako vytvorím inzerát?");
    assert_eq!(turns[1].text, fixed);

    let invocations = h.ledger.invocations.lock().unwrap();
    assert_eq!(invocations.len(), 1);
    assert!(invocations[0].success);
}

#[tokio::test]
async fn chat_continues_existing_conversation() {
    let h = harness(vec![reply("Pokračujeme.")]);
    let conversation_id = h.store.create_conversation("u1").await.unwrap();
    h.store
        .append_turn(conversation_id, &ChatTurn::user("prvá správa"))
        .await
        .unwrap();

    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "druhá správa".to_string(),
            conversation_id: Some(conversation_id.to_string()),
            user_id: "u1".to_string(),
            context_type: ChatContextType::General,
        }),
    )
    .await;

    let (_, Json(body)) = result.unwrap();
    assert_eq!(body.conversation_id, conversation_id);
    let conversations = h.store.conversations.lock().unwrap();
    assert_eq!(conversations.get(&conversation_id).unwrap().len(), 3);
}

#[tokio::test]
async fn chat_overload_maps_to_503_without_retry() {
    let h = harness(vec![Err(ModelError::Overloaded), reply("nepoužité")]);
    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "Ahoj".to_string(),
            conversation_id: None,
            user_id: "u1".to_string(),
            context_type: ChatContextType::General,
        }),
    )
    .await;

    let (status, Json(body)) = result.unwrap_err();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body.error.is_empty());
    assert_eq!(h.model.total_calls(), 1);

    let invocations = h.ledger.invocations.lock().unwrap();
    assert_eq!(invocations.len(), 1);
    assert!(!invocations[0].success);
    assert_eq!(
        invocations[0].error_kind,
        Some(InvocationErrorKind::Overloaded)
    );
}

#[tokio::test]
async fn chat_unknown_conversation_is_bad_request() {
    let h = harness(vec![reply("nepoužité")]);
    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "Ahoj".to_string(),
            conversation_id: Some(Uuid::new_v4().to_string()),
            user_id: "u1".to_string(),
            context_type: ChatContextType::General,
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.total_calls(), 0);
}

#[tokio::test]
async fn chat_succeeds_when_ledger_write_fails() {
    let fixed = "Odpoveď aj bez telemetrie.";
    let h = harness(vec![reply(fixed)]);
    h.ledger.fail.store(true, Ordering::SeqCst);

    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "Ahoj".to_string(),
            conversation_id: None,
            user_id: "u1".to_string(),
            context_type: ChatContextType::General,
        }),
    )
    .await;

    // The ledger is best-effort: its failure never fails the request.
    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.response, fixed);
    assert!(h.ledger.invocations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn chat_returns_reply_when_turn_persistence_fails() {
    let fixed = "Odpoveď aj bez uloženia.";
    let h = harness(vec![reply(fixed)]);
    let conversation_id = h.store.create_conversation("u1").await.unwrap();
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let result = chat_handler(
        State(h.state.clone()),
        Json(ChatRequest {
            message: "Ahoj".to_string(),
            conversation_id: Some(conversation_id.to_string()),
            user_id: "u1".to_string(),
            context_type: ChatContextType::General,
        }),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.response, fixed);

    // Nothing was appended, but the caller still got the reply.
    let conversations = h.store.conversations.lock().unwrap();
    assert!(conversations.get(&conversation_id).unwrap().is_empty());
}

//=========================================================================================
// Quality Evaluation
//=========================================================================================

#[tokio::test]
async fn quality_decodes_structured_result() {
    let h = harness(vec![reply(QUALITY_JSON)]);
    let result = evaluate_quality_handler(
        State(h.state.clone()),
        Json(EvaluateQualityRequest {
            ad_data: ad_data(),
            user_id: "u1".to_string(),
            ad_id: None,
        }),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.evaluation.total_score, 72);
    assert_eq!(body.evaluation.breakdown.description, 20);
    assert_eq!(body.evaluation.breakdown.photos, 18);
    assert_eq!(body.evaluation.breakdown.specifications, 20);
    assert_eq!(body.evaluation.breakdown.pricing, 14);
    assert!(body.generation_time >= 0);
}

#[tokio::test]
async fn quality_prose_response_is_500_and_logged_as_failure() {
    let h = harness(vec![reply("Ospravedlňujem sa, neviem to ohodnotiť.")]);
    let result = evaluate_quality_handler(
        State(h.state.clone()),
        Json(EvaluateQualityRequest {
            ad_data: ad_data(),
            user_id: "u1".to_string(),
            ad_id: None,
        }),
    )
    .await;

    let (status, _) = result.unwrap_err();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let invocations = h.ledger.invocations.lock().unwrap();
    assert_eq!(invocations.len(), 1);
    assert!(!invocations[0].success);
    assert_eq!(invocations[0].error_kind, Some(InvocationErrorKind::Decode));
}

#[tokio::test]
async fn quality_persists_score_when_ad_id_present() {
    let h = harness(vec![reply(QUALITY_JSON)]);
    let ad_id = Uuid::new_v4();
    let result = evaluate_quality_handler(
        State(h.state.clone()),
        Json(EvaluateQualityRequest {
            ad_data: ad_data(),
            user_id: "u1".to_string(),
            ad_id: Some(ad_id.to_string()),
        }),
    )
    .await;

    assert!(result.is_ok());
    let scores = h.store.quality_scores.lock().unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].0, ad_id);
    assert_eq!(scores[0].1.total_score, 72);
}

#[tokio::test]
async fn quality_returns_result_when_persistence_fails() {
    let h = harness(vec![reply(QUALITY_JSON)]);
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let result = evaluate_quality_handler(
        State(h.state.clone()),
        Json(EvaluateQualityRequest {
            ad_data: ad_data(),
            user_id: "u1".to_string(),
            ad_id: Some(Uuid::new_v4().to_string()),
        }),
    )
    .await;

    // The computed evaluation is returned even though saving it failed.
    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.evaluation.total_score, 72);
    assert!(h.store.quality_scores.lock().unwrap().is_empty());
}

#[tokio::test]
async fn quality_rejects_empty_ad_fields() {
    let h = harness(vec![]);
    let mut ad = ad_data();
    ad.description = String::new();
    let result = evaluate_quality_handler(
        State(h.state.clone()),
        Json(EvaluateQualityRequest {
            ad_data: ad,
            user_id: "u1".to_string(),
            ad_id: None,
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.total_calls(), 0);
}

#[tokio::test]
async fn quality_retry_is_bounded() {
    // Always failing: 1 initial attempt + max_retries (2) = 3 calls, then 500.
    let h = harness(vec![
        Err(ModelError::Failed("down".to_string())),
        Err(ModelError::Failed("down".to_string())),
        Err(ModelError::Failed("down".to_string())),
        Err(ModelError::Failed("down".to_string())),
    ]);
    let result = evaluate_quality_handler(
        State(h.state.clone()),
        Json(EvaluateQualityRequest {
            ad_data: ad_data(),
            user_id: "u1".to_string(),
            ad_id: None,
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.model.total_calls(), 3);
}

#[tokio::test]
async fn quality_overload_is_503_with_single_call() {
    let h = harness(vec![Err(ModelError::Overloaded)]);
    let result = evaluate_quality_handler(
        State(h.state.clone()),
        Json(EvaluateQualityRequest {
            ad_data: ad_data(),
            user_id: "u1".to_string(),
            ad_id: None,
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(h.model.total_calls(), 1);
}

//=========================================================================================
// Semantic Search
//=========================================================================================

#[tokio::test]
async fn search_returns_analysis_and_results() {
    let h = harness(vec![reply(
        r#"{"category":"Mobily","keywords":["iphone"],"maxPriceEur":500,"location":"Bratislava"}"#,
    )]);
    h.store.ads.lock().unwrap().push(AdSummary {
        id: Uuid::new_v4(),
        title: "iPhone 13, 128 GB".to_string(),
        category: "Mobily".to_string(),
        price_eur: Some(450.0),
        location: Some("Bratislava".to_string()),
    });

    let result = semantic_search_handler(
        State(h.state.clone()),
        Json(SemanticSearchRequest {
            query: "iphone do 500 eur v Bratislave".to_string(),
            user_id: None,
        }),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.analysis.category.as_deref(), Some("Mobily"));
    assert_eq!(body.analysis.max_price_eur, Some(500.0));
    assert_eq!(body.results.len(), 1);
}

#[tokio::test]
async fn search_rejects_empty_query() {
    let h = harness(vec![]);
    let result = semantic_search_handler(
        State(h.state.clone()),
        Json(SemanticSearchRequest {
            query: "".to_string(),
            user_id: None,
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.total_calls(), 0);
}

//=========================================================================================
// Product Comparison
//=========================================================================================

#[tokio::test]
async fn comparison_serves_reordered_repeat_from_cache() {
    let h = harness(vec![reply(COMPARISON_JSON)]);
    let a = product("iPhone 13");
    let b = product("Galaxy S22");

    let first = compare_products_handler(
        State(h.state.clone()),
        Json(CompareProductsRequest {
            products: vec![a.clone(), b.clone()],
            category: "Mobily".to_string(),
            user_id: None,
        }),
    )
    .await;
    let (_, Json(first_body)) = first.unwrap();
    assert!(!first_body.cached);

    // Same products in the opposite order: must be a cache hit.
    let second = compare_products_handler(
        State(h.state.clone()),
        Json(CompareProductsRequest {
            products: vec![b, a],
            category: "Mobily".to_string(),
            user_id: None,
        }),
    )
    .await;
    let (_, Json(second_body)) = second.unwrap();
    assert!(second_body.cached);
    assert_eq!(second_body.comparison.summary, first_body.comparison.summary);

    // One model call total; the hit was counted on the entry.
    assert_eq!(h.model.total_calls(), 1);
    let entries = h.cache.entries.lock().unwrap();
    let entry = entries.values().next().unwrap();
    assert_eq!(entry.hit_count, 1);

    // Both requests appear in the usage log; the hit as a zero-duration success.
    let invocations = h.ledger.invocations.lock().unwrap();
    assert_eq!(invocations.len(), 2);
    assert!(invocations[1].success);
    assert_eq!(invocations[1].response_time_ms, 0);
}

#[tokio::test]
async fn comparison_rejects_wrong_product_count() {
    let h = harness(vec![]);
    let result = compare_products_handler(
        State(h.state.clone()),
        Json(CompareProductsRequest {
            products: vec![product("osamelý produkt")],
            category: "Mobily".to_string(),
            user_id: None,
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.total_calls(), 0);
}

//=========================================================================================
// Description Generation
//=========================================================================================

#[tokio::test]
async fn description_generates_plain_text() {
    let h = harness(vec![reply("Predám zachovalý iPhone 13 v modrej farbe.")]);
    let result = generate_description_handler(
        State(h.state.clone()),
        Json(GenerateDescriptionRequest {
            product: product("iPhone 13"),
            image_data: None,
            user_id: "u1".to_string(),
        }),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.description.contains("iPhone 13"));
    assert_eq!(h.model.complete_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.model.image_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn description_routes_data_uri_to_image_completion() {
    let h = harness(vec![reply("Popis podľa fotografie.")]);
    let result = generate_description_handler(
        State(h.state.clone()),
        Json(GenerateDescriptionRequest {
            product: product("iPhone 13"),
            image_data: Some("data:image/jpeg;base64,/9j/4AAQ".to_string()),
            user_id: "u1".to_string(),
        }),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(h.model.image_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.model.complete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn description_rejects_unusable_image_data() {
    let h = harness(vec![]);
    let result = generate_description_handler(
        State(h.state.clone()),
        Json(GenerateDescriptionRequest {
            product: product("iPhone 13"),
            image_data: Some("len obyčajný text".to_string()),
            user_id: "u1".to_string(),
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    assert_eq!(h.model.total_calls(), 0);
}
