//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `UsageLedger`, `ComparisonCache` and `MarketplaceStore` ports from the
//! `core` crate. It handles all interactions with the PostgreSQL database
//! using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, QueryBuilder, Row};
use trhovisko_core::domain::{AdSummary, CacheEntry, ChatRole, ChatTurn, ModelInvocation};
use trhovisko_core::ports::{
    ComparisonCache, MarketplaceStore, StoreError, StoreResult, UsageLedger,
};
use trhovisko_core::{QualityEvaluation, SearchAnalysis};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store-facing ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> StoreError {
    StoreError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CacheEntryRecord {
    cache_key: String,
    payload: serde_json::Value,
    hit_count: i64,
    tokens_saved: i64,
    created_at: DateTime<Utc>,
}
impl CacheEntryRecord {
    fn to_domain(self) -> CacheEntry {
        CacheEntry {
            cache_key: self.cache_key,
            payload: self.payload,
            hit_count: self.hit_count,
            tokens_saved: self.tokens_saved,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TurnRecord {
    role: String,
    message_text: String,
}
impl TurnRecord {
    fn to_domain(self) -> ChatTurn {
        let role = if self.role == "model" {
            ChatRole::Model
        } else {
            ChatRole::User
        };
        ChatTurn {
            role,
            text: self.message_text,
        }
    }
}

#[derive(FromRow)]
struct AdRecord {
    id: Uuid,
    title: String,
    category: String,
    price_eur: Option<f64>,
    location: Option<String>,
}
impl AdRecord {
    fn to_domain(self) -> AdSummary {
        AdSummary {
            id: self.id,
            title: self.title,
            category: self.category,
            price_eur: self.price_eur,
            location: self.location,
        }
    }
}

//=========================================================================================
// `UsageLedger` Trait Implementation
//=========================================================================================

#[async_trait]
impl UsageLedger for DbAdapter {
    async fn record_invocation(&self, invocation: &ModelInvocation) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO model_invocations \
             (id, feature_type, started_at, response_time_ms, success, token_usage, error_kind) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(invocation.feature.as_str())
        .bind(invocation.started_at)
        .bind(invocation.response_time_ms)
        .bind(invocation.success)
        .bind(invocation.token_usage)
        .bind(invocation.error_kind.map(|k| k.as_str()))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `ComparisonCache` Trait Implementation
//=========================================================================================

#[async_trait]
impl ComparisonCache for DbAdapter {
    async fn lookup(&self, cache_key: &str) -> StoreResult<Option<CacheEntry>> {
        let record = sqlx::query_as::<_, CacheEntryRecord>(
            "SELECT cache_key, payload, hit_count, tokens_saved, created_at \
             FROM comparison_cache WHERE cache_key = $1",
        )
        .bind(cache_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(CacheEntryRecord::to_domain))
    }

    async fn store(
        &self,
        cache_key: &str,
        payload: &serde_json::Value,
        tokens_estimate: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO comparison_cache (cache_key, payload, token_estimate) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (cache_key) DO UPDATE SET \
               payload = EXCLUDED.payload, \
               token_estimate = EXCLUDED.token_estimate",
        )
        .bind(cache_key)
        .bind(payload)
        .bind(tokens_estimate)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn record_hit(&self, cache_key: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE comparison_cache \
             SET hit_count = hit_count + 1, tokens_saved = tokens_saved + token_estimate \
             WHERE cache_key = $1",
        )
        .bind(cache_key)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "Cache entry {} not found",
                cache_key
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `MarketplaceStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl MarketplaceStore for DbAdapter {
    async fn save_quality_score(
        &self,
        ad_id: Uuid,
        user_id: &str,
        evaluation: &QualityEvaluation,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO ad_quality_scores \
             (ad_id, user_id, total_score, description_score, photos_score, \
              specifications_score, pricing_score, suggestions, strengths, weaknesses) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (ad_id) DO UPDATE SET \
               total_score = EXCLUDED.total_score, \
               description_score = EXCLUDED.description_score, \
               photos_score = EXCLUDED.photos_score, \
               specifications_score = EXCLUDED.specifications_score, \
               pricing_score = EXCLUDED.pricing_score, \
               suggestions = EXCLUDED.suggestions, \
               strengths = EXCLUDED.strengths, \
               weaknesses = EXCLUDED.weaknesses, \
               evaluated_at = now()",
        )
        .bind(ad_id)
        .bind(user_id)
        .bind(evaluation.total_score)
        .bind(evaluation.breakdown.description)
        .bind(evaluation.breakdown.photos)
        .bind(evaluation.breakdown.specifications)
        .bind(evaluation.breakdown.pricing)
        .bind(serde_json::json!(evaluation.suggestions))
        .bind(serde_json::json!(evaluation.strengths))
        .bind(serde_json::json!(evaluation.weaknesses))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn create_conversation(&self, user_id: &str) -> StoreResult<Uuid> {
        let row = sqlx::query(
            "INSERT INTO conversations (id, user_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        row.try_get("id").map_err(unexpected)
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> StoreResult<Vec<ChatTurn>> {
        let records = sqlx::query_as::<_, TurnRecord>(
            "SELECT role, message_text FROM conversation_messages \
             WHERE conversation_id = $1 ORDER BY seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(TurnRecord::to_domain).collect())
    }

    async fn append_turn(&self, conversation_id: Uuid, turn: &ChatTurn) -> StoreResult<()> {
        let role = match turn.role {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        };
        sqlx::query(
            "INSERT INTO conversation_messages (id, conversation_id, role, message_text) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(role)
        .bind(&turn.text)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn search_ads(&self, analysis: &SearchAnalysis) -> StoreResult<Vec<AdSummary>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, title, category, price_eur, location FROM ads WHERE active = TRUE",
        );

        if let Some(category) = &analysis.category {
            builder.push(" AND category ILIKE ");
            builder.push_bind(category.clone());
        }
        if let Some(min_price) = analysis.min_price_eur {
            builder.push(" AND price_eur >= ");
            builder.push_bind(min_price);
        }
        if let Some(max_price) = analysis.max_price_eur {
            builder.push(" AND price_eur <= ");
            builder.push_bind(max_price);
        }
        if let Some(location) = &analysis.location {
            builder.push(" AND location ILIKE ");
            builder.push_bind(format!("%{}%", location));
        }
        if let Some(condition) = &analysis.condition {
            builder.push(" AND condition ILIKE ");
            builder.push_bind(format!("%{}%", condition));
        }
        if !analysis.keywords.is_empty() {
            builder.push(" AND (");
            for (index, keyword) in analysis.keywords.iter().enumerate() {
                if index > 0 {
                    builder.push(" OR ");
                }
                let pattern = format!("%{}%", keyword);
                builder.push("title ILIKE ");
                builder.push_bind(pattern.clone());
                builder.push(" OR description ILIKE ");
                builder.push_bind(pattern);
            }
            builder.push(")");
        }
        builder.push(" ORDER BY created_at DESC LIMIT 50");

        let records = builder
            .build_query_as::<AdRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(AdRecord::to_domain).collect())
    }
}
