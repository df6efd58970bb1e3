//! Postgres-backed collaborators.
//!
//! Reads `marketplace_listings` and `provider_profiles`; writes
//! `search_history` (unique on `user_id, query`) and `popular_searches`
//! (unique on `query_hash`).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foundry_core::{normalize_query, Category, PopularSearch, ProviderMetadata, ProviderTier, SearchCandidate};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    prefilter_tokens, query_fingerprint, CandidateQuery, CandidateStore, ProviderStore,
    SearchHistoryEntry, SearchHistoryStore, StoreError,
};

#[derive(Debug, Clone)]
pub struct PgMarketplaceStore {
    pool: PgPool,
}

impl PgMarketplaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(PgPool::connect(database_url).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Escapes LIKE metacharacters so user text matches literally.
fn like_pattern(token: &str) -> String {
    let escaped = token
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn clamp_count(value: Option<i64>) -> u32 {
    value
        .unwrap_or(0)
        .clamp(0, i64::from(u32::MAX))
        .try_into()
        .unwrap_or(u32::MAX)
}

fn candidate_from_row(row: &PgRow) -> Result<Option<SearchCandidate>, StoreError> {
    let listing_id: Uuid = row.try_get("id")?;
    let category_text: String = row.try_get("category")?;
    let Ok(category) = category_text.parse::<Category>() else {
        warn!(%listing_id, category = %category_text, "skipping listing with unrecognized category");
        return Ok(None);
    };
    let attributes: Option<serde_json::Value> = row.try_get("attributes")?;
    let attributes = match attributes {
        Some(serde_json::Value::Object(map)) => map,
        _ => Default::default(),
    };

    Ok(Some(SearchCandidate {
        listing_id,
        provider_id: row.try_get("provider_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category,
        subcategory: row
            .try_get::<Option<String>, _>("subcategory")?
            .unwrap_or_default(),
        attributes,
        is_verified: row.try_get::<Option<bool>, _>("is_verified")?.unwrap_or(false),
        created_at: row.try_get("created_at")?,
        provider: None,
    }))
}

fn provider_from_row(row: &PgRow) -> Result<Option<(Uuid, ProviderMetadata)>, StoreError> {
    let provider_id: Uuid = row.try_get("id")?;
    let tier_text: Option<String> = row.try_get("tier")?;
    let tier = match tier_text.as_deref().map(str::parse::<ProviderTier>) {
        Some(Ok(tier)) => tier,
        None => ProviderTier::Standard,
        Some(Err(err)) => {
            warn!(%provider_id, error = %err, "skipping provider with unrecognized tier");
            return Ok(None);
        }
    };
    let last_active_at: Option<DateTime<Utc>> = row.try_get("last_active_at")?;

    Ok(Some((
        provider_id,
        ProviderMetadata {
            tier,
            average_rating: row.try_get("average_rating")?,
            total_reviews: clamp_count(row.try_get("total_reviews")?),
            response_rate_percent: row.try_get("response_rate")?,
            average_response_time_hours: row.try_get("avg_response_time_hours")?,
            completion_rate_percent: row.try_get("completion_rate")?,
            total_completed_orders: clamp_count(row.try_get("total_completed_orders")?),
            discount_percent: row.try_get("discount_percent")?,
            last_active_at,
            day_rate: row.try_get("day_rate")?,
            currency: row.try_get("currency")?,
        },
    )))
}

#[async_trait]
impl CandidateStore for PgMarketplaceStore {
    async fn fetch_candidates(&self, query: &CandidateQuery) -> Result<Vec<SearchCandidate>, StoreError> {
        let patterns = query
            .text
            .as_deref()
            .map(prefilter_tokens)
            .filter(|tokens| !tokens.is_empty())
            .map(|tokens| tokens.iter().map(|t| like_pattern(t)).collect::<Vec<_>>());
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let span = info_span!(
            "pg_fetch_candidates",
            category = query.category.map(|c| c.as_str()),
            tokens = patterns.as_ref().map_or(0, Vec::len),
            limit
        );
        let rows = sqlx::query(
            r#"
            SELECT l.id,
                   l.provider_id,
                   l.title,
                   l.description,
                   l.category,
                   l.subcategory,
                   l.attributes,
                   l.is_verified,
                   l.created_at
              FROM marketplace_listings l
             WHERE l.is_active
               AND ($1::text IS NULL OR l.category = $1)
               AND (
                    $2::text[] IS NULL
                    OR l.title ILIKE ANY($2)
                    OR COALESCE(l.description, '') ILIKE ANY($2)
                    OR COALESCE(l.subcategory, '') ILIKE ANY($2)
                    OR COALESCE(l.attributes::text, '') ILIKE ANY($2)
               )
             ORDER BY l.created_at DESC NULLS LAST, l.id
             LIMIT $3
            "#,
        )
        .bind(query.category.map(|c| c.as_str()))
        .bind(patterns)
        .bind(limit)
        .fetch_all(&self.pool)
        .instrument(span)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(candidate) = candidate_from_row(row)? {
                out.push(candidate);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ProviderStore for PgMarketplaceStore {
    async fn fetch_provider_metadata(
        &self,
        provider_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ProviderMetadata>, StoreError> {
        if provider_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let span = info_span!("pg_fetch_provider_metadata", providers = provider_ids.len());
        let rows = sqlx::query(
            r#"
            SELECT p.id,
                   p.tier,
                   p.average_rating::float8 AS average_rating,
                   p.total_reviews::bigint AS total_reviews,
                   p.response_rate::float8 AS response_rate,
                   p.avg_response_time_hours::float8 AS avg_response_time_hours,
                   p.completion_rate::float8 AS completion_rate,
                   p.total_completed_orders::bigint AS total_completed_orders,
                   p.discount_percent::float8 AS discount_percent,
                   p.last_active_at,
                   p.day_rate::float8 AS day_rate,
                   p.currency
              FROM provider_profiles p
             WHERE p.id = ANY($1)
            "#,
        )
        .bind(provider_ids)
        .fetch_all(&self.pool)
        .instrument(span)
        .await?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            if let Some((id, metadata)) = provider_from_row(row)? {
                out.insert(id, metadata);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SearchHistoryStore for PgMarketplaceStore {
    async fn record_search(&self, entry: &SearchHistoryEntry) -> Result<(), StoreError> {
        let filters = serde_json::to_value(&entry.filters)?;
        let result_count = i64::try_from(entry.result_count).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            INSERT INTO search_history (id, user_id, query, filters, result_count, searched_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, query) DO UPDATE
               SET filters = EXCLUDED.filters,
                   result_count = EXCLUDED.result_count,
                   searched_at = EXCLUDED.searched_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(&entry.query)
        .bind(filters)
        .bind(result_count)
        .bind(entry.searched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_popular_search(&self, query: &str) -> Result<(), StoreError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO popular_searches (query_hash, query, search_count, last_searched_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (query_hash) DO UPDATE
               SET search_count = popular_searches.search_count + 1,
                   last_searched_at = NOW()
            "#,
        )
        .bind(query_fingerprint(&normalized))
        .bind(&normalized)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn popular_searches(&self, limit: usize) -> Result<Vec<PopularSearch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT query, search_count::bigint AS search_count
              FROM popular_searches
             ORDER BY search_count DESC, query
             LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("search_count")?;
            out.push(PopularSearch {
                query: row.try_get("query")?,
                count: u64::try_from(count).unwrap_or(0),
            });
        }
        Ok(out)
    }
}
