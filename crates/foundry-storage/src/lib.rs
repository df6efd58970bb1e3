//! Collaborator contracts for marketplace search plus Postgres and in-memory
//! implementations.

mod memory;
mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foundry_core::{
    normalize_query, AppliedFilters, Category, PopularSearch, ProviderMetadata, SearchCandidate,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub use memory::{InMemoryMarketplace, MarketplaceFixture, ProviderFixture};
pub use postgres::PgMarketplaceStore;

pub const CRATE_NAME: &str = "foundry-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// What the orchestrator asks the candidate store for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub category: Option<Category>,
    pub text: Option<String>,
    pub limit: usize,
}

/// One user's search, upserted on `(user_id, query)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub user_id: Uuid,
    pub query: String,
    pub filters: AppliedFilters,
    pub result_count: usize,
    pub searched_at: DateTime<Utc>,
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn fetch_candidates(&self, query: &CandidateQuery) -> Result<Vec<SearchCandidate>, StoreError>;
}

#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Pre-aggregated metadata keyed by provider id. Unknown ids are absent.
    async fn fetch_provider_metadata(
        &self,
        provider_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ProviderMetadata>, StoreError>;
}

#[async_trait]
pub trait SearchHistoryStore: Send + Sync {
    async fn record_search(&self, entry: &SearchHistoryEntry) -> Result<(), StoreError>;

    async fn increment_popular_search(&self, query: &str) -> Result<(), StoreError>;

    async fn popular_searches(&self, limit: usize) -> Result<Vec<PopularSearch>, StoreError>;
}

#[derive(Debug, Default)]
pub struct NoopSearchHistory;

#[async_trait]
impl SearchHistoryStore for NoopSearchHistory {
    async fn record_search(&self, _entry: &SearchHistoryEntry) -> Result<(), StoreError> {
        Ok(())
    }

    async fn increment_popular_search(&self, _query: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn popular_searches(&self, _limit: usize) -> Result<Vec<PopularSearch>, StoreError> {
        Ok(Vec::new())
    }
}

/// Stable upsert key for the popular-search counter.
pub fn query_fingerprint(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    hex::encode(hasher.finalize())
}

/// Prefilter tokens: whitespace-split, lowercased, single characters dropped.
pub fn prefilter_tokens(text: &str) -> Vec<String> {
    normalize_query(text)
        .split(' ')
        .filter(|t| t.chars().count() > 1)
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_case_and_spacing() {
        assert_eq!(query_fingerprint("Plumber  Leeds"), query_fingerprint(" plumber leeds"));
        assert_ne!(query_fingerprint("plumber"), query_fingerprint("plumbers"));
        assert_eq!(query_fingerprint("plumber").len(), 64);
    }

    #[test]
    fn prefilter_tokens_drop_single_characters() {
        assert_eq!(prefilter_tokens("A  Gas Safe engineer"), vec!["gas", "safe", "engineer"]);
        assert!(prefilter_tokens(" ").is_empty());
    }

    #[tokio::test]
    async fn noop_history_accepts_everything() {
        let history = NoopSearchHistory;
        history.increment_popular_search("plumber").await.unwrap();
        assert!(history.popular_searches(5).await.unwrap().is_empty());
    }
}
