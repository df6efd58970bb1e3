use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use foundry_core::{normalize_query, PopularSearch, ProviderMetadata, SearchCandidate};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    prefilter_tokens, CandidateQuery, CandidateStore, ProviderStore, SearchHistoryEntry,
    SearchHistoryStore, StoreError,
};

/// On-disk fixture used when no database is configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceFixture {
    #[serde(default)]
    pub listings: Vec<SearchCandidate>,
    #[serde(default)]
    pub providers: Vec<ProviderFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFixture {
    pub id: Uuid,
    #[serde(flatten)]
    pub metadata: ProviderMetadata,
}

/// Process-local marketplace backed by plain collections.
#[derive(Debug, Default)]
pub struct InMemoryMarketplace {
    listings: Vec<SearchCandidate>,
    providers: HashMap<Uuid, ProviderMetadata>,
    history: Mutex<Vec<SearchHistoryEntry>>,
    popular: Mutex<HashMap<String, u64>>,
}

impl InMemoryMarketplace {
    pub fn new(listings: Vec<SearchCandidate>, providers: HashMap<Uuid, ProviderMetadata>) -> Self {
        Self {
            listings,
            providers,
            ..Default::default()
        }
    }

    pub fn from_fixture(fixture: MarketplaceFixture) -> Self {
        let providers = fixture
            .providers
            .into_iter()
            .map(|p| (p.id, p.metadata))
            .collect();
        Self::new(fixture.listings, providers)
    }

    pub fn load_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let fixture: MarketplaceFixture =
            serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    pub async fn history(&self) -> Vec<SearchHistoryEntry> {
        self.history.lock().await.clone()
    }

    pub async fn popular_count(&self, query: &str) -> u64 {
        self.popular
            .lock()
            .await
            .get(&normalize_query(query))
            .copied()
            .unwrap_or(0)
    }
}

fn matches_text(candidate: &SearchCandidate, tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return true;
    }
    let attributes = serde_json::Value::Object(candidate.attributes.clone()).to_string();
    let haystack = format!(
        "{} {} {} {}",
        candidate.title,
        candidate.description.as_deref().unwrap_or_default(),
        candidate.subcategory,
        attributes
    )
    .to_lowercase();
    tokens.iter().any(|t| haystack.contains(t.as_str()))
}

#[async_trait]
impl CandidateStore for InMemoryMarketplace {
    async fn fetch_candidates(&self, query: &CandidateQuery) -> Result<Vec<SearchCandidate>, StoreError> {
        let tokens = query.text.as_deref().map(prefilter_tokens).unwrap_or_default();
        let mut matched: Vec<&SearchCandidate> = self
            .listings
            .iter()
            .filter(|c| query.category.map_or(true, |category| c.category == category))
            .filter(|c| matches_text(c, &tokens))
            .collect();
        // Same cap as the Postgres store: newest first, undated last.
        matched.sort_by(|a, b| match (a.created_at, b.created_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(matched.into_iter().take(query.limit).cloned().collect())
    }
}

#[async_trait]
impl ProviderStore for InMemoryMarketplace {
    async fn fetch_provider_metadata(
        &self,
        provider_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ProviderMetadata>, StoreError> {
        Ok(provider_ids
            .iter()
            .filter_map(|id| self.providers.get(id).map(|meta| (*id, meta.clone())))
            .collect())
    }
}

#[async_trait]
impl SearchHistoryStore for InMemoryMarketplace {
    async fn record_search(&self, entry: &SearchHistoryEntry) -> Result<(), StoreError> {
        let mut history = self.history.lock().await;
        match history
            .iter_mut()
            .find(|e| e.user_id == entry.user_id && e.query == entry.query)
        {
            Some(existing) => *existing = entry.clone(),
            None => history.push(entry.clone()),
        }
        Ok(())
    }

    async fn increment_popular_search(&self, query: &str) -> Result<(), StoreError> {
        let key = normalize_query(query);
        if key.is_empty() {
            return Ok(());
        }
        *self.popular.lock().await.entry(key).or_default() += 1;
        Ok(())
    }

    async fn popular_searches(&self, limit: usize) -> Result<Vec<PopularSearch>, StoreError> {
        let popular = self.popular.lock().await;
        let mut out: Vec<PopularSearch> = popular
            .iter()
            .map(|(query, count)| PopularSearch {
                query: query.clone(),
                count: *count,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        out.truncate(limit);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use foundry_core::{AppliedFilters, Category, ProviderTier};
    use tempfile::tempdir;

    fn listing(title: &str, category: Category) -> SearchCandidate {
        SearchCandidate::new(title, category)
    }

    #[tokio::test]
    async fn candidate_fetch_applies_category_text_and_limit() {
        let mut skilled = listing("Contractor", Category::People);
        skilled.attributes.insert("skills".into(), serde_json::json!(["Rust"]));
        let store = InMemoryMarketplace::new(
            vec![
                listing("Rust consultant", Category::People),
                skilled,
                listing("Rust-proof paint", Category::Products),
                listing("Designer", Category::People),
            ],
            HashMap::new(),
        );

        let people = store
            .fetch_candidates(&CandidateQuery {
                category: Some(Category::People),
                text: Some("rust".into()),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(people.len(), 2);

        let limited = store
            .fetch_candidates(&CandidateQuery {
                category: None,
                text: None,
                limit: 3,
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test]
    async fn candidate_cap_keeps_newest_listings() {
        let now = Utc::now();
        let dated = |title: &str, days: i64| {
            let mut c = listing(title, Category::Services);
            c.created_at = Some(now - chrono::Duration::days(days));
            c
        };
        let store = InMemoryMarketplace::new(
            vec![
                listing("undated plumber", Category::Services),
                dated("old plumber", 400),
                dated("new plumber", 1),
                dated("mid plumber", 30),
            ],
            HashMap::new(),
        );
        let capped = store
            .fetch_candidates(&CandidateQuery {
                category: None,
                text: Some("plumber".into()),
                limit: 2,
            })
            .await
            .unwrap();
        let titles: Vec<&str> = capped.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["new plumber", "mid plumber"]);
    }

    #[tokio::test]
    async fn provider_lookup_skips_unknown_ids() {
        let known = Uuid::new_v4();
        let store = InMemoryMarketplace::new(
            Vec::new(),
            HashMap::from([(known, ProviderMetadata::new(ProviderTier::Verified))]),
        );
        let found = store
            .fetch_provider_metadata(&[known, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[&known].tier, ProviderTier::Verified);
    }

    #[tokio::test]
    async fn history_upserts_per_user_and_query() {
        let store = InMemoryMarketplace::default();
        let user_id = Uuid::new_v4();
        for result_count in [3, 7] {
            store
                .record_search(&SearchHistoryEntry {
                    user_id,
                    query: "plumber".into(),
                    filters: AppliedFilters::default(),
                    result_count,
                    searched_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let history = store.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result_count, 7);
    }

    #[tokio::test]
    async fn popular_counter_normalizes_queries() {
        let store = InMemoryMarketplace::default();
        for q in ["Plumber", " plumber ", "electrician", "  "] {
            store.increment_popular_search(q).await.unwrap();
        }
        assert_eq!(store.popular_count("PLUMBER").await, 2);
        let top = store.popular_searches(1).await.unwrap();
        assert_eq!(top, vec![PopularSearch { query: "plumber".into(), count: 2 }]);
    }

    #[test]
    fn loads_fixture_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("marketplace.json");
        let provider_id = Uuid::new_v4();
        let fixture = serde_json::json!({
            "listings": [{
                "listingId": Uuid::new_v4(),
                "providerId": provider_id,
                "title": "Gas engineer",
                "category": "Services",
                "attributes": {"rate": "£200/day"}
            }],
            "providers": [{"id": provider_id, "tier": "premium", "averageRating": 4.9, "totalReviews": 31}]
        });
        std::fs::write(&path, fixture.to_string()).expect("write fixture");

        let store = InMemoryMarketplace::load_json_file(&path).expect("load");
        assert_eq!(store.listing_count(), 1);
        assert_eq!(store.providers[&provider_id].total_reviews, 31);
        assert!(InMemoryMarketplace::load_json_file(dir.path().join("missing.json")).is_err());
    }

    #[tokio::test]
    async fn workspace_fixtures_load_and_join() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/marketplace.json");
        let store = InMemoryMarketplace::load_json_file(&path).expect("workspace fixtures");
        assert!(store.listing_count() >= 5);

        let listings = store
            .fetch_candidates(&CandidateQuery {
                category: Some(Category::Services),
                text: Some("plumbing".into()),
                limit: 50,
            })
            .await
            .unwrap();
        let ids: Vec<Uuid> = listings.iter().filter_map(|c| c.provider_id).collect();
        let providers = store.fetch_provider_metadata(&ids).await.unwrap();
        assert_eq!(providers.len(), ids.len());
    }
}
