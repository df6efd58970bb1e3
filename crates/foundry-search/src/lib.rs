//! Search orchestration: fetch, score, filter, sort, facet, paginate, log.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use foundry_core::{AppliedFilters, SearchCandidate, SearchParams, SearchResponse};
use foundry_ranking::{apply_filters, calculate_facets, paginate, sort_results, suggest_queries, Ranker, RankingConfig};
use foundry_storage::{
    CandidateQuery, CandidateStore, InMemoryMarketplace, NoopSearchHistory, PgMarketplaceStore, ProviderStore,
    SearchHistoryEntry, SearchHistoryStore, StoreError,
};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

pub const CRATE_NAME: &str = "foundry-search";

/// How many popular queries are considered when building suggestions.
const POPULAR_SEARCH_WINDOW: usize = 50;

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub database_url: Option<String>,
    pub fixtures_path: PathBuf,
    pub ranking_config_path: Option<PathBuf>,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub candidate_limit: usize,
    pub suggestion_limit: usize,
    /// Budget for the popular-search lookup; suggestions are skipped past it.
    pub suggestion_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            fixtures_path: PathBuf::from("./fixtures/marketplace.json"),
            ranking_config_path: None,
            default_page_size: 20,
            max_page_size: 100,
            candidate_limit: 500,
            suggestion_limit: 5,
            suggestion_timeout: Duration::from_millis(250),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl SearchSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            fixtures_path: std::env::var("FOUNDRY_FIXTURES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.fixtures_path),
            ranking_config_path: std::env::var("FOUNDRY_RANKING_CONFIG").ok().map(PathBuf::from),
            default_page_size: env_or("FOUNDRY_DEFAULT_PAGE_SIZE", defaults.default_page_size),
            max_page_size: env_or("FOUNDRY_MAX_PAGE_SIZE", defaults.max_page_size),
            candidate_limit: env_or("FOUNDRY_CANDIDATE_LIMIT", defaults.candidate_limit),
            suggestion_limit: env_or("FOUNDRY_SUGGESTION_LIMIT", defaults.suggestion_limit),
            suggestion_timeout: std::env::var("FOUNDRY_SUGGESTION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.suggestion_timeout),
        }
    }

    fn page_window(&self, params: &SearchParams) -> (u32, u32) {
        let max = self.max_page_size.max(1);
        let page = params.page.unwrap_or(1).max(1);
        let limit = params
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, max);
        (page, limit)
    }
}

pub struct SearchService {
    candidates: Arc<dyn CandidateStore>,
    providers: Arc<dyn ProviderStore>,
    history: Arc<dyn SearchHistoryStore>,
    ranker: Ranker,
    settings: SearchSettings,
}

impl SearchService {
    pub fn new(candidates: Arc<dyn CandidateStore>, providers: Arc<dyn ProviderStore>) -> Self {
        Self {
            candidates,
            providers,
            history: Arc::new(NoopSearchHistory),
            ranker: Ranker::default(),
            settings: SearchSettings::default(),
        }
    }

    pub fn with_history(mut self, history: Arc<dyn SearchHistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Runs one search. Collaborator failures yield an empty response, never an error.
    pub async fn search(&self, params: SearchParams) -> SearchResponse {
        self.search_at(params, Utc::now()).await
    }

    /// [`Self::search`] with an explicit clock, for recency scoring.
    pub async fn search_at(&self, params: SearchParams, now: DateTime<Utc>) -> SearchResponse {
        let (page, limit) = self.settings.page_window(&params);
        let filters = AppliedFilters::from_params(&params);
        let span = info_span!(
            "marketplace_search",
            query = filters.query.as_deref(),
            category = filters.category.map(|c| c.as_str()),
            page,
            limit
        );

        async move {
            let candidates = match self.load_candidates(&filters).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    error!(error = %err, "candidate fetch failed; returning empty results");
                    return SearchResponse::empty(filters, page, limit);
                }
            };
            if filters.availability.is_some() {
                debug!("availability range requested but listings carry no availability data; not applied");
            }

            let fetched = candidates.len();
            let scored = self
                .ranker
                .rank(candidates, filters.query.as_deref().unwrap_or_default(), now);
            let mut filtered = apply_filters(scored, &filters);
            sort_results(
                &mut filtered,
                params.sort_by.unwrap_or_default(),
                params.sort_order.unwrap_or_default(),
            );

            let total = filtered.len();
            let facets = calculate_facets(&filtered);
            let (results, has_more) = paginate(filtered, page, limit);
            let suggestions = self.suggestions(filters.query.as_deref()).await;

            if let (Some(query), Some(user_id)) = (filters.query.as_deref(), params.user_id) {
                self.spawn_history(user_id, query, &filters, total, now);
            }

            info!(fetched, total, returned = results.len(), "search complete");
            SearchResponse {
                results,
                total,
                page,
                limit,
                has_more,
                facets,
                query: filters.query.clone(),
                applied_filters: filters,
                suggestions,
            }
        }
        .instrument(span)
        .await
    }

    async fn load_candidates(&self, filters: &AppliedFilters) -> Result<Vec<SearchCandidate>, StoreError> {
        let query = CandidateQuery {
            category: filters.category,
            text: filters.query.clone(),
            limit: self.settings.candidate_limit,
        };
        let mut candidates = self.candidates.fetch_candidates(&query).await?;

        let mut provider_ids: Vec<Uuid> = candidates.iter().filter_map(|c| c.provider_id).collect();
        provider_ids.sort_unstable();
        provider_ids.dedup();
        if provider_ids.is_empty() {
            return Ok(candidates);
        }

        let metadata = self.providers.fetch_provider_metadata(&provider_ids).await?;
        for candidate in &mut candidates {
            if let Some(meta) = candidate.provider_id.and_then(|id| metadata.get(&id)) {
                candidate.provider = Some(meta.clone());
            }
        }
        Ok(candidates)
    }

    async fn suggestions(&self, query: Option<&str>) -> Vec<String> {
        let Some(query) = query else {
            return Vec::new();
        };
        let lookup = self.history.popular_searches(POPULAR_SEARCH_WINDOW);
        match tokio::time::timeout(self.settings.suggestion_timeout, lookup).await {
            Ok(Ok(popular)) => suggest_queries(query, &popular, self.settings.suggestion_limit),
            Ok(Err(err)) => {
                warn!(error = %err, "popular search lookup failed; no suggestions");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.suggestion_timeout.as_millis() as u64,
                    "popular search lookup timed out; no suggestions"
                );
                Vec::new()
            }
        }
    }

    /// Fire-and-forget: the task outlives the request and only logs failures.
    fn spawn_history(&self, user_id: Uuid, query: &str, filters: &AppliedFilters, result_count: usize, now: DateTime<Utc>) {
        let history = Arc::clone(&self.history);
        let entry = SearchHistoryEntry {
            user_id,
            query: query.to_string(),
            filters: filters.clone(),
            result_count,
            searched_at: now,
        };
        tokio::spawn(
            async move {
                if let Err(err) = history.record_search(&entry).await {
                    warn!(error = %err, %user_id, "failed to record search history");
                }
                if let Err(err) = history.increment_popular_search(&entry.query).await {
                    warn!(error = %err, "failed to increment popular search count");
                }
            }
            .instrument(Span::current()),
        );
    }
}

pub async fn build_service(settings: SearchSettings) -> Result<SearchService> {
    let ranking = match &settings.ranking_config_path {
        Some(path) => RankingConfig::from_yaml_file(path)?,
        None => RankingConfig::default(),
    };

    let service = match &settings.database_url {
        Some(url) => {
            let store = Arc::new(
                PgMarketplaceStore::connect(url)
                    .await
                    .context("connecting to DATABASE_URL")?,
            );
            SearchService::new(store.clone(), store.clone()).with_history(store)
        }
        None => {
            let store = Arc::new(InMemoryMarketplace::load_json_file(&settings.fixtures_path)?);
            info!(
                path = %settings.fixtures_path.display(),
                listings = store.listing_count(),
                "no DATABASE_URL set; serving marketplace fixtures"
            );
            SearchService::new(store.clone(), store.clone()).with_history(store)
        }
    };

    Ok(service.with_ranker(Ranker::new(ranking)).with_settings(settings))
}

pub async fn build_service_from_env() -> Result<SearchService> {
    build_service(SearchSettings::from_env()).await
}
