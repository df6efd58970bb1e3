//! Marketplace relevance scoring, multi-factor ranking and faceted filtering.
//!
//! Everything in this crate is synchronous and free of I/O; the search
//! orchestrator feeds it candidates and collects the ranked page.

pub mod attributes;
pub mod config;
pub mod facets;
pub mod filters;
pub mod scoring;
pub mod suggest;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use foundry_core::{ScoreVector, SearchCandidate, SearchResult, SortBy, SortOrder};

pub use config::{ConfigError, RankingConfig, RankingWeights, TierScores};
pub use facets::calculate_facets;
pub use filters::apply_filters;
pub use scoring::QueryMatcher;
pub use suggest::suggest_queries;

pub const CRATE_NAME: &str = "foundry-ranking";

/// Scores candidates under one immutable [`RankingConfig`].
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    config: RankingConfig,
}

impl Ranker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn score(&self, candidate: &SearchCandidate, query: &QueryMatcher, now: DateTime<Utc>) -> ScoreVector {
        let provider = candidate.provider.as_ref();
        let mut scores = ScoreVector {
            relevance: query.score(candidate),
            tier: scoring::tier_score(candidate.tier(), &self.config.tier_scores),
            rating: scoring::rating_score(candidate.average_rating(), candidate.total_reviews()),
            response_rate: scoring::response_rate_score(
                provider.and_then(|p| p.response_rate_percent),
                provider.and_then(|p| p.average_response_time_hours),
            ),
            completion_rate: scoring::completion_rate_score(
                provider.and_then(|p| p.completion_rate_percent),
                provider.map(|p| p.total_completed_orders).unwrap_or(0),
            ),
            discount: scoring::discount_score(provider.and_then(|p| p.discount_percent)),
            recency: scoring::recency_score(provider.and_then(|p| p.last_active_at), now),
            total: 0.0,
        };
        scores.total = self.config.weights.combine(&scores);
        scores
    }

    /// Attaches a fresh [`ScoreVector`] to every candidate, preserving input order.
    pub fn rank(&self, candidates: Vec<SearchCandidate>, query: &str, now: DateTime<Utc>) -> Vec<SearchResult> {
        let matcher = QueryMatcher::new(query);
        candidates
            .into_iter()
            .map(|candidate| {
                let scores = self.score(&candidate, &matcher, now);
                SearchResult {
                    total_score: scores.total,
                    scores,
                    candidate,
                }
            })
            .collect()
    }
}

fn sort_key(result: &SearchResult, sort_by: SortBy) -> Option<f64> {
    let candidate = &result.candidate;
    match sort_by {
        SortBy::Relevance => Some(result.total_score),
        SortBy::Price => attributes::extract_price(candidate),
        SortBy::Rating => candidate.average_rating().filter(|r| r.is_finite()),
        SortBy::Newest => candidate.created_at.map(|ts| ts.timestamp_millis() as f64),
        SortBy::MostReviews => Some(f64::from(candidate.total_reviews())),
    }
}

/// Stable sort. Relevance always runs highest total first; other keys follow
/// `order`, put missing values last and break ties by descending total.
pub fn sort_results(results: &mut [SearchResult], sort_by: SortBy, order: SortOrder) {
    if sort_by == SortBy::Relevance {
        results.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        return;
    }

    results.sort_by(|a, b| {
        let by_field = match (sort_key(a, sort_by), sort_key(b, sort_by)) {
            (Some(ka), Some(kb)) => match order {
                SortOrder::Asc => ka.total_cmp(&kb),
                SortOrder::Desc => kb.total_cmp(&ka),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_field.then_with(|| b.total_score.total_cmp(&a.total_score))
    });
}

/// Slices one page out of `items`. `page` is 1-based; returns the page and
/// whether more items follow it.
pub fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> (Vec<T>, bool) {
    let page = page.max(1) as usize;
    let limit = limit.max(1) as usize;
    let total = items.len();
    let start = (page - 1).saturating_mul(limit);
    let has_more = start.saturating_add(limit) < total;
    let rows = items.into_iter().skip(start).take(limit).collect();
    (rows, has_more)
}
