//! The seven ranking components. Every scorer is total over its input space
//! and returns a value in `[0, 1]`.

use chrono::{DateTime, Utc};
use foundry_core::{Attributes, ProviderTier, SearchCandidate};
use regex::Regex;

use crate::attributes::{relevance_terms, string_values};
use crate::config::TierScores;

/// Score for "no signal": missing data neither helps nor hurts.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Recency score when a provider's last activity is unknown.
pub const UNKNOWN_RECENCY_SCORE: f64 = 0.3;

const WILSON_Z: f64 = 1.96;

const TITLE_EXACT_POINTS: f64 = 100.0;
const TITLE_SUBSTRING_POINTS: f64 = 80.0;
const TITLE_TOKEN_POINTS: f64 = 60.0;
const DESCRIPTION_SUBSTRING_POINTS: f64 = 40.0;
const DESCRIPTION_TOKEN_POINTS: f64 = 30.0;
const SUBCATEGORY_POINTS: f64 = 50.0;
const ATTRIBUTE_POINTS: f64 = 50.0;
const WORD_BOUNDARY_POINTS: f64 = 20.0;

/// A free-text query compiled once per search and reused for every candidate.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    text: String,
    tokens: Vec<String>,
    word_boundary: Option<Regex>,
}

impl QueryMatcher {
    pub fn new(query: &str) -> Self {
        let text = query.trim().to_lowercase();
        let tokens = text
            .split_whitespace()
            .filter(|t| t.chars().count() > 1)
            .map(ToString::to_string)
            .collect();
        let word_boundary = if text.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&text))).ok()
        };
        Self {
            text,
            tokens,
            word_boundary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    fn token_ratio(&self, haystack: &str) -> f64 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        let matched = self.tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
        matched as f64 / self.tokens.len() as f64
    }

    /// Text relevance of a listing against this query.
    pub fn score(&self, candidate: &SearchCandidate) -> f64 {
        if self.is_empty() {
            return NEUTRAL_SCORE;
        }

        let mut points = 0.0;
        let mut max_points = 0.0;

        let title = candidate.title.trim().to_lowercase();
        max_points += TITLE_EXACT_POINTS;
        if title == self.text {
            points += TITLE_EXACT_POINTS;
        } else if title.contains(&self.text) {
            points += TITLE_SUBSTRING_POINTS;
        }

        max_points += TITLE_TOKEN_POINTS;
        points += self.token_ratio(&title) * TITLE_TOKEN_POINTS;

        if let Some(description) = candidate
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            let description = description.to_lowercase();
            max_points += DESCRIPTION_SUBSTRING_POINTS + DESCRIPTION_TOKEN_POINTS;
            if description.contains(&self.text) {
                points += DESCRIPTION_SUBSTRING_POINTS;
            }
            points += self.token_ratio(&description) * DESCRIPTION_TOKEN_POINTS;
        }

        let subcategory = candidate.subcategory.trim().to_lowercase();
        if !subcategory.is_empty() {
            max_points += SUBCATEGORY_POINTS;
            if subcategory.contains(&self.text) {
                points += SUBCATEGORY_POINTS;
            }
        }

        if !candidate.attributes.is_empty() {
            max_points += ATTRIBUTE_POINTS;
            points += self.attribute_score(&candidate.attributes) * ATTRIBUTE_POINTS;
        }

        max_points += WORD_BOUNDARY_POINTS;
        if self
            .word_boundary
            .as_ref()
            .is_some_and(|re| re.is_match(&candidate.title))
        {
            points += WORD_BOUNDARY_POINTS;
        }

        (points / max_points).clamp(0.0, 1.0)
    }

    /// Token hits in array-valued skill-like fields count 1.0, hits in any
    /// other string attribute count 0.5; normalized by token count.
    pub fn attribute_score(&self, attributes: &Attributes) -> f64 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        let array_terms = relevance_terms(attributes);
        let strings = string_values(attributes);

        let hits: f64 = self
            .tokens
            .iter()
            .map(|token| {
                if array_terms.iter().any(|term| term.contains(token.as_str())) {
                    1.0
                } else if strings.iter().any(|value| value.contains(token.as_str())) {
                    0.5
                } else {
                    0.0
                }
            })
            .sum();
        (hits / self.tokens.len() as f64).min(1.0)
    }
}

pub fn relevance_score(candidate: &SearchCandidate, query: &str) -> f64 {
    QueryMatcher::new(query).score(candidate)
}

pub fn tier_score(tier: Option<ProviderTier>, table: &TierScores) -> f64 {
    tier.map(|t| table.score(t)).unwrap_or(0.0).clamp(0.0, 1.0)
}

/// Wilson lower bound over the normalized rating plus a small volume bonus.
pub fn rating_score(average_rating: Option<f64>, total_reviews: u32) -> f64 {
    let Some(rating) = average_rating.filter(|r| r.is_finite() && *r > 0.0) else {
        return NEUTRAL_SCORE;
    };
    if total_reviews == 0 {
        return NEUTRAL_SCORE;
    }

    let p = (rating / 5.0).clamp(0.0, 1.0);
    let n = f64::from(total_reviews);
    let z2 = WILSON_Z * WILSON_Z;
    let wilson = (p + z2 / (2.0 * n) - WILSON_Z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt())
        / (1.0 + z2 / n);
    let volume_bonus = ((n + 1.0).log10() / 3.0).min(0.2);
    (wilson + volume_bonus).clamp(0.0, 1.0)
}

fn response_time_bonus(hours: Option<f64>) -> f64 {
    match hours.filter(|h| h.is_finite()) {
        Some(h) if h <= 1.0 => 0.3,
        Some(h) if h <= 4.0 => 0.25,
        Some(h) if h <= 12.0 => 0.2,
        Some(h) if h <= 24.0 => 0.15,
        Some(h) if h <= 48.0 => 0.1,
        _ => 0.0,
    }
}

pub fn response_rate_score(response_rate_percent: Option<f64>, response_time_hours: Option<f64>) -> f64 {
    let Some(rate) = response_rate_percent.filter(|r| r.is_finite()) else {
        return NEUTRAL_SCORE;
    };
    let base = rate.clamp(0.0, 100.0) / 100.0 * 0.7;
    (base + response_time_bonus(response_time_hours)).clamp(0.0, 1.0)
}

pub fn completion_rate_score(completion_rate_percent: Option<f64>, completed_orders: u32) -> f64 {
    let Some(rate) = completion_rate_percent.filter(|r| r.is_finite()) else {
        return NEUTRAL_SCORE;
    };
    let rate = rate.clamp(0.0, 100.0);
    let experience_bonus = ((f64::from(completed_orders) + 1.0).log10() / 4.0).min(0.15);
    let mut score = rate / 100.0 + experience_bonus;
    if rate < 80.0 {
        score *= 0.8;
    }
    if rate < 60.0 {
        score *= 0.7;
    }
    score.clamp(0.0, 1.0)
}

pub fn discount_score(discount_percent: Option<f64>) -> f64 {
    match discount_percent.filter(|d| d.is_finite()) {
        Some(d) if d > 0.0 => d.min(50.0) / 50.0,
        _ => 0.0,
    }
}

pub fn recency_for_days(days: f64) -> f64 {
    match days {
        d if d <= 1.0 => 1.0,
        d if d <= 3.0 => 0.9,
        d if d <= 7.0 => 0.8,
        d if d <= 14.0 => 0.7,
        d if d <= 30.0 => 0.5,
        d if d <= 60.0 => 0.3,
        d if d <= 90.0 => 0.2,
        _ => 0.1,
    }
}

pub fn recency_score(last_active_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(last_active_at) = last_active_at else {
        return UNKNOWN_RECENCY_SCORE;
    };
    let seconds = (now - last_active_at).num_seconds().max(0);
    recency_for_days(seconds as f64 / 86_400.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use foundry_core::{Category, ProviderMetadata, ProviderTier};
    use proptest::prelude::*;
    use serde_json::json;

    fn listing(title: &str) -> SearchCandidate {
        SearchCandidate::new(title, Category::Services)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn empty_query_is_neutral() {
        let mut candidate = listing("Emergency Plumber");
        candidate.description = Some("Boilers and leaks".into());
        assert_eq!(relevance_score(&candidate, ""), NEUTRAL_SCORE);
        assert_eq!(relevance_score(&candidate, "   \t"), NEUTRAL_SCORE);
    }

    #[test]
    fn exact_title_match_scores_one() {
        assert_eq!(relevance_score(&listing("Plumber"), "plumber"), 1.0);
    }

    #[test]
    fn substring_ranks_below_exact_match() {
        let exact = relevance_score(&listing("Plumber"), "plumber");
        let partial = relevance_score(&listing("Emergency Plumber London"), "plumber");
        let miss = relevance_score(&listing("Electrician"), "plumber");
        assert!(exact > partial);
        assert!(partial > miss);
        assert_eq!(miss, 0.0);
    }

    #[test]
    fn description_contributes_without_full_substring() {
        let mut candidate = listing("Home services");
        candidate.description = Some("Boiler servicing and repair across Leeds".into());
        let score = relevance_score(&candidate, "boiler leeds");
        // No title hit; description token hits only (30 of 70 + 180 title max).
        assert!((score - 30.0 / 250.0).abs() < 1e-9);
    }

    #[test]
    fn subcategory_and_attributes_add_points() {
        let mut candidate = listing("Tradesperson");
        candidate.subcategory = "Plumbing".into();
        candidate.attributes = json!({"skills": ["Plumbing", "Heating"]})
            .as_object()
            .cloned()
            .unwrap();
        let score = relevance_score(&candidate, "plumbing");
        assert!((score - 100.0 / 280.0).abs() < 1e-9);
    }

    #[test]
    fn attribute_score_weights_arrays_over_strings() {
        let matcher = QueryMatcher::new("rust kubernetes");
        let attributes = json!({"technologies": ["Rust"], "notes": "kubernetes on call"})
            .as_object()
            .cloned()
            .unwrap();
        assert!((matcher.attribute_score(&attributes) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn single_character_tokens_are_ignored() {
        let matcher = QueryMatcher::new("a plumber");
        assert_eq!(matcher.tokens(), ["plumber".to_string()]);
        assert!(QueryMatcher::new("x").tokens().is_empty());
    }

    #[test]
    fn regex_metacharacters_in_query_are_literal() {
        let score = relevance_score(&listing("C++ developer"), "c++");
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn tier_lookup_and_missing_provider() {
        let table = TierScores::default();
        assert_eq!(tier_score(None, &table), 0.0);
        assert_eq!(tier_score(Some(ProviderTier::Premium), &table), 1.0);
        assert!(tier_score(Some(ProviderTier::Verified), &table) > tier_score(Some(ProviderTier::Standard), &table));
    }

    #[test]
    fn rating_neutral_cases() {
        assert_eq!(rating_score(None, 10), NEUTRAL_SCORE);
        assert_eq!(rating_score(Some(4.5), 0), NEUTRAL_SCORE);
        assert_eq!(rating_score(Some(0.0), 12), NEUTRAL_SCORE);
    }

    #[test]
    fn many_good_reviews_beat_one_perfect_review() {
        let single = rating_score(Some(5.0), 1);
        let established = rating_score(Some(4.6), 50);
        assert!(established > single, "{established} <= {single}");
    }

    #[test]
    fn response_rate_brackets() {
        assert_eq!(response_rate_score(None, Some(1.0)), NEUTRAL_SCORE);
        assert!((response_rate_score(Some(100.0), Some(0.5)) - 1.0).abs() < 1e-12);
        assert!((response_rate_score(Some(50.0), Some(10.0)) - 0.55).abs() < 1e-12);
        assert!((response_rate_score(Some(50.0), None) - 0.35).abs() < 1e-12);
        assert!((response_rate_score(Some(0.0), Some(72.0))).abs() < 1e-12);
    }

    #[test]
    fn completion_penalties_compound() {
        assert_eq!(completion_rate_score(None, 100), NEUTRAL_SCORE);
        assert_eq!(completion_rate_score(Some(100.0), 10_000), 1.0);
        let mid = completion_rate_score(Some(70.0), 0);
        assert!((mid - 0.56).abs() < 1e-12);
        let low = completion_rate_score(Some(50.0), 0);
        assert!((low - 0.5 * 0.8 * 0.7).abs() < 1e-12);
    }

    #[test]
    fn discount_is_capped_tiebreaker() {
        assert_eq!(discount_score(None), 0.0);
        assert_eq!(discount_score(Some(-5.0)), 0.0);
        assert_eq!(discount_score(Some(25.0)), 0.5);
        assert_eq!(discount_score(Some(80.0)), 1.0);
    }

    #[test]
    fn recency_steps() {
        let now = now();
        assert_eq!(recency_score(None, now), UNKNOWN_RECENCY_SCORE);
        assert_eq!(recency_score(Some(now - Duration::hours(5)), now), 1.0);
        assert_eq!(recency_score(Some(now - Duration::days(10)), now), 0.7);
        assert_eq!(recency_score(Some(now - Duration::days(400)), now), 0.1);
        assert_eq!(recency_score(Some(now + Duration::days(2)), now), 1.0);
    }

    proptest! {
        #[test]
        fn scorers_stay_bounded(
            rating in proptest::option::of(-1.0f64..10.0),
            reviews in 0u32..1_000_000,
            rate in proptest::option::of(-50.0f64..200.0),
            hours in proptest::option::of(-5.0f64..500.0),
            orders in 0u32..1_000_000,
            discount in proptest::option::of(-100.0f64..300.0),
            days in 0i64..100_000,
        ) {
            let now = now();
            for score in [
                rating_score(rating, reviews),
                response_rate_score(rate, hours),
                completion_rate_score(rate, orders),
                discount_score(discount),
                recency_score(Some(now - Duration::days(days)), now),
            ] {
                prop_assert!((0.0..=1.0).contains(&score), "score {score} out of range");
            }
        }

        #[test]
        fn rating_is_monotonic_in_review_count(rating in 0.5f64..=5.0, reviews in 1u32..5_000) {
            prop_assert!(rating_score(Some(rating), reviews + 1) >= rating_score(Some(rating), reviews) - 1e-12);
        }

        #[test]
        fn recency_never_drops_as_activity_gets_fresher(days in 0.0f64..1_000.0, delta in 0.0f64..100.0) {
            prop_assert!(recency_for_days(days) >= recency_for_days(days + delta));
        }

        #[test]
        fn ranked_total_stays_bounded(
            title in "[a-zA-Z ]{0,24}",
            query in "[a-zA-Z ]{0,12}",
            with_provider in any::<bool>(),
            tier in prop_oneof![
                Just(ProviderTier::Pending),
                Just(ProviderTier::Standard),
                Just(ProviderTier::Verified),
                Just(ProviderTier::Premium),
            ],
            rating in proptest::option::of(-1.0f64..10.0),
            reviews in 0u32..100_000,
            rate in proptest::option::of(-50.0f64..200.0),
            hours in proptest::option::of(-5.0f64..500.0),
            discount in proptest::option::of(-100.0f64..300.0),
            days in -30i64..10_000,
        ) {
            let now = now();
            let mut candidate = listing(&title);
            candidate.attributes.insert("skills".into(), json!(["plumbing", "rust"]));
            if with_provider {
                let mut provider = ProviderMetadata::new(tier);
                provider.average_rating = rating;
                provider.total_reviews = reviews;
                provider.response_rate_percent = rate;
                provider.average_response_time_hours = hours;
                provider.completion_rate_percent = rate;
                provider.total_completed_orders = reviews;
                provider.discount_percent = discount;
                provider.last_active_at = Some(now - Duration::days(days));
                candidate.provider = Some(provider);
            }
            let scores = crate::Ranker::default().score(&candidate, &QueryMatcher::new(&query), now);
            for component in [
                scores.relevance,
                scores.tier,
                scores.rating,
                scores.response_rate,
                scores.completion_rate,
                scores.discount,
                scores.recency,
                scores.total,
            ] {
                prop_assert!((0.0..=1.0).contains(&component), "component {component} out of range");
            }
        }

        #[test]
        fn relevance_stays_bounded(title in "[a-zA-Z ]{0,24}", query in "[a-zA-Z ]{0,12}") {
            let score = relevance_score(&listing(&title), &query);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
