//! Core domain model and search contracts for the Foundry marketplace.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const CRATE_NAME: &str = "foundry-core";

/// Loosely-typed listing attributes as stored by the marketplace.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    People,
    Products,
    Services,
    #[serde(rename = "AI")]
    Ai,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::People, Self::Products, Self::Services, Self::Ai];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::People => "People",
            Self::Products => "Products",
            Self::Services => "Services",
            Self::Ai => "AI",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    Pending,
    Standard,
    Verified,
    Premium,
}

impl ProviderTier {
    pub const ALL: [ProviderTier; 4] = [Self::Pending, Self::Standard, Self::Verified, Self::Premium];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Standard => "standard",
            Self::Verified => "verified",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "provider tier",
                value: s.to_string(),
            })
    }
}

/// Pre-aggregated provider statistics joined onto a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub tier: ProviderTier,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub response_rate_percent: Option<f64>,
    #[serde(default)]
    pub average_response_time_hours: Option<f64>,
    #[serde(default)]
    pub completion_rate_percent: Option<f64>,
    #[serde(default)]
    pub total_completed_orders: u32,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub day_rate: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl ProviderMetadata {
    pub fn new(tier: ProviderTier) -> Self {
        Self {
            tier,
            average_rating: None,
            total_reviews: 0,
            response_rate_percent: None,
            average_response_time_hours: None,
            completion_rate_percent: None,
            total_completed_orders: 0,
            discount_percent: None,
            last_active_at: None,
            day_rate: None,
            currency: None,
        }
    }
}

/// One marketplace listing, optionally joined with its provider's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCandidate {
    pub listing_id: Uuid,
    #[serde(default)]
    pub provider_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provider: Option<ProviderMetadata>,
}

impl SearchCandidate {
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            listing_id: Uuid::new_v4(),
            provider_id: None,
            title: title.into(),
            description: None,
            category,
            subcategory: String::new(),
            attributes: Attributes::new(),
            is_verified: false,
            created_at: None,
            provider: None,
        }
    }

    pub fn tier(&self) -> Option<ProviderTier> {
        self.provider.as_ref().map(|p| p.tier)
    }

    pub fn average_rating(&self) -> Option<f64> {
        self.provider.as_ref().and_then(|p| p.average_rating)
    }

    pub fn total_reviews(&self) -> u32 {
        self.provider.as_ref().map(|p| p.total_reviews).unwrap_or(0)
    }
}

impl AsRef<SearchCandidate> for SearchCandidate {
    fn as_ref(&self) -> &SearchCandidate {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Relevance,
    Price,
    Rating,
    Newest,
    MostReviews,
}

impl FromStr for SortBy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "relevance" => Ok(Self::Relevance),
            "price" => Ok(Self::Price),
            "rating" => Ok(Self::Rating),
            "newest" => Ok(Self::Newest),
            "most_reviews" => Ok(Self::MostReviews),
            _ => Err(UnknownVariant {
                kind: "sort key",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(UnknownVariant {
                kind: "sort order",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillMatchMode {
    #[default]
    Any,
    All,
}

impl SkillMatchMode {
    pub fn is_any(&self) -> bool {
        *self == Self::Any
    }
}

impl FromStr for SkillMatchMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            _ => Err(UnknownVariant {
                kind: "skill match mode",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
}

/// Raw search request as received from a caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchParams {
    pub query: Option<String>,
    pub category: Option<Category>,
    pub subcategories: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub location: Option<String>,
    pub tiers: Vec<ProviderTier>,
    pub available_from: Option<NaiveDate>,
    pub available_to: Option<NaiveDate>,
    pub skills: Vec<String>,
    pub skill_match: Option<SkillMatchMode>,
    pub certifications: Vec<String>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<Uuid>,
}

/// Cleaned filter selection. Empty fields are dropped on serialization so the
/// echo and the persisted history only carry what the user actually set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppliedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcategories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tiers: Vec<ProviderTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<DateRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(skip_serializing_if = "SkillMatchMode::is_any")]
    pub skill_match: SkillMatchMode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certifications: Vec<String>,
}

impl AppliedFilters {
    pub fn from_params(params: &SearchParams) -> Self {
        let price_range = PriceRange {
            min: params.min_price.filter(|v| v.is_finite()),
            max: params.max_price.filter(|v| v.is_finite()),
        };
        let availability = DateRange {
            from: params.available_from,
            to: params.available_to,
        };

        let mut tiers = Vec::new();
        for tier in &params.tiers {
            if !tiers.contains(tier) {
                tiers.push(*tier);
            }
        }

        Self {
            query: non_blank(params.query.as_deref()),
            category: params.category,
            subcategories: clean_terms(&params.subcategories, true),
            price_range: price_range.is_active().then_some(price_range),
            min_rating: params.min_rating.filter(|v| v.is_finite()),
            location: non_blank(params.location.as_deref()),
            tiers,
            availability: (availability.from.is_some() || availability.to.is_some())
                .then_some(availability),
            skills: clean_terms(&params.skills, false),
            skill_match: params.skill_match.unwrap_or_default(),
            certifications: clean_terms(&params.certifications, false),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn clean_terms(terms: &[String], lowercase: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            continue;
        }
        let term = if lowercase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        };
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(&term)) {
            out.push(term);
        }
    }
    out
}

/// Per-candidate ranking components, each in `[0, 1]`, plus their weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreVector {
    pub relevance: f64,
    pub tier: f64,
    pub rating: f64,
    pub response_rate: f64,
    pub completion_rate: f64,
    pub discount: f64,
    pub recency: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub candidate: SearchCandidate,
    pub scores: ScoreVector,
    pub total_score: f64,
}

impl AsRef<SearchCandidate> for SearchResult {
    fn as_ref(&self) -> &SearchCandidate {
        &self.candidate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFacets {
    pub categories: BTreeMap<String, usize>,
    pub subcategories: BTreeMap<String, usize>,
    pub tiers: BTreeMap<String, usize>,
    pub price_ranges: BTreeMap<String, usize>,
    pub ratings: BTreeMap<String, usize>,
    pub locations: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
    pub facets: SearchFacets,
    pub query: Option<String>,
    pub applied_filters: AppliedFilters,
    pub suggestions: Vec<String>,
}

impl SearchResponse {
    /// Well-formed "no results" response echoing the caller's filters.
    pub fn empty(applied_filters: AppliedFilters, page: u32, limit: u32) -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            page,
            limit,
            has_more: false,
            facets: SearchFacets::default(),
            query: applied_filters.query.clone(),
            applied_filters,
            suggestions: Vec::new(),
        }
    }
}

/// Canonical form of a free-text query used for popularity counting and suggestions.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Aggregated popularity of a normalized search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularSearch {
    pub query: String,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_filters_drop_blank_fields() {
        let params = SearchParams {
            query: Some("   ".into()),
            subcategories: vec![" Plumbing ".into(), "plumbing".into(), String::new()],
            location: Some("".into()),
            skills: vec!["Rust".into(), " ".into()],
            tiers: vec![ProviderTier::Verified, ProviderTier::Verified],
            ..Default::default()
        };
        let filters = AppliedFilters::from_params(&params);
        assert_eq!(filters.query, None);
        assert_eq!(filters.subcategories, vec!["plumbing".to_string()]);
        assert_eq!(filters.location, None);
        assert_eq!(filters.skills, vec!["Rust".to_string()]);
        assert_eq!(filters.tiers, vec![ProviderTier::Verified]);
        assert!(filters.price_range.is_none());
        assert!(filters.availability.is_none());
    }

    #[test]
    fn applied_filters_echo_is_compact() {
        let params = SearchParams {
            query: Some(" plumber ".into()),
            min_price: Some(100.0),
            ..Default::default()
        };
        let value = serde_json::to_value(AppliedFilters::from_params(&params)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"query": "plumber", "priceRange": {"min": 100.0}})
        );
    }

    #[test]
    fn empty_params_give_empty_filters() {
        assert!(AppliedFilters::from_params(&SearchParams::default()).is_empty());
    }

    #[test]
    fn normalize_query_collapses_case_and_whitespace() {
        assert_eq!(normalize_query("  Senior   RUST\tDeveloper "), "senior rust developer");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("ai".parse::<Category>().unwrap(), Category::Ai);
        assert_eq!("Premium".parse::<ProviderTier>().unwrap(), ProviderTier::Premium);
        assert_eq!("most-reviews".parse::<SortBy>().unwrap(), SortBy::MostReviews);
        assert!("gold".parse::<ProviderTier>().is_err());
    }

    #[test]
    fn candidate_deserializes_with_defaults() {
        let candidate: SearchCandidate = serde_json::from_value(serde_json::json!({
            "listingId": "7b1d2b4e-9a44-4c59-8f0e-8f4b3c1b2a10",
            "title": "Plumber",
            "category": "Services"
        }))
        .unwrap();
        assert!(candidate.provider.is_none());
        assert!(candidate.attributes.is_empty());
        assert_eq!(candidate.total_reviews(), 0);
    }
}
