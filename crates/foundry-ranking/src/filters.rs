//! Predicate filters over search candidates.
//!
//! Each filter takes ownership of the survivors of the previous step and
//! returns the subset that passes. They work on anything that exposes a
//! [`SearchCandidate`], so the same pipeline runs over raw candidates and
//! scored results.

use foundry_core::{
    AppliedFilters, Category, DateRange, PriceRange, ProviderTier, SearchCandidate, SkillMatchMode,
};

use crate::attributes::{extract_certifications, extract_location, extract_price, extract_skills};

/// Regions and the place names that should match them.
const LOCATION_ALIASES: &[(&str, &[&str])] = &[
    (
        "uk",
        &["united kingdom", "great britain", "britain", "england", "scotland", "wales", "northern ireland"],
    ),
    (
        "united kingdom",
        &["uk", "great britain", "britain", "england", "scotland", "wales", "northern ireland"],
    ),
    ("great britain", &["uk", "united kingdom", "britain", "england", "scotland", "wales"]),
    ("britain", &["uk", "united kingdom", "great britain", "england", "scotland", "wales"]),
    ("england", &["uk", "united kingdom", "britain", "great britain"]),
    ("scotland", &["uk", "united kingdom", "britain", "great britain"]),
    ("wales", &["uk", "united kingdom", "britain", "great britain"]),
    ("london", &["uk", "united kingdom", "england"]),
    ("manchester", &["uk", "united kingdom", "england"]),
    ("birmingham", &["uk", "united kingdom", "england"]),
    ("leeds", &["uk", "united kingdom", "england"]),
    ("bristol", &["uk", "united kingdom", "england"]),
    ("edinburgh", &["uk", "united kingdom", "scotland"]),
    ("glasgow", &["uk", "united kingdom", "scotland"]),
    ("cardiff", &["uk", "united kingdom", "wales"]),
    ("us", &["usa", "united states", "america"]),
    ("usa", &["us", "united states", "america"]),
    ("united states", &["us", "usa", "america"]),
    ("new york", &["us", "usa", "united states"]),
    ("remote", &["anywhere", "worldwide", "global"]),
];

pub fn normalize_location(location: &str) -> String {
    location
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn aliases_of(location: &str) -> &'static [&'static str] {
    LOCATION_ALIASES
        .iter()
        .find(|(name, _)| *name == location)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Whether a candidate location satisfies a requested one. Both sides are
/// normalized before comparison.
pub fn locations_match(requested: &str, candidate: &str) -> bool {
    let requested = normalize_location(requested);
    let candidate = normalize_location(candidate);
    if requested.is_empty() || candidate.is_empty() {
        return false;
    }
    requested == candidate
        || candidate.contains(&requested)
        || requested.contains(&candidate)
        || aliases_of(&requested).contains(&candidate.as_str())
        || aliases_of(&candidate).contains(&requested.as_str())
}

fn terms_match(requested: &str, offered: &str) -> bool {
    let requested = requested.to_lowercase();
    let offered = offered.to_lowercase();
    offered.contains(&requested) || requested.contains(&offered)
}

pub fn filter_by_category<T: AsRef<SearchCandidate>>(items: Vec<T>, category: Category) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| item.as_ref().category == category)
        .collect()
}

/// OR-match against a set the caller has already lowercased.
pub fn filter_by_subcategories<T: AsRef<SearchCandidate>>(items: Vec<T>, subcategories: &[String]) -> Vec<T> {
    if subcategories.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            let subcategory = item.as_ref().subcategory.trim().to_lowercase();
            subcategories.iter().any(|s| *s == subcategory)
        })
        .collect()
}

/// Unpriced candidates survive only when no bound is set.
pub fn filter_by_price<T: AsRef<SearchCandidate>>(items: Vec<T>, range: &PriceRange) -> Vec<T> {
    if !range.is_active() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| match extract_price(item.as_ref()) {
            Some(price) => {
                range.min.map_or(true, |min| price >= min) && range.max.map_or(true, |max| price <= max)
            }
            None => false,
        })
        .collect()
}

/// Unrated candidates survive only a non-restrictive floor.
pub fn filter_by_rating<T: AsRef<SearchCandidate>>(items: Vec<T>, min_rating: f64) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| match item.as_ref().average_rating() {
            Some(rating) => rating >= min_rating,
            None => min_rating <= 0.0,
        })
        .collect()
}

pub fn filter_by_location<T: AsRef<SearchCandidate>>(items: Vec<T>, location: &str) -> Vec<T> {
    if normalize_location(location).is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            extract_location(item.as_ref())
                .is_some_and(|candidate_location| locations_match(location, &candidate_location))
        })
        .collect()
}

/// Candidates without a provider are treated as `standard`.
pub fn filter_by_tiers<T: AsRef<SearchCandidate>>(items: Vec<T>, tiers: &[ProviderTier]) -> Vec<T> {
    if tiers.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| match item.as_ref().tier() {
            Some(tier) => tiers.contains(&tier),
            None => tiers.contains(&ProviderTier::Standard),
        })
        .collect()
}

/// Pass-through: listings carry no availability calendar yet, so every
/// candidate is kept until an availability source is joined in.
pub fn filter_by_availability<T: AsRef<SearchCandidate>>(items: Vec<T>, _range: &DateRange) -> Vec<T> {
    items
}

pub fn filter_by_skills<T: AsRef<SearchCandidate>>(
    items: Vec<T>,
    skills: &[String],
    mode: SkillMatchMode,
) -> Vec<T> {
    if skills.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            let offered = extract_skills(item.as_ref());
            let has = |wanted: &String| offered.iter().any(|o| terms_match(wanted, o));
            match mode {
                SkillMatchMode::Any => skills.iter().any(has),
                SkillMatchMode::All => skills.iter().all(has),
            }
        })
        .collect()
}

pub fn filter_by_certifications<T: AsRef<SearchCandidate>>(items: Vec<T>, certifications: &[String]) -> Vec<T> {
    if certifications.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            let held = extract_certifications(item.as_ref());
            certifications
                .iter()
                .any(|wanted| held.iter().any(|h| terms_match(wanted, h)))
        })
        .collect()
}

/// Runs every filter whose parameter is present, in pipeline order.
pub fn apply_filters<T: AsRef<SearchCandidate>>(items: Vec<T>, filters: &AppliedFilters) -> Vec<T> {
    let mut items = items;
    if let Some(category) = filters.category {
        items = filter_by_category(items, category);
    }
    if !filters.subcategories.is_empty() {
        items = filter_by_subcategories(items, &filters.subcategories);
    }
    if let Some(range) = &filters.price_range {
        items = filter_by_price(items, range);
    }
    if let Some(min_rating) = filters.min_rating {
        items = filter_by_rating(items, min_rating);
    }
    if let Some(location) = &filters.location {
        items = filter_by_location(items, location);
    }
    if !filters.tiers.is_empty() {
        items = filter_by_tiers(items, &filters.tiers);
    }
    if let Some(range) = &filters.availability {
        items = filter_by_availability(items, range);
    }
    if !filters.skills.is_empty() {
        items = filter_by_skills(items, &filters.skills, filters.skill_match);
    }
    if !filters.certifications.is_empty() {
        items = filter_by_certifications(items, &filters.certifications);
    }
    items
}
