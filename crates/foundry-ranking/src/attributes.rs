//! Typed accessors over the loosely-typed listing attribute map.
//!
//! Listings store price, location, skills and certifications under a handful
//! of synonym keys. Each accessor tries its keys in order so scoring and
//! filtering never have to know the individual field names.

use std::sync::LazyLock;

use foundry_core::{Attributes, SearchCandidate};
use regex::Regex;
use serde_json::Value;

pub const PRICE_KEYS: &[&str] = &["rate", "price", "day_rate", "hourly_rate", "cost", "cost_value"];

pub const LOCATION_KEYS: &[&str] = &[
    "location",
    "city",
    "region",
    "country",
    "based_in",
    "base_location",
    "service_area",
];

pub const SKILL_KEYS: &[&str] = &[
    "skills",
    "expertise",
    "capabilities",
    "specializations",
    "technologies",
];

pub const CERTIFICATION_KEYS: &[&str] = &[
    "certifications",
    "certificates",
    "qualifications",
    "accreditations",
    "licenses",
];

/// Array-valued fields that count at full weight in text relevance.
pub const RELEVANCE_KEYS: &[&str] = &[
    "skills",
    "expertise",
    "capabilities",
    "tags",
    "specializations",
    "industries",
    "technologies",
];

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("number pattern is valid"));

/// First number embedded in free text, e.g. `"£1,500/day"` -> `1500.0`.
pub fn first_number(text: &str) -> Option<f64> {
    let found = NUMBER_RE.find(text)?;
    let cleaned = found.as_str().replace(',', "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => first_number(s),
        _ => None,
    }
}

/// Listing price: the provider day rate wins, then the attribute synonyms.
pub fn extract_price(candidate: &SearchCandidate) -> Option<f64> {
    if let Some(rate) = candidate
        .provider
        .as_ref()
        .and_then(|p| p.day_rate)
        .filter(|v| v.is_finite())
    {
        return Some(rate);
    }
    PRICE_KEYS
        .iter()
        .filter_map(|key| candidate.attributes.get(*key))
        .find_map(value_as_number)
}

pub fn extract_location(candidate: &SearchCandidate) -> Option<String> {
    LOCATION_KEYS
        .iter()
        .filter_map(|key| candidate.attributes.get(*key))
        .find_map(|value| match value {
            Value::String(s) => non_empty(s),
            Value::Array(items) => items.iter().filter_map(Value::as_str).find_map(non_empty),
            _ => None,
        })
}

pub fn extract_skills(candidate: &SearchCandidate) -> Vec<String> {
    collect_terms(&candidate.attributes, SKILL_KEYS)
}

pub fn extract_certifications(candidate: &SearchCandidate) -> Vec<String> {
    collect_terms(&candidate.attributes, CERTIFICATION_KEYS)
}

/// Lowercased elements of the array-valued relevance fields.
pub fn relevance_terms(attributes: &Attributes) -> Vec<String> {
    RELEVANCE_KEYS
        .iter()
        .filter_map(|key| attributes.get(*key))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_lowercase)
        .collect()
}

/// Lowercased values of every string-valued attribute.
pub fn string_values(attributes: &Attributes) -> Vec<String> {
    attributes
        .values()
        .filter_map(Value::as_str)
        .map(str::to_lowercase)
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn collect_terms(attributes: &Attributes, keys: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in keys.iter().filter_map(|key| attributes.get(*key)) {
        let terms: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(Value::as_str).filter_map(non_empty).collect(),
            Value::String(s) => s.split(',').filter_map(non_empty).collect(),
            _ => Vec::new(),
        };
        for term in terms {
            if !out.iter().any(|seen| seen.eq_ignore_ascii_case(&term)) {
                out.push(term);
            }
        }
    }
    out
}
