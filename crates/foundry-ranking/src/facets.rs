use foundry_core::{ProviderTier, SearchCandidate, SearchFacets};

use crate::attributes::{extract_location, extract_price};

pub const PRICE_BUCKETS: [&str; 5] = ["0-50", "50-100", "100-250", "250-500", "500+"];

pub fn price_bucket(price: f64) -> &'static str {
    match price {
        p if p < 50.0 => PRICE_BUCKETS[0],
        p if p < 100.0 => PRICE_BUCKETS[1],
        p if p < 250.0 => PRICE_BUCKETS[2],
        p if p < 500.0 => PRICE_BUCKETS[3],
        _ => PRICE_BUCKETS[4],
    }
}

/// Facet counts over a filtered (not yet paginated) result set.
///
/// Every candidate lands in exactly one category bucket. Candidates without a
/// provider count as `standard`, matching the tier filter. Candidates with no
/// price, rating or location are left out of those facets.
pub fn calculate_facets<T: AsRef<SearchCandidate>>(items: &[T]) -> SearchFacets {
    let mut facets = SearchFacets::default();

    for item in items {
        let candidate = item.as_ref();

        *facets
            .categories
            .entry(candidate.category.as_str().to_string())
            .or_default() += 1;

        let subcategory = candidate.subcategory.trim();
        if !subcategory.is_empty() {
            *facets.subcategories.entry(subcategory.to_string()).or_default() += 1;
        }

        let tier = candidate.tier().unwrap_or(ProviderTier::Standard);
        *facets.tiers.entry(tier.as_str().to_string()).or_default() += 1;

        if let Some(price) = extract_price(candidate) {
            *facets.price_ranges.entry(price_bucket(price).to_string()).or_default() += 1;
        }

        if let Some(rating) = candidate.average_rating().filter(|r| r.is_finite()) {
            let rounded = rating.round().clamp(0.0, 5.0) as u8;
            *facets.ratings.entry(rounded.to_string()).or_default() += 1;
        }

        if let Some(location) = extract_location(candidate) {
            *facets.locations.entry(location).or_default() += 1;
        }
    }

    facets
}
