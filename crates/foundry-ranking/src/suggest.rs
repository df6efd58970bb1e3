use foundry_core::{normalize_query, PopularSearch};
use strsim::jaro_winkler;

const SIMILARITY_THRESHOLD: f64 = 0.82;

/// Popular queries close to `query`, most popular first.
pub fn suggest_queries(query: &str, popular: &[PopularSearch], limit: usize) -> Vec<String> {
    let query = normalize_query(query);
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&PopularSearch, f64)> = popular
        .iter()
        .filter_map(|entry| {
            let candidate = normalize_query(&entry.query);
            if candidate.is_empty() || candidate == query {
                return None;
            }
            let similarity = jaro_winkler(&query, &candidate);
            let related = candidate.contains(&query) || query.contains(&candidate);
            (related || similarity >= SIMILARITY_THRESHOLD).then_some((entry, similarity))
        })
        .collect();

    scored.sort_by(|(a, sim_a), (b, sim_b)| {
        b.count
            .cmp(&a.count)
            .then_with(|| sim_b.total_cmp(sim_a))
            .then_with(|| a.query.cmp(&b.query))
    });

    let mut out: Vec<String> = Vec::with_capacity(limit);
    for (entry, _) in scored {
        let normalized = normalize_query(&entry.query);
        if !out.contains(&normalized) {
            out.push(normalized);
        }
        if out.len() == limit {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn popular(query: &str, count: u64) -> PopularSearch {
        PopularSearch {
            query: query.to_string(),
            count,
        }
    }

    #[test]
    fn suggests_related_queries_by_popularity() {
        let entries = vec![
            popular("plumber", 40),
            popular("emergency plumber", 12),
            popular("plumbers leeds", 30),
            popular("web designer", 90),
            popular("Plumber", 5),
        ];
        let suggestions = suggest_queries("plumber", &entries, 5);
        assert_eq!(suggestions, vec!["plumbers leeds", "emergency plumber"]);
    }

    #[test]
    fn tolerates_typos() {
        let entries = vec![popular("electrician", 10)];
        assert_eq!(suggest_queries("electrcian", &entries, 3), vec!["electrician"]);
    }

    #[test]
    fn empty_query_or_zero_limit_gives_nothing() {
        let entries = vec![popular("plumber", 1)];
        assert!(suggest_queries("  ", &entries, 5).is_empty());
        assert!(suggest_queries("plumb", &entries, 0).is_empty());
    }

    #[test]
    fn respects_limit() {
        let entries = vec![popular("plumber a", 3), popular("plumber b", 2), popular("plumber c", 1)];
        assert_eq!(suggest_queries("plumber", &entries, 2), vec!["plumber a", "plumber b"]);
    }
}
