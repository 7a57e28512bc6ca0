//! Deterministic keyword scoring over the configured vocabulary
//!
//! Scoring is a pure function of the query text and the immutable keyword
//! table: sum of weights of distinct matched terms, case-insensitive
//! substring match, ties broken by specialist priority.

use flux_core::config::RouterConfig;
use flux_core::SpecialistKind;

/// Immutable per-specialist vocabulary, lowercased at construction
#[derive(Debug, Clone)]
pub struct KeywordTable {
    sets: Vec<(SpecialistKind, Vec<(String, u32)>)>,
}

/// Score of one specialist against one query
#[derive(Debug, Clone)]
pub struct SpecialistScore {
    pub specialist: SpecialistKind,
    /// Sum of weights of distinct matched terms
    pub score: u32,
    /// The distinct terms that matched
    pub matched: Vec<String>,
}

impl KeywordTable {
    pub fn from_config(config: &RouterConfig) -> Self {
        let sets = config
            .keywords
            .iter()
            .map(|set| {
                let terms = set
                    .terms
                    .iter()
                    .map(|t| (t.term.to_lowercase(), t.weight))
                    .collect();
                (set.specialist, terms)
            })
            .collect();
        Self { sets }
    }

    /// Score every specialist against the query
    pub fn score_all(&self, query: &str) -> Vec<SpecialistScore> {
        let haystack = query.to_lowercase();

        self.sets
            .iter()
            .map(|(specialist, terms)| {
                let mut matched = Vec::new();
                let mut score = 0u32;
                for (term, weight) in terms {
                    if haystack.contains(term.as_str()) && !matched.contains(term) {
                        matched.push(term.clone());
                        score += weight;
                    }
                }
                SpecialistScore {
                    specialist: *specialist,
                    score,
                    matched,
                }
            })
            .collect()
    }

    /// The winning specialist, or `None` when nothing matched anywhere.
    /// Ties go to the higher-priority (more specific) specialist.
    pub fn best(&self, query: &str) -> Option<SpecialistScore> {
        self.score_all(query)
            .into_iter()
            .filter(|s| s.score > 0)
            .max_by(|a, b| {
                a.score
                    .cmp(&b.score)
                    // lower priority value wins the tie, so compare reversed
                    .then(b.specialist.priority().cmp(&a.specialist.priority()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> KeywordTable {
        KeywordTable::from_config(&RouterConfig::default())
    }

    #[test]
    fn test_simulation_query_matches_single_run() {
        let best = table()
            .best("Simulate a PWR pin cell at 4.5% enrichment")
            .unwrap();
        assert_eq!(best.specialist, SpecialistKind::SingleRun);
        // Exactly "simulate" and "enrichment" from the default vocabulary
        assert_eq!(best.matched.len(), 2);
        assert!(best.matched.contains(&"simulate".to_string()));
        assert!(best.matched.contains(&"enrichment".to_string()));
    }

    #[test]
    fn test_comparison_outranks_general_on_tie() {
        // "compare" (weight 2) vs "simulate" (weight 2): scores tie, the more
        // specific comparison specialist must win
        let best = table().best("compare with a simulated baseline").unwrap();
        assert_eq!(best.specialist, SpecialistKind::Comparison);
    }

    #[test]
    fn test_no_match_returns_none() {
        assert!(table().best("hello there").is_none());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let best = table().best("SWEEP enrichment ACROSS a range").unwrap();
        assert_eq!(best.specialist, SpecialistKind::ParameterSweep);
        assert_eq!(best.matched.len(), 3);
    }

    #[test]
    fn test_duplicate_terms_counted_once() {
        let best = table().best("sweep sweep sweep").unwrap();
        assert_eq!(best.matched.len(), 1);
        assert_eq!(best.score, 2);
    }
}
