//! Specification extraction from free-text queries
//!
//! Turns a routed query into the matched specialist's work payload. Extraction
//! is permissive: missing numeric parameters fall back to defaults, while
//! semantically invalid values (a negative enrichment) are carried through so
//! canonicalization can reject them as malformed.

use regex::Regex;
use std::sync::OnceLock;

use flux_core::{
    CompareSpec, DocSpec, QuerySpec, RunSpec, SpecialistKind, SweepSpec, WorkSpecification,
};

const DEFAULT_GEOMETRY: &str = "pwr-pin-cell";
const DEFAULT_ENRICHMENT_PCT: f64 = 4.5;
const DEFAULT_TEMPERATURE_K: f64 = 600.0;
const DEFAULT_PARTICLES: u64 = 10_000;
const DEFAULT_BATCHES: u32 = 100;
const DEFAULT_QUERY_LIMIT: usize = 20;
const DEFAULT_DOC_TOP_K: usize = 5;

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([-+]?\d+(?:\.\d+)?)\s*%").unwrap())
}

fn temperature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:K\b|kelvin)").unwrap())
}

fn particles_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\d][\d_,]*)\s*particles").unwrap())
}

fn batches_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*batches").unwrap())
}

fn run_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\br-[0-9a-f]{6,}\b").unwrap())
}

/// Build the work specification for a routed query
pub fn build_specification(query: &str, specialist: SpecialistKind) -> WorkSpecification {
    match specialist {
        SpecialistKind::SingleRun => WorkSpecification::SingleRun(run_spec(query)),
        SpecialistKind::ParameterSweep => WorkSpecification::ParameterSweep(sweep_spec(query)),
        SpecialistKind::HistoryQuery => WorkSpecification::HistoryQuery(QuerySpec {
            terms: significant_terms(query),
            limit: DEFAULT_QUERY_LIMIT,
        }),
        SpecialistKind::Comparison => WorkSpecification::Comparison(CompareSpec {
            run_ids: run_ids(query),
            terms: significant_terms(query),
        }),
        SpecialistKind::DocumentCopilot => WorkSpecification::DocumentLookup(DocSpec {
            query: query.trim().to_string(),
            top_k: DEFAULT_DOC_TOP_K,
        }),
    }
}

fn run_spec(query: &str) -> RunSpec {
    RunSpec {
        geometry: geometry(query),
        enrichment_pct: percents(query)
            .first()
            .copied()
            .unwrap_or(DEFAULT_ENRICHMENT_PCT),
        temperature_k: temperatures(query)
            .first()
            .copied()
            .unwrap_or(DEFAULT_TEMPERATURE_K),
        particles: particles(query).unwrap_or(DEFAULT_PARTICLES),
        batches: batches(query).unwrap_or(DEFAULT_BATCHES),
    }
}

fn sweep_spec(query: &str) -> SweepSpec {
    let temps = temperatures(query);
    let pcts = percents(query);

    // Multiple temperature points and a temperature mention wins; otherwise
    // sweep enrichment over the listed percentages
    let lowered = query.to_lowercase();
    let (parameter, values) = if lowered.contains("temperatur") && temps.len() >= 2 {
        ("temperature_k".to_string(), temps.clone())
    } else if pcts.len() >= 2 {
        ("enrichment_pct".to_string(), pcts.clone())
    } else {
        ("enrichment_pct".to_string(), vec![3.0, 4.0, 5.0])
    };

    let mut base = run_spec(query);
    // The swept field of the base spec is a placeholder; pin it to the first
    // value so identical sweeps canonicalize identically
    match parameter.as_str() {
        "temperature_k" => base.temperature_k = values[0],
        _ => base.enrichment_pct = values[0],
    }

    SweepSpec {
        base,
        parameter,
        values,
    }
}

fn geometry(query: &str) -> String {
    let lowered = query.to_lowercase();
    if lowered.contains("assembly") {
        "pwr-assembly".to_string()
    } else if lowered.contains("lattice") {
        "pwr-lattice".to_string()
    } else if lowered.contains("pin cell") || lowered.contains("pin-cell") {
        "pwr-pin-cell".to_string()
    } else {
        DEFAULT_GEOMETRY.to_string()
    }
}

fn percents(query: &str) -> Vec<f64> {
    percent_re()
        .captures_iter(query)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

fn temperatures(query: &str) -> Vec<f64> {
    temperature_re()
        .captures_iter(query)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

fn particles(query: &str) -> Option<u64> {
    particles_re()
        .captures(query)
        .and_then(|c| c[1].replace([',', '_'], "").parse().ok())
}

fn batches(query: &str) -> Option<u32> {
    batches_re().captures(query).and_then(|c| c[1].parse().ok())
}

fn run_ids(query: &str) -> Vec<String> {
    run_id_re()
        .find_iter(query)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "what", "show", "all", "are", "was",
    "were", "did", "does", "have", "has", "had", "about", "run", "runs", "list", "find", "give",
    "recent", "previous", "past", "history", "compare", "versus", "against",
];

fn significant_terms(query: &str) -> Vec<String> {
    // Order-preserving dedup: repeated words anywhere in the query yield one
    // term
    let mut seen = std::collections::HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '.')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_core::canonicalize;

    #[test]
    fn test_single_run_extraction() {
        let spec = build_specification(
            "Simulate a PWR pin cell at 4.5% enrichment with 50000 particles and 200 batches at 900 K",
            SpecialistKind::SingleRun,
        );
        let WorkSpecification::SingleRun(run) = spec else {
            panic!("expected single-run spec");
        };
        assert_eq!(run.geometry, "pwr-pin-cell");
        assert!((run.enrichment_pct - 4.5).abs() < f64::EPSILON);
        assert!((run.temperature_k - 900.0).abs() < f64::EPSILON);
        assert_eq!(run.particles, 50_000);
        assert_eq!(run.batches, 200);
    }

    #[test]
    fn test_single_run_defaults() {
        let spec = build_specification("simulate a pin cell", SpecialistKind::SingleRun);
        let WorkSpecification::SingleRun(run) = spec else {
            panic!("expected single-run spec");
        };
        assert!((run.enrichment_pct - DEFAULT_ENRICHMENT_PCT).abs() < f64::EPSILON);
        assert_eq!(run.particles, DEFAULT_PARTICLES);
        assert_eq!(run.batches, DEFAULT_BATCHES);
    }

    #[test]
    fn test_negative_enrichment_survives_to_validation() {
        // Extraction keeps the bad value; canonicalize is where it dies
        let spec = build_specification(
            "simulate a pin cell at -5% enrichment",
            SpecialistKind::SingleRun,
        );
        assert!(canonicalize(&spec).is_err());
    }

    #[test]
    fn test_enrichment_sweep_extraction() {
        let spec = build_specification(
            "sweep enrichment across 3%, 4% and 5%",
            SpecialistKind::ParameterSweep,
        );
        let WorkSpecification::ParameterSweep(sweep) = spec else {
            panic!("expected sweep spec");
        };
        assert_eq!(sweep.parameter, "enrichment_pct");
        assert_eq!(sweep.values, vec![3.0, 4.0, 5.0]);
        assert!((sweep.base.enrichment_pct - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_temperature_sweep_extraction() {
        let spec = build_specification(
            "scan keff over temperature at 600 K, 900 K and 1200 K",
            SpecialistKind::ParameterSweep,
        );
        let WorkSpecification::ParameterSweep(sweep) = spec else {
            panic!("expected sweep spec");
        };
        assert_eq!(sweep.parameter, "temperature_k");
        assert_eq!(sweep.values, vec![600.0, 900.0, 1200.0]);
    }

    #[test]
    fn test_comparison_run_ids() {
        let spec = build_specification(
            "compare r-1a2b3c4d against r-feedbeef01",
            SpecialistKind::Comparison,
        );
        let WorkSpecification::Comparison(compare) = spec else {
            panic!("expected comparison spec");
        };
        assert_eq!(compare.run_ids, vec!["r-1a2b3c4d", "r-feedbeef01"]);
    }

    #[test]
    fn test_history_terms_filter_stopwords() {
        let spec = build_specification(
            "show all previous runs with high enrichment",
            SpecialistKind::HistoryQuery,
        );
        let WorkSpecification::HistoryQuery(query) = spec else {
            panic!("expected history spec");
        };
        assert!(query.terms.contains(&"enrichment".to_string()));
        assert!(!query.terms.contains(&"show".to_string()));
        assert!(!query.terms.contains(&"all".to_string()));
    }

    #[test]
    fn test_history_terms_deduplicate_nonadjacent_repeats() {
        let spec = build_specification(
            "pwr flux results, pwr enrichment flux",
            SpecialistKind::HistoryQuery,
        );
        let WorkSpecification::HistoryQuery(query) = spec else {
            panic!("expected history spec");
        };
        assert_eq!(
            query.terms,
            vec!["pwr".to_string(), "flux".to_string(), "results".to_string(), "enrichment".to_string()]
        );
    }
}
