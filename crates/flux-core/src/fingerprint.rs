//! Canonical serialization and content hashing of work specifications
//!
//! Two semantically identical specifications must hash identically regardless
//! of how they were constructed, so canonical bytes are produced by writing
//! fields in a fixed order with normalized numeric formatting. The digest is
//! the dedup/cache key for the execution tracker.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{FluxError, Result};
use crate::types::{CompareSpec, DocSpec, QuerySpec, RunSpec, SweepSpec, WorkSpecification};

/// 256-bit digest of a canonicalized work specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, for log lines and run ids
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("fingerprint must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Deterministic byte serialization of a specification.
///
/// Fails with [`FluxError::MalformedSpec`] when required fields are absent or
/// semantically invalid (zero particle counts, enrichment outside (0, 100],
/// a comparison with neither run ids nor search terms).
pub fn canonicalize(spec: &WorkSpecification) -> Result<Vec<u8>> {
    let mut out = String::new();

    match spec {
        WorkSpecification::SingleRun(run) => {
            validate_run(run)?;
            out.push_str("single_run");
            write_run(&mut out, run);
        }
        WorkSpecification::ParameterSweep(sweep) => {
            validate_sweep(sweep)?;
            out.push_str("parameter_sweep");
            write_run(&mut out, &sweep.base);
            push_field(&mut out, "parameter", &sweep.parameter.to_lowercase());
            let values: Vec<String> = sweep.values.iter().map(|v| fmt_f64(*v)).collect();
            push_field(&mut out, "values", &values.join(","));
        }
        WorkSpecification::HistoryQuery(query) => {
            validate_query(query)?;
            out.push_str("history_query");
            // Term order is not significant for a search
            let mut terms: Vec<String> = query.terms.iter().map(|t| t.to_lowercase()).collect();
            terms.sort();
            terms.dedup();
            push_field(&mut out, "terms", &terms.join(","));
            push_field(&mut out, "limit", &query.limit.to_string());
        }
        WorkSpecification::Comparison(compare) => {
            validate_compare(compare)?;
            out.push_str("comparison");
            let mut run_ids = compare.run_ids.clone();
            run_ids.sort();
            run_ids.dedup();
            push_field(&mut out, "run_ids", &run_ids.join(","));
            let mut terms: Vec<String> = compare.terms.iter().map(|t| t.to_lowercase()).collect();
            terms.sort();
            terms.dedup();
            push_field(&mut out, "terms", &terms.join(","));
        }
        WorkSpecification::DocumentLookup(doc) => {
            validate_doc(doc)?;
            out.push_str("document_lookup");
            push_field(&mut out, "query", doc.query.trim().to_lowercase().as_str());
            push_field(&mut out, "top_k", &doc.top_k.to_string());
        }
    }

    Ok(out.into_bytes())
}

/// Pure hash over canonical bytes
pub fn fingerprint(spec: &WorkSpecification) -> Result<Fingerprint> {
    let bytes = canonicalize(spec)?;
    let digest = Sha256::digest(&bytes);
    Ok(Fingerprint(digest.into()))
}

fn write_run(out: &mut String, run: &RunSpec) {
    push_field(out, "geometry", &run.geometry.trim().to_lowercase());
    push_field(out, "enrichment_pct", &fmt_f64(run.enrichment_pct));
    push_field(out, "temperature_k", &fmt_f64(run.temperature_k));
    push_field(out, "particles", &run.particles.to_string());
    push_field(out, "batches", &run.batches.to_string());
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push('|');
    out.push_str(name);
    out.push('=');
    out.push_str(value);
}

/// Normalized float formatting: shortest round-trip representation, so
/// `4.5`, `4.50`, and `4.500` all canonicalize to "4.5".
fn fmt_f64(value: f64) -> String {
    format!("{}", value)
}

fn validate_run(run: &RunSpec) -> Result<()> {
    if run.geometry.trim().is_empty() {
        return Err(FluxError::MalformedSpec("geometry must be set".to_string()));
    }
    if !run.enrichment_pct.is_finite() || run.enrichment_pct <= 0.0 || run.enrichment_pct > 100.0 {
        return Err(FluxError::MalformedSpec(format!(
            "enrichment must be in (0, 100] weight percent, got {}",
            run.enrichment_pct
        )));
    }
    if !run.temperature_k.is_finite() || run.temperature_k <= 0.0 {
        return Err(FluxError::MalformedSpec(format!(
            "temperature must be positive Kelvin, got {}",
            run.temperature_k
        )));
    }
    if run.particles == 0 {
        return Err(FluxError::MalformedSpec(
            "particle count must be positive".to_string(),
        ));
    }
    if run.batches == 0 {
        return Err(FluxError::MalformedSpec(
            "batch count must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_sweep(sweep: &SweepSpec) -> Result<()> {
    validate_run(&sweep.base)?;
    match sweep.parameter.to_lowercase().as_str() {
        "enrichment_pct" | "temperature_k" => {}
        other => {
            return Err(FluxError::MalformedSpec(format!(
                "unknown sweep parameter: {}",
                other
            )))
        }
    }
    if sweep.values.is_empty() {
        return Err(FluxError::MalformedSpec(
            "sweep requires at least one value".to_string(),
        ));
    }
    if sweep.values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(FluxError::MalformedSpec(
            "sweep values must be positive and finite".to_string(),
        ));
    }
    Ok(())
}

fn validate_query(query: &QuerySpec) -> Result<()> {
    // An empty term list is a valid "latest records" query
    if query.limit == 0 {
        return Err(FluxError::MalformedSpec(
            "history query limit must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_compare(compare: &CompareSpec) -> Result<()> {
    if compare.run_ids.is_empty() && compare.terms.iter().all(|t| t.trim().is_empty()) {
        return Err(FluxError::MalformedSpec(
            "comparison requires run ids or search terms".to_string(),
        ));
    }
    Ok(())
}

fn validate_doc(doc: &DocSpec) -> Result<()> {
    if doc.query.trim().is_empty() {
        return Err(FluxError::MalformedSpec(
            "document lookup requires a query".to_string(),
        ));
    }
    if doc.top_k == 0 {
        return Err(FluxError::MalformedSpec(
            "document lookup top_k must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin_cell(enrichment: f64) -> WorkSpecification {
        WorkSpecification::SingleRun(RunSpec {
            geometry: "pwr-pin-cell".to_string(),
            enrichment_pct: enrichment,
            temperature_k: 600.0,
            particles: 10_000,
            batches: 100,
        })
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&pin_cell(4.5)).unwrap();
        let b = fingerprint(&pin_cell(4.5)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn test_fingerprint_normalizes_float_formatting() {
        // 4.5 and 4.50 are the same f64; construction differences must not
        // leak into the digest
        let a = fingerprint(&pin_cell(4.5)).unwrap();
        let b = fingerprint(&pin_cell(4.50)).unwrap();
        let c = fingerprint(&pin_cell(4.500000)).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_fingerprint_distinguishes_specs() {
        let a = fingerprint(&pin_cell(4.5)).unwrap();
        let b = fingerprint(&pin_cell(3.2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_query_term_order_is_insignificant() {
        let a = WorkSpecification::HistoryQuery(QuerySpec {
            terms: vec!["pwr".to_string(), "Enrichment".to_string()],
            limit: 10,
        });
        let b = WorkSpecification::HistoryQuery(QuerySpec {
            terms: vec!["enrichment".to_string(), "PWR".to_string()],
            limit: 10,
        });
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_negative_enrichment_is_malformed() {
        let err = canonicalize(&pin_cell(-5.0)).unwrap_err();
        assert!(matches!(err, FluxError::MalformedSpec(_)));
    }

    #[test]
    fn test_zero_particles_is_malformed() {
        let spec = WorkSpecification::SingleRun(RunSpec {
            geometry: "pwr-pin-cell".to_string(),
            enrichment_pct: 4.5,
            temperature_k: 600.0,
            particles: 0,
            batches: 100,
        });
        assert!(matches!(
            canonicalize(&spec),
            Err(FluxError::MalformedSpec(_))
        ));
    }

    #[test]
    fn test_unknown_sweep_parameter_is_malformed() {
        let spec = WorkSpecification::ParameterSweep(SweepSpec {
            base: RunSpec {
                geometry: "pwr-pin-cell".to_string(),
                enrichment_pct: 4.5,
                temperature_k: 600.0,
                particles: 10_000,
                batches: 100,
            },
            parameter: "moderator_density".to_string(),
            values: vec![1.0, 2.0],
        });
        assert!(matches!(
            canonicalize(&spec),
            Err(FluxError::MalformedSpec(_))
        ));
    }

    #[test]
    fn test_fingerprint_serde_round_trip() {
        let fp = fingerprint(&pin_cell(4.5)).unwrap();
        let json = serde_json::to_string(&fp).unwrap();
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, back);
    }
}
