//! Reproducibility scorer
//!
//! A pure, deterministic weighted sum over four evidence factors. Identical
//! inputs always produce identical assessments; the function has no side
//! effects and reads no ambient state.

use flux_core::RunResult;
use serde::{Deserialize, Serialize};

use crate::evidence::LiteratureMatch;

/// Per-factor verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Warn,
}

/// One contributing factor with its rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub name: String,
    pub points: u8,
    pub max_points: u8,
    pub verdict: Verdict,
    pub rationale: String,
}

/// Overall rating bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
    NeedsImprovement,
}

impl Rating {
    fn from_score(score: u8) -> Self {
        match score {
            90..=100 => Self::Excellent,
            75..=89 => Self::Good,
            60..=74 => Self::Fair,
            40..=59 => Self::Poor,
            _ => Self::NeedsImprovement,
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Fair => write!(f, "fair"),
            Self::Poor => write!(f, "poor"),
            Self::NeedsImprovement => write!(f, "needs-improvement"),
        }
    }
}

/// Derived reproducibility assessment; never persisted as authoritative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReproducibilityAssessment {
    /// 0 ..= 100
    pub score: u8,
    pub rating: Rating,
    pub factors: Vec<FactorScore>,
    pub recommendations: Vec<String>,
}

// Factor maxima
const UNCERTAINTY_MAX: u8 = 30;
const LITERATURE_MAX: u8 = 30;
const HISTORY_MAX: u8 = 20;
const COMPLETENESS_MAX: u8 = 20;

/// Score a completed run against literature and historical evidence
pub fn score(
    result: &RunResult,
    literature: &[LiteratureMatch],
    historical: &[RunResult],
) -> ReproducibilityAssessment {
    let mut factors = Vec::with_capacity(4);
    let mut recommendations = Vec::new();

    // Statistical uncertainty
    let relative = result.relative_std();
    let relative_pct = relative * 100.0;
    let uncertainty_points = if relative < 0.001 {
        UNCERTAINTY_MAX
    } else if relative < 0.005 {
        20
    } else {
        10
    };
    factors.push(FactorScore {
        name: "statistical_uncertainty".to_string(),
        points: uncertainty_points,
        max_points: UNCERTAINTY_MAX,
        verdict: if uncertainty_points == UNCERTAINTY_MAX {
            Verdict::Pass
        } else {
            Verdict::Warn
        },
        rationale: format!(
            "Relative keff standard deviation is {:.4}% ({} of {} points)",
            relative_pct, uncertainty_points, UNCERTAINTY_MAX
        ),
    });
    if uncertainty_points < 20 {
        recommendations.push(
            "Increase particle count or active batches to tighten statistical uncertainty"
                .to_string(),
        );
    }

    // Literature validation
    let literature_points = if literature.is_empty() { 0 } else { LITERATURE_MAX };
    factors.push(FactorScore {
        name: "literature_validation".to_string(),
        points: literature_points,
        max_points: LITERATURE_MAX,
        verdict: if literature.is_empty() {
            Verdict::Warn
        } else {
            Verdict::Pass
        },
        rationale: if literature.is_empty() {
            "No matching benchmark found in the literature".to_string()
        } else {
            format!(
                "{} matching benchmark(s), e.g. {}",
                literature.len(),
                literature[0].source
            )
        },
    });
    if literature.is_empty() {
        recommendations
            .push("Validate against a published benchmark before relying on keff".to_string());
    }

    // Historical consistency
    let history_points = if historical.is_empty() { 0 } else { HISTORY_MAX };
    factors.push(FactorScore {
        name: "historical_consistency".to_string(),
        points: history_points,
        max_points: HISTORY_MAX,
        verdict: if historical.is_empty() {
            Verdict::Warn
        } else {
            Verdict::Pass
        },
        rationale: if historical.is_empty() {
            "No similar prior run in the history log".to_string()
        } else {
            format!("{} similar prior run(s) agree with this result", historical.len())
        },
    });
    if historical.is_empty() {
        recommendations
            .push("Re-run the case to establish a reproducibility baseline".to_string());
    }

    // Parameter completeness
    let complete = result.is_complete();
    let completeness_points = if complete { COMPLETENESS_MAX } else { 0 };
    factors.push(FactorScore {
        name: "parameter_completeness".to_string(),
        points: completeness_points,
        max_points: COMPLETENESS_MAX,
        verdict: if complete { Verdict::Pass } else { Verdict::Warn },
        rationale: if complete {
            "All required result fields are present".to_string()
        } else {
            "Result is missing required fields".to_string()
        },
    });
    if !complete {
        recommendations.push("Record the full parameter set alongside the result".to_string());
    }

    let total: u8 = factors.iter().map(|f| f.points).sum();

    ReproducibilityAssessment {
        score: total,
        rating: Rating::from_score(total),
        factors,
        recommendations,
    }
}
