//! Intent router: fast keyword scoring with an optional semantic fallback
//!
//! Fast mode is pure and deterministic. Thorough mode consults the external
//! classifier under a hard timeout and falls back to the fast decision on any
//! classifier failure, so routing always returns a decision and never blocks
//! longer than the configured ceiling.

use std::sync::Arc;
use std::time::Duration;

use flux_core::config::RouterConfig;
use flux_core::{RoutingDecision, RoutingMethod, RoutingMode, SpecialistKind};
use tracing::{debug, warn};

use crate::classifier::SemanticClassifier;
use crate::keywords::KeywordTable;

/// Matched terms needed to reach full confidence
const FULL_CONFIDENCE_TERMS: f64 = 4.0;

/// Intent router over an immutable keyword table
pub struct IntentRouter {
    table: KeywordTable,
    classifier: Option<Arc<dyn SemanticClassifier>>,
    confidence_threshold: f64,
    classifier_timeout: Duration,
}

impl IntentRouter {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            table: KeywordTable::from_config(config),
            classifier: None,
            confidence_threshold: config.confidence_threshold,
            classifier_timeout: Duration::from_millis(config.classifier_timeout_ms),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn SemanticClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Route a query to a specialist. Always returns a decision.
    pub async fn route(&self, query: &str, mode: RoutingMode) -> RoutingDecision {
        let fast = self.fast_decision(query);

        let wants_classifier = mode == RoutingMode::Thorough
            || fast.confidence < self.confidence_threshold;

        if !wants_classifier {
            return fast;
        }

        let Some(classifier) = &self.classifier else {
            debug!("No classifier configured, keeping fast decision");
            return fast;
        };

        match tokio::time::timeout(self.classifier_timeout, classifier.classify(query)).await {
            Ok(Ok(classification)) => {
                debug!(
                    "Classifier routed to {} (confidence {:.2})",
                    classification.specialist, classification.confidence
                );
                RoutingDecision {
                    specialist: classification.specialist,
                    intent_label: intent_label(classification.specialist),
                    confidence: classification.confidence,
                    method: RoutingMethod::Semantic,
                }
            }
            Ok(Err(e)) => {
                warn!("Classifier failed, falling back to fast decision: {}", e);
                fast
            }
            Err(_) => {
                warn!(
                    "Classifier timed out after {:?}, falling back to fast decision",
                    self.classifier_timeout
                );
                fast
            }
        }
    }

    /// Pure keyword decision. A query matching nothing routes to the default
    /// specialist instead of failing.
    pub fn fast_decision(&self, query: &str) -> RoutingDecision {
        match self.table.best(query) {
            Some(best) => RoutingDecision {
                specialist: best.specialist,
                intent_label: intent_label(best.specialist),
                confidence: confidence_from_matches(best.matched.len()),
                method: RoutingMethod::Keyword,
            },
            None => RoutingDecision {
                specialist: SpecialistKind::fallback(),
                intent_label: intent_label(SpecialistKind::fallback()),
                confidence: 0.0,
                method: RoutingMethod::Fallback,
            },
        }
    }
}

/// Confidence grows with the count of distinct matched terms, capped at 1.0
fn confidence_from_matches(matched: usize) -> f64 {
    (matched as f64 / FULL_CONFIDENCE_TERMS).min(1.0)
}

fn intent_label(specialist: SpecialistKind) -> String {
    match specialist {
        SpecialistKind::SingleRun => "run-simulation",
        SpecialistKind::ParameterSweep => "sweep-parameters",
        SpecialistKind::HistoryQuery => "query-history",
        SpecialistKind::Comparison => "compare-results",
        SpecialistKind::DocumentCopilot => "lookup-documents",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::StaticClassifier;

    fn router() -> IntentRouter {
        IntentRouter::new(&RouterConfig::default())
    }

    #[tokio::test]
    async fn test_fast_route_simulation_query() {
        let decision = router()
            .route("Simulate a PWR pin cell at 4.5% enrichment", RoutingMode::Fast)
            .await;
        assert_eq!(decision.specialist, SpecialistKind::SingleRun);
        assert_eq!(decision.method, RoutingMethod::Keyword);
        // Two matched terms out of four
        assert!((decision.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unmatched_query_routes_to_default() {
        let decision = router().route("hello there", RoutingMode::Fast).await;
        assert_eq!(decision.specialist, SpecialistKind::HistoryQuery);
        assert_eq!(decision.method, RoutingMethod::Fallback);
        assert_eq!(decision.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_thorough_mode_uses_classifier() {
        let router = router().with_classifier(Arc::new(StaticClassifier::answering(
            SpecialistKind::DocumentCopilot,
            0.92,
        )));
        let decision = router
            .route("Simulate a PWR pin cell at 4.5% enrichment", RoutingMode::Thorough)
            .await;
        assert_eq!(decision.specialist, SpecialistKind::DocumentCopilot);
        assert_eq!(decision.method, RoutingMethod::Semantic);
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back() {
        let router = router().with_classifier(Arc::new(StaticClassifier::failing()));
        let decision = router
            .route("Simulate a PWR pin cell at 4.5% enrichment", RoutingMode::Thorough)
            .await;
        assert_eq!(decision.specialist, SpecialistKind::SingleRun);
        assert_eq!(decision.method, RoutingMethod::Keyword);
    }

    #[tokio::test]
    async fn test_classifier_timeout_falls_back() {
        let config = RouterConfig {
            classifier_timeout_ms: 20,
            ..RouterConfig::default()
        };
        let router = IntentRouter::new(&config).with_classifier(Arc::new(
            StaticClassifier::answering(SpecialistKind::Comparison, 0.99).with_delay_ms(500),
        ));

        let start = std::time::Instant::now();
        let decision = router
            .route("simulate keff for a pin cell", RoutingMode::Thorough)
            .await;
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(decision.specialist, SpecialistKind::SingleRun);
        assert_eq!(decision.method, RoutingMethod::Keyword);
    }

    #[tokio::test]
    async fn test_low_confidence_fast_mode_consults_classifier() {
        // One matched term -> 0.25, below the 0.5 threshold
        let router = router().with_classifier(Arc::new(StaticClassifier::answering(
            SpecialistKind::ParameterSweep,
            0.8,
        )));
        let decision = router.route("what about keff", RoutingMode::Fast).await;
        assert_eq!(decision.specialist, SpecialistKind::ParameterSweep);
        assert_eq!(decision.method, RoutingMethod::Semantic);
    }
}
