//! Simulated Monte Carlo criticality run
//!
//! The "solver" is a deterministic function of the specification fingerprint:
//! identical specifications always produce the identical run id and keff,
//! which is what makes execution dedup observable to callers.

use async_trait::async_trait;
use flux_core::{
    fingerprint, ExecutionResult, FluxError, Result, RunResult, RunSpec, SpecialistKind,
    WorkSpecification,
};
use std::time::{Duration, Instant};

use crate::specialist::{EventSink, Specialist};

/// Cancellation checkpoints per run
const CHECKPOINTS: u32 = 10;

/// Single-run simulation specialist
pub struct SingleRunSpecialist;

impl SingleRunSpecialist {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SingleRunSpecialist {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Specialist for SingleRunSpecialist {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::SingleRun
    }

    async fn execute(
        &self,
        spec: &WorkSpecification,
        events: &EventSink,
    ) -> Result<ExecutionResult> {
        let WorkSpecification::SingleRun(run) = spec else {
            return Err(FluxError::MalformedSpec(
                "single-run specialist requires a single-run specification".to_string(),
            ));
        };

        let result = simulate_run(run, events).await?;
        Ok(ExecutionResult::Run(result))
    }
}

/// Run the simulated solver for one case. Shared with the sweep specialist.
pub(crate) async fn simulate_run(run: &RunSpec, events: &EventSink) -> Result<RunResult> {
    let spec = WorkSpecification::SingleRun(run.clone());
    let fp = fingerprint(&spec)?;
    let run_id = format!("r-{}", fp.short());

    let started = Instant::now();
    events.step_started("initialize-geometry");
    events.step_progress(
        "initialize-geometry",
        format!("{} at {} w/o, {} K", run.geometry, run.enrichment_pct, run.temperature_k),
    );

    events.tool_invoked("transport-solver", serde_json::to_string(run)?);
    events.step_started("transport");

    let batches_per_checkpoint = (run.batches / CHECKPOINTS).max(1);
    let mut batches_done = 0u32;
    while batches_done < run.batches {
        if events.is_cancelled() {
            return Err(FluxError::specialist(
                SpecialistKind::SingleRun.to_string(),
                format!("cancelled after {} of {} batches", batches_done, run.batches),
            ));
        }

        batches_done = (batches_done + batches_per_checkpoint).min(run.batches);
        events.step_progress("transport", format!("batch {}/{}", batches_done, run.batches));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let keff = pseudo_keff(run, &fp);
    let histories = (run.particles as f64) * (run.batches as f64);
    let keff_std = keff * 0.05 / histories.sqrt();

    events.tool_result(
        "transport-solver",
        format!("keff = {:.5} +/- {:.5}", keff, keff_std),
    );

    Ok(RunResult {
        run_id,
        keff,
        keff_std,
        particles: run.particles,
        batches: run.batches,
        runtime_ms: started.elapsed().as_millis() as u64,
    })
}

/// Deterministic stand-in for the solver: smooth in enrichment, negative
/// temperature feedback, plus a fingerprint-seeded jitter within +/- 100 pcm
fn pseudo_keff(run: &RunSpec, fp: &flux_core::Fingerprint) -> f64 {
    let bytes = fp.as_bytes();
    let seed = u64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]);
    let jitter = ((seed % 2001) as f64 - 1000.0) * 1e-6;

    let enrichment_term = 0.09 * (1.0 + run.enrichment_pct).ln();
    let doppler_term = -2.5e-5 * (run.temperature_k - 600.0);

    0.85 + enrichment_term + doppler_term + jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_core::ProgressEventKind;

    fn pin_cell(enrichment: f64) -> RunSpec {
        RunSpec {
            geometry: "pwr-pin-cell".to_string(),
            enrichment_pct: enrichment,
            temperature_k: 600.0,
            particles: 10_000,
            batches: 100,
        }
    }

    #[tokio::test]
    async fn test_identical_specs_yield_identical_run_ids() {
        let (sink, _rx) = EventSink::detached();
        let a = simulate_run(&pin_cell(4.5), &sink).await.unwrap();
        let b = simulate_run(&pin_cell(4.5), &sink).await.unwrap();

        assert_eq!(a.run_id, b.run_id);
        assert_eq!(a.keff, b.keff);
    }

    #[tokio::test]
    async fn test_different_specs_differ() {
        let (sink, _rx) = EventSink::detached();
        let a = simulate_run(&pin_cell(4.5), &sink).await.unwrap();
        let b = simulate_run(&pin_cell(3.2), &sink).await.unwrap();

        assert_ne!(a.run_id, b.run_id);
        assert!(a.keff > b.keff, "higher enrichment should raise keff");
    }

    #[tokio::test]
    async fn test_temperature_feedback_is_negative() {
        let (sink, _rx) = EventSink::detached();
        let cold = simulate_run(&pin_cell(4.5), &sink).await.unwrap();

        let mut hot_spec = pin_cell(4.5);
        hot_spec.temperature_k = 1200.0;
        let hot = simulate_run(&hot_spec, &sink).await.unwrap();

        assert!(hot.keff < cold.keff);
    }

    #[tokio::test]
    async fn test_emits_steps_and_tool_events() {
        let (sink, mut rx) = EventSink::detached();
        let spec = WorkSpecification::SingleRun(pin_cell(4.5));
        let result = SingleRunSpecialist::new().execute(&spec, &sink).await.unwrap();
        assert!(result.as_run().unwrap().is_complete());

        let mut kinds = Vec::new();
        while let Ok(kind) = rx.try_recv() {
            kinds.push(kind);
        }
        assert!(kinds
            .iter()
            .any(|k| matches!(k, ProgressEventKind::StepStarted { step } if step == "transport")));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, ProgressEventKind::ToolInvoked { tool, .. } if tool == "transport-solver")));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, ProgressEventKind::ToolResult { .. })));
    }

    #[tokio::test]
    async fn test_wrong_payload_shape_is_rejected() {
        let (sink, _rx) = EventSink::detached();
        let spec = WorkSpecification::DocumentLookup(flux_core::DocSpec {
            query: "how do tallies work".to_string(),
            top_k: 3,
        });
        assert!(matches!(
            SingleRunSpecialist::new().execute(&spec, &sink).await,
            Err(FluxError::MalformedSpec(_))
        ));
    }
}
