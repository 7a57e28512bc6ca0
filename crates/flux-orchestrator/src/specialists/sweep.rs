//! Parameter sweep specialist
//!
//! Runs the single-run solver once per swept value. Individual case failures
//! are collected rather than aborting the sweep; each failing case gets one
//! retry before it is recorded. The sweep itself fails only when every case
//! fails or the execution is cancelled mid-sweep.

use async_trait::async_trait;
use flux_core::{
    ExecutionResult, FluxError, Result, RunSpec, SpecialistKind, SweepFailure, SweepResult,
    SweepSpec, WorkSpecification,
};
use tracing::warn;

use crate::specialist::{EventSink, Specialist};
use crate::specialists::single_run::simulate_run;

pub struct ParameterSweepSpecialist;

impl ParameterSweepSpecialist {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ParameterSweepSpecialist {
    fn default() -> Self {
        Self::new()
    }
}

fn case_for(base: &RunSpec, parameter: &str, value: f64) -> Result<RunSpec> {
    let mut case = base.clone();
    match parameter {
        "enrichment_pct" => case.enrichment_pct = value,
        "temperature_k" => case.temperature_k = value,
        other => {
            return Err(FluxError::MalformedSpec(format!(
                "unknown sweep parameter: {}",
                other
            )))
        }
    }
    Ok(case)
}

#[async_trait]
impl Specialist for ParameterSweepSpecialist {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::ParameterSweep
    }

    async fn execute(
        &self,
        spec: &WorkSpecification,
        events: &EventSink,
    ) -> Result<ExecutionResult> {
        let WorkSpecification::ParameterSweep(sweep) = spec else {
            return Err(FluxError::MalformedSpec(
                "parameter-sweep specialist requires a sweep specification".to_string(),
            ));
        };

        let result = run_sweep(sweep, events).await?;
        Ok(ExecutionResult::Sweep(result))
    }
}

async fn run_sweep(sweep: &SweepSpec, events: &EventSink) -> Result<SweepResult> {
    events.step_started("sweep");
    events.step_progress(
        "sweep",
        format!("{} over {} values", sweep.parameter, sweep.values.len()),
    );

    let mut runs = Vec::with_capacity(sweep.values.len());
    let mut failures = Vec::new();

    for (index, &value) in sweep.values.iter().enumerate() {
        if events.is_cancelled() {
            return Err(FluxError::specialist(
                SpecialistKind::ParameterSweep.to_string(),
                format!("cancelled after {} of {} cases", index, sweep.values.len()),
            ));
        }

        let case = case_for(&sweep.base, &sweep.parameter, value)?;
        events.step_progress(
            "sweep",
            format!("case {}/{}: {} = {}", index + 1, sweep.values.len(), sweep.parameter, value),
        );

        match run_case(&case, events).await {
            Ok(run) => runs.push(run),
            Err(e) => {
                warn!(parameter = %sweep.parameter, value, "Sweep case failed: {}", e);
                failures.push(SweepFailure {
                    value,
                    error: e.to_string(),
                });
            }
        }
    }

    if runs.is_empty() {
        return Err(FluxError::specialist(
            SpecialistKind::ParameterSweep.to_string(),
            format!("all {} sweep cases failed", sweep.values.len()),
        ));
    }

    Ok(SweepResult {
        parameter: sweep.parameter.clone(),
        runs,
        failures,
    })
}

/// One case with a single retry. Cancellation is not retried.
async fn run_case(case: &RunSpec, events: &EventSink) -> Result<flux_core::RunResult> {
    match simulate_run(case, events).await {
        Ok(run) => Ok(run),
        Err(e) if events.is_cancelled() => Err(e),
        Err(first) => {
            warn!("Retrying sweep case after failure: {}", first);
            simulate_run(case, events).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep_spec(parameter: &str, values: Vec<f64>) -> WorkSpecification {
        WorkSpecification::ParameterSweep(SweepSpec {
            base: RunSpec {
                geometry: "pwr-pin-cell".to_string(),
                enrichment_pct: values.first().copied().unwrap_or(4.5),
                temperature_k: 600.0,
                particles: 10_000,
                batches: 100,
            },
            parameter: parameter.to_string(),
            values,
        })
    }

    #[tokio::test]
    async fn test_sweep_runs_every_value() {
        let (sink, _rx) = EventSink::detached();
        let spec = sweep_spec("enrichment_pct", vec![3.0, 4.0, 5.0]);
        let result = ParameterSweepSpecialist::new()
            .execute(&spec, &sink)
            .await
            .unwrap();

        let ExecutionResult::Sweep(sweep) = result else {
            panic!("expected a sweep result");
        };
        assert_eq!(sweep.runs.len(), 3);
        assert!(sweep.failures.is_empty());
        // monotone in enrichment for this solver
        assert!(sweep.runs[0].keff < sweep.runs[1].keff);
        assert!(sweep.runs[1].keff < sweep.runs[2].keff);
    }

    #[tokio::test]
    async fn test_sweep_case_ids_are_distinct() {
        let (sink, _rx) = EventSink::detached();
        let spec = sweep_spec("temperature_k", vec![565.0, 600.0, 900.0]);
        let result = ParameterSweepSpecialist::new()
            .execute(&spec, &sink)
            .await
            .unwrap();

        let ExecutionResult::Sweep(sweep) = result else {
            panic!("expected a sweep result");
        };
        let mut ids: Vec<&str> = sweep.runs.iter().map(|r| r.run_id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_parameter_is_malformed() {
        let (sink, _rx) = EventSink::detached();
        let spec = sweep_spec("boron_ppm", vec![500.0, 1000.0]);
        assert!(matches!(
            ParameterSweepSpecialist::new().execute(&spec, &sink).await,
            Err(FluxError::MalformedSpec(_))
        ));
    }
}
