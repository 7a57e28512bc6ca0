//! Result comparison specialist
//!
//! Resolves at least two prior runs (by explicit run id, falling back to a
//! term search over the log) and reports the largest pairwise keff spread in
//! pcm. Fewer than two resolvable runs is a specialist failure, not an empty
//! result, so callers can tell "nothing to compare" from "they agree".

use std::sync::Arc;

use async_trait::async_trait;
use flux_core::{
    ComparisonEntry, ComparisonResult, ExecutionResult, FluxError, Result, RunResult,
    SpecialistKind, WorkSpecification,
};

use crate::history::HistoryStore;
use crate::specialist::{EventSink, Specialist};

const PCM_PER_UNIT_KEFF: f64 = 1e5;

pub struct ComparisonSpecialist {
    store: Arc<HistoryStore>,
}

impl ComparisonSpecialist {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    async fn resolve_runs(
        &self,
        run_ids: &[String],
        terms: &[String],
        events: &EventSink,
    ) -> Result<Vec<RunResult>> {
        let mut runs = Vec::new();

        if !run_ids.is_empty() {
            for run_id in run_ids {
                events.tool_invoked("history-log", run_id.clone());
                match self.store.find_run(run_id).await? {
                    Some(run) => runs.push(run),
                    None => events.tool_result("history-log", format!("{} not found", run_id)),
                }
            }
            return Ok(runs);
        }

        events.tool_invoked("history-log", terms.join(" "));
        for record in self.store.search(terms, 10).await? {
            match record.result {
                ExecutionResult::Run(run) => runs.push(run),
                ExecutionResult::Sweep(sweep) => runs.extend(sweep.runs),
                _ => {}
            }
        }
        Ok(runs)
    }
}

#[async_trait]
impl Specialist for ComparisonSpecialist {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::Comparison
    }

    async fn execute(
        &self,
        spec: &WorkSpecification,
        events: &EventSink,
    ) -> Result<ExecutionResult> {
        let WorkSpecification::Comparison(compare) = spec else {
            return Err(FluxError::MalformedSpec(
                "comparison specialist requires a comparison specification".to_string(),
            ));
        };

        events.step_started("resolve-runs");
        let runs = self
            .resolve_runs(&compare.run_ids, &compare.terms, events)
            .await?;

        if runs.len() < 2 {
            return Err(FluxError::specialist(
                SpecialistKind::Comparison.to_string(),
                format!("need at least two runs to compare, resolved {}", runs.len()),
            ));
        }

        events.step_started("compare");
        let entries: Vec<ComparisonEntry> = runs
            .iter()
            .map(|run| ComparisonEntry {
                run_id: run.run_id.clone(),
                keff: run.keff,
                keff_std: run.keff_std,
            })
            .collect();

        let max = runs.iter().map(|r| r.keff).fold(f64::MIN, f64::max);
        let min = runs.iter().map(|r| r.keff).fold(f64::MAX, f64::min);
        let max_delta_pcm = (max - min) * PCM_PER_UNIT_KEFF;

        let summary = format!(
            "{} runs compared, keff spread {:.1} pcm ({:.5} to {:.5})",
            entries.len(),
            max_delta_pcm,
            min,
            max
        );
        events.step_progress("compare", summary.clone());

        Ok(ExecutionResult::Comparison(ComparisonResult {
            entries,
            max_delta_pcm,
            summary,
        }))
    }
}
