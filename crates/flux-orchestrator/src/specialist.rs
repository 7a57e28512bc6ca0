//! Specialist execution contract
//!
//! A specialist is a named worker implementing one class of request. Progress
//! emission is a channel send, never a synchronous callback, so specialist
//! execution speed is decoupled from subscriber consumption speed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flux_core::{
    ExecutionResult, FluxError, ProgressEventKind, Result, SpecialistKind, WorkSpecification,
};
use tokio::sync::{mpsc, watch};

/// Progress emission handle passed to a specialist.
///
/// Carries the execution's cooperative cancellation flag: specialists poll
/// [`EventSink::is_cancelled`] at their checkpoints and stop early when the
/// last subscriber has detached.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ProgressEventKind>,
    cancel: watch::Receiver<bool>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEventKind>, cancel: watch::Receiver<bool>) -> Self {
        Self { tx, cancel }
    }

    /// Emit one progress event. Send failures mean the supervising pump is
    /// gone, which only happens during shutdown; the event is dropped.
    pub fn emit(&self, kind: ProgressEventKind) {
        let _ = self.tx.send(kind);
    }

    pub fn step_started(&self, step: impl Into<String>) {
        self.emit(ProgressEventKind::StepStarted { step: step.into() });
    }

    pub fn step_progress(&self, step: impl Into<String>, detail: impl Into<String>) {
        self.emit(ProgressEventKind::StepProgress {
            step: step.into(),
            detail: detail.into(),
        });
    }

    pub fn tool_invoked(&self, tool: impl Into<String>, input: impl Into<String>) {
        self.emit(ProgressEventKind::ToolInvoked {
            tool: tool.into(),
            input: input.into(),
        });
    }

    pub fn tool_result(&self, tool: impl Into<String>, summary: impl Into<String>) {
        self.emit(ProgressEventKind::ToolResult {
            tool: tool.into(),
            summary: summary.into(),
        });
    }

    /// True once the execution has been asked to stop at its next checkpoint
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Sink wired to nothing, for driving a specialist directly in tests.
    /// The cancel flag stays false; a dropped watch sender keeps its last value.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<ProgressEventKind>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        (Self::new(tx, cancel_rx), rx)
    }
}

/// Work-execution contract every specialist honors.
///
/// A specialist emits at least one `StepStarted`; terminal events are the
/// orchestrator's responsibility, never the specialist's.
#[async_trait]
pub trait Specialist: Send + Sync {
    fn kind(&self) -> SpecialistKind;

    async fn execute(&self, spec: &WorkSpecification, events: &EventSink)
        -> Result<ExecutionResult>;
}

/// Immutable specialist lookup, built once at startup
pub struct SpecialistRegistry {
    workers: HashMap<SpecialistKind, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    pub fn register(mut self, specialist: Arc<dyn Specialist>) -> Self {
        self.workers.insert(specialist.kind(), specialist);
        self
    }

    pub fn get(&self, kind: SpecialistKind) -> Result<Arc<dyn Specialist>> {
        self.workers
            .get(&kind)
            .cloned()
            .ok_or_else(|| FluxError::NotFound(format!("no specialist registered for {}", kind)))
    }

    pub fn kinds(&self) -> Vec<SpecialistKind> {
        self.workers.keys().copied().collect()
    }
}

impl Default for SpecialistRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSpecialist(SpecialistKind);

    #[async_trait]
    impl Specialist for NullSpecialist {
        fn kind(&self) -> SpecialistKind {
            self.0
        }

        async fn execute(
            &self,
            _spec: &WorkSpecification,
            events: &EventSink,
        ) -> Result<ExecutionResult> {
            events.step_started("noop");
            Err(FluxError::specialist(self.0.to_string(), "null specialist"))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = SpecialistRegistry::new()
            .register(Arc::new(NullSpecialist(SpecialistKind::SingleRun)));

        assert!(registry.get(SpecialistKind::SingleRun).is_ok());
        assert!(matches!(
            registry.get(SpecialistKind::Comparison),
            Err(FluxError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sink_emits_through_channel() {
        let (sink, mut rx) = EventSink::detached();
        sink.step_started("transport");
        sink.step_progress("transport", "batch 10/100");

        assert!(matches!(
            rx.recv().await,
            Some(ProgressEventKind::StepStarted { .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ProgressEventKind::StepProgress { .. })
        ));
    }
}
