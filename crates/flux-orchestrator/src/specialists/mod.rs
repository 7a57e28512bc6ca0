//! Built-in specialist workers
//!
//! In-process reference implementations of the specialist contract. The
//! single-run worker uses deterministic pseudo-physics (seeded from the
//! specification fingerprint), not a transport solver; the orchestration
//! semantics around it are the point.

mod comparison;
mod documents;
mod history;
mod single_run;
mod sweep;

pub use comparison::ComparisonSpecialist;
pub use documents::DocumentCopilotSpecialist;
pub use history::HistoryQuerySpecialist;
pub use single_run::SingleRunSpecialist;
pub use sweep::ParameterSweepSpecialist;

use std::sync::Arc;

use crate::evidence::LiteratureSearch;
use crate::history::HistoryStore;
use crate::specialist::SpecialistRegistry;

/// Registry with every built-in specialist wired up
pub fn builtin_registry(
    history: Arc<HistoryStore>,
    literature: Arc<dyn LiteratureSearch>,
) -> SpecialistRegistry {
    SpecialistRegistry::new()
        .register(Arc::new(SingleRunSpecialist::new()))
        .register(Arc::new(ParameterSweepSpecialist::new()))
        .register(Arc::new(HistoryQuerySpecialist::new(history.clone())))
        .register(Arc::new(ComparisonSpecialist::new(history)))
        .register(Arc::new(DocumentCopilotSpecialist::new(literature)))
}
