//! # flux-orchestrator
//!
//! Request lifecycle, specialist execution, progress streaming, history and
//! reproducibility scoring for the Flux experiment orchestration system.
//!
//! The [`Orchestrator`] is the composition root: it owns the request store,
//! the per-request progress publisher, the append-only history log and the
//! specialist registry, and enforces one live execution per specification
//! fingerprint.

pub mod evidence;
mod execution;
mod history;
mod lifecycle;
mod publisher;
mod scorer;
mod specialist;
pub mod specialists;

pub use execution::Orchestrator;
pub use history::HistoryStore;
pub use lifecycle::{RequestStore, TransitionPayload};
pub use publisher::{ProgressPublisher, Subscription};
pub use scorer::{score, FactorScore, Rating, ReproducibilityAssessment, Verdict};
pub use specialist::{EventSink, Specialist, SpecialistRegistry};
