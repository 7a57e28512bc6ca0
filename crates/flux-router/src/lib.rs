//! # flux-router
//!
//! Intent routing for Flux: classifies a free-text experiment request into
//! one specialist and extracts its work specification.
//!
//! - Fast path: deterministic weighted keyword scoring (pure, synchronous)
//! - Thorough path: external semantic classifier behind a hard timeout,
//!   falling back to the fast decision on any failure
//!
//! Routing always returns a decision; ambiguity is never a hard error here.

mod classifier;
mod extract;
mod keywords;
mod router;

pub use classifier::{Classification, HttpClassifier, SemanticClassifier, StaticClassifier};
pub use extract::build_specification;
pub use keywords::{KeywordTable, SpecialistScore};
pub use router::IntentRouter;
