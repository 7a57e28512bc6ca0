//! # flux-core
//!
//! Core types for the Flux experiment orchestration system.
//!
//! Flux accepts natural-language experiment requests, routes them to
//! specialist workers, executes the work asynchronously, and streams
//! structured progress to callers. This crate holds the shared vocabulary:
//!
//! - Request lifecycle and routing types
//! - Work specifications and specialist result payloads (tagged variants,
//!   one case per specialist)
//! - Canonicalization and content fingerprinting for dedup/caching
//! - Configuration and the unified error taxonomy

pub mod config;
mod error;
pub mod fingerprint;
mod types;

pub use config::{CachePolicy, FluxConfig};
pub use error::{FluxError, Result};
pub use fingerprint::{canonicalize, fingerprint, Fingerprint};
pub use types::*;
