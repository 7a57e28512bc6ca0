//! # flux-server
//!
//! HTTP API for the Flux experiment orchestration system: request
//! submission, lifecycle inspection, cancellation, reproducibility scoring
//! and Server-Sent-Events progress streaming.

mod error;
mod server;
mod sse;

pub use error::ApiError;
pub use server::{app, build_state, serve, AppState, SharedState};
