//! Request lifecycle manager
//!
//! Single authoritative owner of request state. All mutation goes through
//! [`RequestStore::transition`]; illegal transitions are rejected without
//! side effect and terminal states are immutable. Requests are never deleted.

use std::collections::HashMap;

use chrono::Utc;
use flux_core::{
    ExecutionResult, FluxError, Request, RequestId, RequestState, Result, RoutingDecision,
};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Payload accompanying a state transition
#[derive(Debug, Clone)]
pub enum TransitionPayload {
    None,
    Result(ExecutionResult),
    Error(String),
}

/// In-memory request store
pub struct RequestStore {
    requests: RwLock<HashMap<RequestId, Request>>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a request in `queued` state. Non-blocking; returns a snapshot.
    pub async fn create(&self, query: impl Into<String>) -> Request {
        let request = Request::new(query);
        debug!("Created request {}", request.id.short());
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        request
    }

    /// Snapshot of one request
    pub async fn get(&self, id: RequestId) -> Result<Request> {
        self.requests
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| FluxError::NotFound(format!("unknown request: {}", id)))
    }

    /// Record the routing decision. Only meaningful before a terminal state.
    pub async fn set_decision(&self, id: RequestId, decision: RoutingDecision) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| FluxError::NotFound(format!("unknown request: {}", id)))?;
        request.decision = Some(decision);
        Ok(())
    }

    /// The sole state mutator. Fails with `InvalidTransition` and no side
    /// effect when the state machine forbids `current -> to`.
    pub async fn transition(
        &self,
        id: RequestId,
        to: RequestState,
        payload: TransitionPayload,
    ) -> Result<Request> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| FluxError::NotFound(format!("unknown request: {}", id)))?;

        if !request.state.can_transition(to) {
            // An illegal transition is a bug signal, not a user error
            error!(
                "Rejected transition {} -> {} for request {}",
                request.state,
                to,
                id.short()
            );
            return Err(FluxError::InvalidTransition {
                from: request.state,
                to,
            });
        }

        request.state = to;
        match payload {
            TransitionPayload::None => {}
            TransitionPayload::Result(result) => request.result = Some(result),
            TransitionPayload::Error(detail) => request.error = Some(detail),
        }
        if to.is_terminal() {
            request.completed_at = Some(Utc::now());
        }

        debug!("Request {} -> {}", id.short(), to);
        Ok(request.clone())
    }
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new()
    }
}
