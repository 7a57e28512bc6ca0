//! Axum HTTP API over the orchestrator
//!
//! Submission validates the extracted specification before a request is
//! created, so a malformed query is rejected with no request record, no
//! events and no history entry.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use flux_core::{
    canonicalize, FluxConfig, FluxError, ProgressEventKind, Request, RequestId, Result,
    RoutingMode,
};
use flux_orchestrator::Orchestrator;
use flux_router::{build_specification, HttpClassifier, IntentRouter};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::ApiError;
use crate::sse;

/// Shared application state
pub struct AppState {
    pub router: IntentRouter,
    pub orchestrator: Arc<Orchestrator>,
}

pub type SharedState = Arc<AppState>;

/// Build the application state from configuration
pub fn build_state(config: &FluxConfig) -> SharedState {
    let mut router = IntentRouter::new(&config.router);
    if let Some(url) = &config.router.classifier_url {
        router = router.with_classifier(Arc::new(HttpClassifier::new(url.clone())));
    }

    Arc::new(AppState {
        router,
        orchestrator: Arc::new(Orchestrator::builtin(config)),
    })
}

/// Router with every API route attached
pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/requests", post(submit_request))
        .route("/requests/:id", get(get_request).delete(cancel_request))
        .route("/requests/:id/stream", get(sse::stream_request))
        .route("/requests/:id/reproducibility", get(get_reproducibility))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on the configured bind address
pub async fn serve(config: &FluxConfig) -> Result<()> {
    let state = build_state(config);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!("Flux API listening on {}", config.server.bind_addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub query: String,
    #[serde(default)]
    pub mode: RoutingMode,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub request_id: RequestId,
    pub status: String,
}

/// POST /requests - route, validate and dispatch one experiment request
async fn submit_request(
    State(app): State<SharedState>,
    Json(body): Json<SubmitRequest>,
) -> std::result::Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    if body.query.trim().is_empty() {
        return Err(FluxError::MalformedSpec("query must not be empty".to_string()).into());
    }

    let decision = app.router.route(&body.query, body.mode).await;
    let spec = build_specification(&body.query, decision.specialist);
    // Validation happens before any request state exists
    canonicalize(&spec)?;

    let requests = app.orchestrator.requests();
    let request = requests.create(&body.query).await;
    requests.set_decision(request.id, decision.clone()).await?;

    let publisher = app.orchestrator.publisher();
    publisher
        .publish(
            request.id,
            ProgressEventKind::RoutingStarted {
                query: body.query.clone(),
            },
        )
        .await;
    publisher
        .publish(request.id, ProgressEventKind::RoutingComplete { decision })
        .await;

    app.orchestrator.dispatch(request.id, spec).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            request_id: request.id,
            status: "queued".to_string(),
        }),
    ))
}

/// GET /requests/:id - full request snapshot
async fn get_request(
    State(app): State<SharedState>,
    Path(id): Path<RequestId>,
) -> std::result::Result<Json<Request>, ApiError> {
    let request = app.orchestrator.requests().get(id).await?;
    Ok(Json(request))
}

/// DELETE /requests/:id - cancel a queued or processing request
async fn cancel_request(
    State(app): State<SharedState>,
    Path(id): Path<RequestId>,
) -> std::result::Result<StatusCode, ApiError> {
    app.orchestrator.cancel(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ReproducibilityResponse {
    pub run_id: String,
    pub assessment: flux_orchestrator::ReproducibilityAssessment,
}

/// GET /requests/:id/reproducibility - score the completed run behind a request
async fn get_reproducibility(
    State(app): State<SharedState>,
    Path(id): Path<RequestId>,
) -> std::result::Result<Json<ReproducibilityResponse>, ApiError> {
    let request = app.orchestrator.requests().get(id).await?;
    let run_id = request
        .result
        .as_ref()
        .and_then(|result| result.as_run())
        .map(|run| run.run_id.clone())
        .ok_or(FluxError::InvalidTransition {
            from: request.state,
            to: flux_core::RequestState::Completed,
        })?;

    let (run, assessment) = app.orchestrator.assess_run(&run_id).await?;
    Ok(Json(ReproducibilityResponse {
        run_id: run.run_id,
        assessment,
    }))
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "flux-server",
    }))
}
