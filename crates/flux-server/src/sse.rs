//! Server-Sent Events endpoint for request progress
//!
//! Each connection replays the buffered event history for its request and
//! then follows the live tail, so reconnecting clients never miss or repeat
//! an event. The SSE `id` field carries the per-request sequence number.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use flux_core::RequestId;

use crate::error::ApiError;
use crate::server::SharedState;

/// GET /requests/:id/stream
pub async fn stream_request(
    State(app): State<SharedState>,
    Path(id): Path<RequestId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Unknown requests 404 instead of producing an empty stream
    app.orchestrator.requests().get(id).await?;

    let mut subscription = app.orchestrator.publisher().subscribe(id).await;

    let stream = async_stream::stream! {
        while let Some(event) = subscription.next().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    yield Ok(Event::default().id(event.seq.to_string()).data(json));
                }
                Err(e) => {
                    tracing::warn!("Dropping unserializable progress event: {}", e);
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_state;
    use flux_core::FluxConfig;

    #[tokio::test]
    async fn test_unknown_request_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FluxConfig::default();
        config.history.path = dir.path().join("history.jsonl");
        let state = build_state(&config);

        let result = stream_request(State(state), Path(RequestId::new())).await;
        assert!(result.is_err());
    }
}
