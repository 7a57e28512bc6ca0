//! Execution orchestration: dedup, dispatch, cancellation, assessment
//!
//! One live execution per specification fingerprint. A request arriving while
//! identical work is in flight attaches as a subscriber instead of starting a
//! second execution; a request arriving after identical work completed reuses
//! the cached result when the cache policy allows. The check-or-create step
//! runs under a single lock so two simultaneous identical requests can never
//! race into two executions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use flux_core::{
    fingerprint, CachePolicy, ExecutionResult, Fingerprint, FluxConfig, FluxError, HistoryRecord,
    ProgressEventKind, RequestId, RequestState, Result, RunResult, SpecialistKind,
    WorkSpecification,
};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::evidence::{HistoricalSearch, HistoryEvidence, StaticLiterature};
use crate::history::HistoryStore;
use crate::lifecycle::{RequestStore, TransitionPayload};
use crate::publisher::ProgressPublisher;
use crate::scorer::{score, ReproducibilityAssessment};
use crate::specialist::{EventSink, SpecialistRegistry};
use crate::specialists::builtin_registry;

/// One in-flight execution and the requests attached to it
struct ExecutionHandle {
    specialist: SpecialistKind,
    subscribers: Mutex<Vec<RequestId>>,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

/// Terminal result retained for reuse
struct CachedExecution {
    result: ExecutionResult,
    specialist: SpecialistKind,
    completed_at: chrono::DateTime<Utc>,
}

/// Central coordinator tying the registry, stores and publisher together
pub struct Orchestrator {
    registry: SpecialistRegistry,
    requests: Arc<RequestStore>,
    publisher: Arc<ProgressPublisher>,
    history: Arc<HistoryStore>,
    cache_policy: CachePolicy,
    live: Mutex<HashMap<Fingerprint, Arc<ExecutionHandle>>>,
    cache: Mutex<HashMap<Fingerprint, CachedExecution>>,
    literature: Arc<StaticLiterature>,
    historical: Arc<dyn HistoricalSearch>,
}

impl Orchestrator {
    pub fn new(
        registry: SpecialistRegistry,
        requests: Arc<RequestStore>,
        publisher: Arc<ProgressPublisher>,
        history: Arc<HistoryStore>,
        cache_policy: CachePolicy,
        literature: Arc<StaticLiterature>,
        historical: Arc<dyn HistoricalSearch>,
    ) -> Self {
        Self {
            registry,
            requests,
            publisher,
            history,
            cache_policy,
            live: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            literature,
            historical,
        }
    }

    /// Orchestrator with the built-in specialists and file-backed history
    pub fn builtin(config: &FluxConfig) -> Self {
        let requests = Arc::new(RequestStore::new());
        let publisher = Arc::new(ProgressPublisher::new(config.stream.buffer_capacity));
        let history = Arc::new(HistoryStore::new(&config.history.path));
        let literature = Arc::new(StaticLiterature);
        let historical = Arc::new(HistoryEvidence::new(history.clone()));
        let registry = builtin_registry(history.clone(), literature.clone());

        Self::new(
            registry,
            requests,
            publisher,
            history,
            config.cache.clone(),
            literature,
            historical,
        )
    }

    pub fn requests(&self) -> &Arc<RequestStore> {
        &self.requests
    }

    pub fn publisher(&self) -> &Arc<ProgressPublisher> {
        &self.publisher
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Start (or join) the execution backing an already-routed request.
    ///
    /// The request must be in `queued` state with its routing decision set.
    /// Returns as soon as the request is `processing`; progress flows through
    /// the publisher.
    pub async fn dispatch(
        self: &Arc<Self>,
        request_id: RequestId,
        spec: WorkSpecification,
    ) -> Result<()> {
        let fp = fingerprint(&spec)?;
        let kind = spec.specialist();

        // Check-or-create is atomic under the live-map lock. The transition to
        // processing happens before the request becomes visible as a
        // subscriber or handle: a request cancelled between creation and
        // dispatch fails the transition here, and must not leave a dead entry
        // behind for later identical requests to attach to.
        let handle = {
            let mut live = self.live.lock().await;
            if let Some(handle) = live.get(&fp) {
                self.requests
                    .transition(request_id, RequestState::Processing, TransitionPayload::None)
                    .await?;
                handle.subscribers.lock().await.push(request_id);
                info!(
                    "Request {} attached to in-flight execution {}",
                    request_id.short(),
                    fp.short()
                );
                return Ok(());
            }

            if let Some(cached) = self.fresh_cached(&fp).await {
                drop(live);
                return self.replay_cached(request_id, &fp, cached).await;
            }

            self.requests
                .transition(request_id, RequestState::Processing, TransitionPayload::None)
                .await?;

            let (cancel_tx, cancel_rx) = watch::channel(false);
            let handle = Arc::new(ExecutionHandle {
                specialist: kind,
                subscribers: Mutex::new(vec![request_id]),
                cancel_tx,
                cancel_rx,
            });
            live.insert(fp, handle.clone());
            handle
        };

        let specialist = match self.registry.get(kind) {
            Ok(specialist) => specialist,
            Err(e) => {
                self.finalize(fp, &handle, Err(e)).await;
                return Ok(());
            }
        };

        let orchestrator = self.clone();
        tokio::spawn(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            let sink = EventSink::new(tx, handle.cancel_rx.clone());

            let pump = tokio::spawn(Self::pump(
                orchestrator.publisher.clone(),
                handle.clone(),
                rx,
            ));

            debug!("Executing {} for fingerprint {}", kind, fp.short());
            let outcome = specialist.execute(&spec, &sink).await;

            // Dropping the sink ends the pump; await it so every progress
            // event lands before the terminal one
            drop(sink);
            let _ = pump.await;

            orchestrator.finalize(fp, &handle, outcome).await;
        });

        Ok(())
    }

    /// Fan specialist progress out to every attached subscriber
    async fn pump(
        publisher: Arc<ProgressPublisher>,
        handle: Arc<ExecutionHandle>,
        mut rx: mpsc::UnboundedReceiver<ProgressEventKind>,
    ) {
        while let Some(kind) = rx.recv().await {
            let subscribers = handle.subscribers.lock().await.clone();
            for subscriber in subscribers {
                publisher.publish(subscriber, kind.clone()).await;
            }
        }
    }

    /// Settle every attached request once the specialist returns
    async fn finalize(
        &self,
        fp: Fingerprint,
        handle: &Arc<ExecutionHandle>,
        outcome: Result<ExecutionResult>,
    ) {
        self.live.lock().await.remove(&fp);
        let subscribers = handle.subscribers.lock().await.clone();

        match outcome {
            Ok(result) => {
                let completed_at = Utc::now();
                for subscriber in &subscribers {
                    if let Err(e) = self
                        .settle_completed(*subscriber, &fp, handle.specialist, &result, completed_at)
                        .await
                    {
                        warn!("Failed to settle request {}: {}", subscriber.short(), e);
                    }
                }
                self.cache.lock().await.insert(
                    fp,
                    CachedExecution {
                        result,
                        specialist: handle.specialist,
                        completed_at,
                    },
                );
            }
            Err(e) => {
                let detail = e.to_string();
                if subscribers.is_empty() {
                    info!("Execution {} ended with no subscribers: {}", fp.short(), detail);
                }
                for subscriber in subscribers {
                    let transitioned = self
                        .requests
                        .transition(
                            subscriber,
                            RequestState::Failed,
                            TransitionPayload::Error(detail.clone()),
                        )
                        .await;
                    if let Err(e) = transitioned {
                        warn!("Failed to settle request {}: {}", subscriber.short(), e);
                        continue;
                    }
                    self.publisher
                        .publish(
                            subscriber,
                            ProgressEventKind::Failed {
                                error: detail.clone(),
                            },
                        )
                        .await;
                }
            }
        }
    }

    async fn settle_completed(
        &self,
        request_id: RequestId,
        fp: &Fingerprint,
        specialist: SpecialistKind,
        result: &ExecutionResult,
        completed_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let request = self
            .requests
            .transition(
                request_id,
                RequestState::Completed,
                TransitionPayload::Result(result.clone()),
            )
            .await?;
        self.publisher
            .publish(
                request_id,
                ProgressEventKind::Completed {
                    result: result.clone(),
                },
            )
            .await;

        let record = HistoryRecord {
            request_id,
            fingerprint: fp.to_hex(),
            specialist,
            result: result.clone(),
            created_at: request.created_at,
            completed_at,
        };
        if let Err(e) = self.history.append(&record).await {
            // Best effort: a full result was already delivered to the caller
            warn!("History append failed for {}: {}", request_id.short(), e);
        }
        Ok(())
    }

    async fn fresh_cached(&self, fp: &Fingerprint) -> Option<(ExecutionResult, SpecialistKind)> {
        if !self.cache_policy.reuse_completed {
            return None;
        }
        let cache = self.cache.lock().await;
        let cached = cache.get(fp)?;
        let age = Utc::now()
            .signed_duration_since(cached.completed_at)
            .num_seconds();
        if age >= 0 && (age as u64) < self.cache_policy.max_age_secs {
            Some((cached.result.clone(), cached.specialist))
        } else {
            None
        }
    }

    /// Complete a request from the cache without running a specialist
    async fn replay_cached(
        &self,
        request_id: RequestId,
        fp: &Fingerprint,
        (result, specialist): (ExecutionResult, SpecialistKind),
    ) -> Result<()> {
        info!(
            "Request {} served from cached execution {}",
            request_id.short(),
            fp.short()
        );
        self.requests
            .transition(request_id, RequestState::Processing, TransitionPayload::None)
            .await?;
        self.publisher
            .publish(request_id, ProgressEventKind::StepStarted {
                step: "reuse-cached-result".to_string(),
            })
            .await;
        self.settle_completed(request_id, fp, specialist, &result, Utc::now())
            .await
    }

    /// Cancel one request. The shared execution keeps running while any other
    /// subscriber remains; the last detach flips the cooperative cancel flag.
    pub async fn cancel(&self, request_id: RequestId) -> Result<()> {
        self.requests
            .transition(request_id, RequestState::Cancelled, TransitionPayload::None)
            .await?;
        // Stream ends without a synthetic terminal event
        self.publisher.close(request_id).await;

        let live = self.live.lock().await;
        for (fp, handle) in live.iter() {
            let mut subscribers = handle.subscribers.lock().await;
            if let Some(index) = subscribers.iter().position(|id| *id == request_id) {
                subscribers.remove(index);
                if subscribers.is_empty() {
                    info!(
                        "Last subscriber of {} cancelled, stopping execution",
                        fp.short()
                    );
                    let _ = handle.cancel_tx.send(true);
                }
                break;
            }
        }
        Ok(())
    }

    /// Reproducibility assessment for a previously completed run
    pub async fn assess_run(&self, run_id: &str) -> Result<(RunResult, ReproducibilityAssessment)> {
        let run = self
            .history
            .find_run(run_id)
            .await?
            .ok_or_else(|| FluxError::NotFound(format!("unknown run: {}", run_id)))?;

        let literature = self.literature.matching_benchmarks(run.keff).await;
        let historical = self.historical.similar_runs(&run).await.unwrap_or_else(|e| {
            warn!("Historical evidence lookup failed: {}", e);
            Vec::new()
        });

        let assessment = score(&run, &literature, &historical);
        Ok((run, assessment))
    }
}
