//! Core type definitions for Flux orchestration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque request identifier, generated at creation and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex characters, for log lines
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| format!("Invalid request id: {}", s))
    }
}

/// Request lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RequestState {
    /// Terminal states are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine permits `self -> to`
    pub fn can_transition(&self, to: RequestState) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Processing)
                | (Self::Queued, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for RequestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid request state: {}", s)),
        }
    }
}

/// Named specialist workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecialistKind {
    SingleRun,
    ParameterSweep,
    HistoryQuery,
    Comparison,
    DocumentCopilot,
}

impl SpecialistKind {
    /// Tie-break ordering: lower wins. Narrow-purpose specialists outrank
    /// general ones; history-query is the catch-all default.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Comparison => 0,
            Self::ParameterSweep => 1,
            Self::DocumentCopilot => 2,
            Self::SingleRun => 3,
            Self::HistoryQuery => 4,
        }
    }

    /// Specialist that receives queries matching no keywords at all
    pub fn fallback() -> Self {
        Self::HistoryQuery
    }

    pub fn all() -> [SpecialistKind; 5] {
        [
            Self::SingleRun,
            Self::ParameterSweep,
            Self::HistoryQuery,
            Self::Comparison,
            Self::DocumentCopilot,
        ]
    }
}

impl std::fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleRun => write!(f, "single-run"),
            Self::ParameterSweep => write!(f, "parameter-sweep"),
            Self::HistoryQuery => write!(f, "history-query"),
            Self::Comparison => write!(f, "comparison"),
            Self::DocumentCopilot => write!(f, "document-copilot"),
        }
    }
}

impl std::str::FromStr for SpecialistKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single-run" | "single_run" | "simulation" => Ok(Self::SingleRun),
            "parameter-sweep" | "parameter_sweep" | "sweep" => Ok(Self::ParameterSweep),
            "history-query" | "history_query" | "history" => Ok(Self::HistoryQuery),
            "comparison" | "compare" => Ok(Self::Comparison),
            "document-copilot" | "document_copilot" | "documents" => Ok(Self::DocumentCopilot),
            _ => Err(format!("Invalid specialist: {}", s)),
        }
    }
}

/// How a routing decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    /// Deterministic keyword scoring
    Keyword,
    /// External semantic classifier
    Semantic,
    /// No keyword matched anywhere; default specialist chosen
    Fallback,
}

/// Routing effort requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Fast,
    Thorough,
}

impl std::str::FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "thorough" => Ok(Self::Thorough),
            _ => Err(format!("Invalid routing mode: {}", s)),
        }
    }
}

/// Resolved routing decision for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub specialist: SpecialistKind,
    pub intent_label: String,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    pub method: RoutingMethod,
}

/// Parameters for one simulated criticality run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Geometry identifier, e.g. "pwr-pin-cell"
    pub geometry: String,
    /// U-235 enrichment in weight percent
    pub enrichment_pct: f64,
    /// Fuel temperature in Kelvin
    pub temperature_k: f64,
    /// Particles per batch
    pub particles: u64,
    /// Active batches
    pub batches: u32,
}

/// Parameters for a sweep over one RunSpec field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub base: RunSpec,
    /// Swept parameter name ("enrichment_pct" or "temperature_k")
    pub parameter: String,
    pub values: Vec<f64>,
}

/// Parameters for a history search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub terms: Vec<String>,
    pub limit: usize,
}

/// Parameters for a result comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareSpec {
    /// Explicit run ids to compare (may be empty)
    pub run_ids: Vec<String>,
    /// Free search terms used when run ids are not given
    pub terms: Vec<String>,
}

/// Parameters for a documentation lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSpec {
    pub query: String,
    pub top_k: usize,
}

/// Caller-supplied work payload, one variant per specialist.
///
/// Immutable once fingerprinted; canonicalization lives in
/// [`crate::fingerprint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkSpecification {
    SingleRun(RunSpec),
    ParameterSweep(SweepSpec),
    HistoryQuery(QuerySpec),
    Comparison(CompareSpec),
    DocumentLookup(DocSpec),
}

impl WorkSpecification {
    /// Specialist that owns this payload shape
    pub fn specialist(&self) -> SpecialistKind {
        match self {
            Self::SingleRun(_) => SpecialistKind::SingleRun,
            Self::ParameterSweep(_) => SpecialistKind::ParameterSweep,
            Self::HistoryQuery(_) => SpecialistKind::HistoryQuery,
            Self::Comparison(_) => SpecialistKind::Comparison,
            Self::DocumentLookup(_) => SpecialistKind::DocumentCopilot,
        }
    }
}

/// Outcome of one simulated criticality run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub keff: f64,
    pub keff_std: f64,
    pub particles: u64,
    pub batches: u32,
    pub runtime_ms: u64,
}

impl RunResult {
    /// Relative standard deviation of keff, as a fraction (not percent)
    pub fn relative_std(&self) -> f64 {
        if self.keff == 0.0 {
            return f64::INFINITY;
        }
        self.keff_std / self.keff
    }

    /// Whether all fields a downstream consumer relies on carry usable values
    pub fn is_complete(&self) -> bool {
        !self.run_id.is_empty()
            && self.keff.is_finite()
            && self.keff > 0.0
            && self.keff_std.is_finite()
            && self.keff_std >= 0.0
            && self.particles > 0
            && self.batches > 0
    }
}

/// One failed point of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub value: f64,
    pub error: String,
}

/// Aggregate outcome of a parameter sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub parameter: String,
    pub runs: Vec<RunResult>,
    pub failures: Vec<SweepFailure>,
}

/// Outcome of a history search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResult {
    pub records: Vec<HistoryRecord>,
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub run_id: String,
    pub keff: f64,
    pub keff_std: f64,
}

/// Outcome of a result comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub entries: Vec<ComparisonEntry>,
    /// Largest pairwise keff difference, in pcm
    pub max_delta_pcm: f64,
    pub summary: String,
}

/// One ranked documentation excerpt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentExcerpt {
    pub source: String,
    pub excerpt: String,
    pub relevance: f64,
}

/// Outcome of a documentation lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentsResult {
    pub excerpts: Vec<DocumentExcerpt>,
}

/// Specialist-defined result payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResult {
    Run(RunResult),
    Sweep(SweepResult),
    History(HistoryResult),
    Comparison(ComparisonResult),
    Documents(DocumentsResult),
}

impl ExecutionResult {
    /// The primary run payload, when this result carries one
    pub fn as_run(&self) -> Option<&RunResult> {
        match self {
            Self::Run(run) => Some(run),
            _ => None,
        }
    }
}

/// Typed progress notification payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEventKind {
    RoutingStarted { query: String },
    RoutingComplete { decision: RoutingDecision },
    StepStarted { step: String },
    StepProgress { step: String, detail: String },
    ToolInvoked { tool: String, input: String },
    ToolResult { tool: String, summary: String },
    Completed { result: ExecutionResult },
    Failed { error: String },
}

impl ProgressEventKind {
    /// Terminal events close the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Ordered, timestamped progress record attached to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Per-request monotonic sequence number, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressEventKind,
}

/// One caller interaction, owned by the request store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub query: String,
    pub state: RequestState,
    pub decision: Option<RoutingDecision>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<ExecutionResult>,
    pub error: Option<String>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            query: query.into(),
            state: RequestState::Queued,
            decision: None,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

/// Persisted record of a completed execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub request_id: RequestId,
    /// Hex-encoded fingerprint of the work specification
    pub fingerprint: String,
    pub specialist: SpecialistKind,
    pub result: ExecutionResult,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(RequestState::Queued.can_transition(RequestState::Processing));
        assert!(RequestState::Queued.can_transition(RequestState::Cancelled));
        assert!(RequestState::Processing.can_transition(RequestState::Completed));
        assert!(RequestState::Processing.can_transition(RequestState::Failed));
        assert!(RequestState::Processing.can_transition(RequestState::Cancelled));

        // Terminal states accept nothing
        assert!(!RequestState::Completed.can_transition(RequestState::Processing));
        assert!(!RequestState::Failed.can_transition(RequestState::Queued));
        assert!(!RequestState::Cancelled.can_transition(RequestState::Processing));
        // Queued cannot skip directly to completed
        assert!(!RequestState::Queued.can_transition(RequestState::Completed));
    }

    #[test]
    fn test_specialist_parsing() {
        let kind: SpecialistKind = "parameter-sweep".parse().unwrap();
        assert_eq!(kind, SpecialistKind::ParameterSweep);
        assert_eq!(kind.to_string(), "parameter-sweep");
        assert!("unknown-worker".parse::<SpecialistKind>().is_err());
    }

    #[test]
    fn test_specialist_priority_ordering() {
        // Comparison is the most specific, history-query the most general
        assert!(SpecialistKind::Comparison.priority() < SpecialistKind::SingleRun.priority());
        assert!(SpecialistKind::SingleRun.priority() < SpecialistKind::HistoryQuery.priority());
        assert_eq!(SpecialistKind::fallback(), SpecialistKind::HistoryQuery);
    }

    #[test]
    fn test_run_result_completeness() {
        let run = RunResult {
            run_id: "r-abc123".to_string(),
            keff: 1.18231,
            keff_std: 0.00021,
            particles: 10_000,
            batches: 100,
            runtime_ms: 1200,
        };
        assert!(run.is_complete());
        assert!((run.relative_std() - 0.00021 / 1.18231).abs() < 1e-12);

        let incomplete = RunResult {
            run_id: String::new(),
            ..run
        };
        assert!(!incomplete.is_complete());
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEventKind::Failed {
            error: "boom".to_string()
        }
        .is_terminal());
        assert!(!ProgressEventKind::StepStarted {
            step: "transport".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = ProgressEvent {
            seq: 3,
            timestamp: Utc::now(),
            kind: ProgressEventKind::StepStarted {
                step: "transport".to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_started");
        assert_eq!(json["seq"], 3);
    }
}
