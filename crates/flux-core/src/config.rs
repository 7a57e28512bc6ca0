//! Configuration management for Flux
//!
//! One immutable `FluxConfig` is loaded at startup (from `flux.toml` when
//! present) and passed explicitly to the router and orchestrator. Routing
//! keyword tables live here rather than as ambient global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::SpecialistKind;
use crate::Result;

/// Top-level Flux configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FluxConfig {
    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub cache: CachePolicy,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Intent router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Fast-mode confidence below which thorough mode consults the classifier
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Semantic classifier endpoint; thorough mode degrades to fast-mode
    /// decisions when unset
    #[serde(default)]
    pub classifier_url: Option<String>,

    /// Hard ceiling on one classifier call
    #[serde(default = "default_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,

    /// Weighted keyword vocabulary per specialist
    #[serde(default = "default_keywords")]
    pub keywords: Vec<KeywordSet>,
}

/// Keyword vocabulary for one specialist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSet {
    pub specialist: SpecialistKind,
    pub terms: Vec<KeywordTerm>,
}

/// One weighted routing term
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordTerm {
    pub term: String,
    #[serde(default = "default_term_weight")]
    pub weight: u32,
}

impl KeywordTerm {
    fn new(term: &str, weight: u32) -> Self {
        Self {
            term: term.to_string(),
            weight,
        }
    }
}

/// Reuse policy for cached terminal executions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Master switch; disabling degrades every lookup to a miss
    #[serde(default = "default_true")]
    pub reuse_completed: bool,

    /// Maximum age of a reusable completed execution
    #[serde(default = "default_cache_max_age_secs")]
    pub max_age_secs: u64,
}

/// Progress stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Bounded per-request event buffer; slow subscribers resync from it
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

/// History log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Append-only JSONL log of completed executions
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

// Default value providers
fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_classifier_timeout_ms() -> u64 {
    2000
}

fn default_term_weight() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_cache_max_age_secs() -> u64 {
    3600
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_history_path() -> PathBuf {
    PathBuf::from("flux-history.jsonl")
}

fn default_bind_addr() -> String {
    "127.0.0.1:8686".to_string()
}

fn default_keywords() -> Vec<KeywordSet> {
    vec![
        KeywordSet {
            specialist: SpecialistKind::SingleRun,
            terms: vec![
                KeywordTerm::new("simulate", 2),
                KeywordTerm::new("simulation", 2),
                KeywordTerm::new("criticality", 1),
                KeywordTerm::new("keff", 1),
                KeywordTerm::new("eigenvalue", 1),
                KeywordTerm::new("enrichment", 1),
            ],
        },
        KeywordSet {
            specialist: SpecialistKind::ParameterSweep,
            terms: vec![
                KeywordTerm::new("sweep", 2),
                KeywordTerm::new("vary", 2),
                KeywordTerm::new("scan", 2),
                KeywordTerm::new("range", 1),
                KeywordTerm::new("across", 1),
            ],
        },
        KeywordSet {
            specialist: SpecialistKind::HistoryQuery,
            terms: vec![
                KeywordTerm::new("history", 2),
                KeywordTerm::new("previous", 1),
                KeywordTerm::new("past", 1),
                KeywordTerm::new("recent", 1),
                KeywordTerm::new("list", 1),
            ],
        },
        KeywordSet {
            specialist: SpecialistKind::Comparison,
            terms: vec![
                KeywordTerm::new("compare", 2),
                KeywordTerm::new("comparison", 2),
                KeywordTerm::new("versus", 2),
                KeywordTerm::new(" vs ", 2),
                KeywordTerm::new("difference", 1),
                KeywordTerm::new("against", 1),
            ],
        },
        KeywordSet {
            specialist: SpecialistKind::DocumentCopilot,
            terms: vec![
                KeywordTerm::new("documentation", 2),
                KeywordTerm::new("docs", 2),
                KeywordTerm::new("manual", 2),
                KeywordTerm::new("explain", 1),
                KeywordTerm::new("how do i", 1),
                KeywordTerm::new("what is", 1),
            ],
        },
    ]
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            classifier_url: None,
            classifier_timeout_ms: default_classifier_timeout_ms(),
            keywords: default_keywords(),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            reuse_completed: default_true(),
            max_age_secs: default_cache_max_age_secs(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl FluxConfig {
    /// Load configuration from `flux.toml` or use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| crate::FluxError::Config(format!("Failed to parse {:?}: {}", path, e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default configuration to the given path
    pub fn write_default(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| crate::FluxError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
