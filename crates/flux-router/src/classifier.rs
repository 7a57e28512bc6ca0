//! Semantic classifier interface
//!
//! Thorough-mode routing defers to an external model behind this trait. The
//! classifier is untrusted and best-effort: the router always survives its
//! failure, so correctness never depends on model behavior.

use async_trait::async_trait;
use flux_core::{FluxError, Result, SpecialistKind};
use serde::{Deserialize, Serialize};

/// Classifier verdict for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub specialist: SpecialistKind,
    pub confidence: f64,
}

/// External semantic classifier contract
#[async_trait]
pub trait SemanticClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    specialist: String,
    confidence: f64,
}

/// HTTP-backed classifier client
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    url: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SemanticClassifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        tracing::debug!("Sending classification request to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { text })
            .send()
            .await
            .map_err(|e| FluxError::Classifier(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(FluxError::Classifier(format!(
                "Classifier error {}: {}",
                status, body
            )));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| FluxError::Classifier(format!("Failed to parse response: {}", e)))?;

        let specialist: SpecialistKind = parsed
            .specialist
            .parse()
            .map_err(FluxError::Classifier)?;

        Ok(Classification {
            specialist,
            confidence: parsed.confidence.clamp(0.0, 1.0),
        })
    }
}

/// Canned classifier for tests: a fixed answer, an error, or a configurable
/// delay to exercise the router's timeout path
#[derive(Debug, Clone, Default)]
pub struct StaticClassifier {
    answer: Option<Classification>,
    delay_ms: u64,
}

impl StaticClassifier {
    pub fn answering(specialist: SpecialistKind, confidence: f64) -> Self {
        Self {
            answer: Some(Classification {
                specialist,
                confidence,
            }),
            delay_ms: 0,
        }
    }

    /// A classifier that always fails
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl SemanticClassifier for StaticClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.answer
            .clone()
            .ok_or_else(|| FluxError::Classifier("static classifier has no answer".to_string()))
    }
}
