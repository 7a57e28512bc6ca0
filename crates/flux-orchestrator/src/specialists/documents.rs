//! Document copilot specialist

use std::sync::Arc;

use async_trait::async_trait;
use flux_core::{
    DocumentExcerpt, DocumentsResult, ExecutionResult, FluxError, Result, SpecialistKind,
    WorkSpecification,
};

use crate::evidence::LiteratureSearch;
use crate::specialist::{EventSink, Specialist};

pub struct DocumentCopilotSpecialist {
    literature: Arc<dyn LiteratureSearch>,
}

impl DocumentCopilotSpecialist {
    pub fn new(literature: Arc<dyn LiteratureSearch>) -> Self {
        Self { literature }
    }
}

#[async_trait]
impl Specialist for DocumentCopilotSpecialist {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::DocumentCopilot
    }

    async fn execute(
        &self,
        spec: &WorkSpecification,
        events: &EventSink,
    ) -> Result<ExecutionResult> {
        let WorkSpecification::DocumentLookup(doc) = spec else {
            return Err(FluxError::MalformedSpec(
                "document-copilot specialist requires a document specification".to_string(),
            ));
        };

        events.step_started("search-documents");
        events.tool_invoked("literature-index", doc.query.clone());

        let matches = self.literature.search(&doc.query, doc.top_k).await?;
        events.tool_result("literature-index", format!("{} excerpt(s)", matches.len()));

        let excerpts = matches
            .into_iter()
            .map(|m| DocumentExcerpt {
                source: m.source,
                excerpt: m.excerpt,
                relevance: m.relevance,
            })
            .collect();

        Ok(ExecutionResult::Documents(DocumentsResult { excerpts }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::StaticLiterature;
    use flux_core::DocSpec;

    #[tokio::test]
    async fn test_lookup_returns_ranked_excerpts() {
        let (sink, _rx) = EventSink::detached();
        let spec = WorkSpecification::DocumentLookup(DocSpec {
            query: "what is doppler temperature feedback in pcm".to_string(),
            top_k: 2,
        });
        let result = DocumentCopilotSpecialist::new(Arc::new(StaticLiterature))
            .execute(&spec, &sink)
            .await
            .unwrap();

        let ExecutionResult::Documents(docs) = result else {
            panic!("expected a documents result");
        };
        assert!(!docs.excerpts.is_empty());
        assert_eq!(docs.excerpts[0].source, "Reactor Physics Primer, ch. 5");
    }

    #[tokio::test]
    async fn test_no_match_is_an_empty_result() {
        let (sink, _rx) = EventSink::detached();
        let spec = WorkSpecification::DocumentLookup(DocSpec {
            query: "completely unrelated".to_string(),
            top_k: 5,
        });
        let result = DocumentCopilotSpecialist::new(Arc::new(StaticLiterature))
            .execute(&spec, &sink)
            .await
            .unwrap();

        let ExecutionResult::Documents(docs) = result else {
            panic!("expected a documents result");
        };
        assert!(docs.excerpts.is_empty());
    }
}
