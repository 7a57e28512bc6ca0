//! History query specialist

use std::sync::Arc;

use async_trait::async_trait;
use flux_core::{
    ExecutionResult, FluxError, HistoryResult, Result, SpecialistKind, WorkSpecification,
};

use crate::history::HistoryStore;
use crate::specialist::{EventSink, Specialist};

pub struct HistoryQuerySpecialist {
    store: Arc<HistoryStore>,
}

impl HistoryQuerySpecialist {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Specialist for HistoryQuerySpecialist {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::HistoryQuery
    }

    async fn execute(
        &self,
        spec: &WorkSpecification,
        events: &EventSink,
    ) -> Result<ExecutionResult> {
        let WorkSpecification::HistoryQuery(query) = spec else {
            return Err(FluxError::MalformedSpec(
                "history-query specialist requires a query specification".to_string(),
            ));
        };

        events.step_started("search-history");
        events.tool_invoked("history-log", query.terms.join(" "));

        let records = self.store.search(&query.terms, query.limit).await?;
        events.tool_result("history-log", format!("{} record(s)", records.len()));

        Ok(ExecutionResult::History(HistoryResult { records }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flux_core::{HistoryRecord, QuerySpec, RequestId, RunResult};

    fn seeded_store(dir: &tempfile::TempDir) -> Arc<HistoryStore> {
        Arc::new(HistoryStore::new(dir.path().join("history.jsonl")))
    }

    fn record(run_id: &str) -> HistoryRecord {
        HistoryRecord {
            request_id: RequestId::new(),
            fingerprint: "fp".to_string(),
            specialist: SpecialistKind::SingleRun,
            result: ExecutionResult::Run(RunResult {
                run_id: run_id.to_string(),
                keff: 1.18,
                keff_std: 0.0002,
                particles: 10_000,
                batches: 100,
                runtime_ms: 25,
            }),
            created_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_query_finds_matching_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        store.append(&record("r-aaa111")).await.unwrap();
        store.append(&record("r-bbb222")).await.unwrap();

        let (sink, _rx) = EventSink::detached();
        let spec = WorkSpecification::HistoryQuery(QuerySpec {
            terms: vec!["r-aaa111".to_string()],
            limit: 10,
        });
        let result = HistoryQuerySpecialist::new(store)
            .execute(&spec, &sink)
            .await
            .unwrap();

        let ExecutionResult::History(history) = result else {
            panic!("expected a history result");
        };
        assert_eq!(history.records.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_history_is_an_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, _rx) = EventSink::detached();
        let spec = WorkSpecification::HistoryQuery(QuerySpec {
            terms: vec![],
            limit: 10,
        });
        let result = HistoryQuerySpecialist::new(seeded_store(&dir))
            .execute(&spec, &sink)
            .await
            .unwrap();

        let ExecutionResult::History(history) = result else {
            panic!("expected a history result");
        };
        assert!(history.records.is_empty());
    }
}
