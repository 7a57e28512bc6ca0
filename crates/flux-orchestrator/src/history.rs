//! Append-only history log of completed executions
//!
//! One JSON record per line, keyed by request id, secondarily searchable by
//! fingerprint and free terms. A missing file is an empty history; an
//! unreadable or unwritable file surfaces as `StoreUnavailable`, and callers
//! that only need best-effort lookups degrade to a miss.

use std::path::PathBuf;

use flux_core::{ExecutionResult, FluxError, HistoryRecord, Result, RunResult};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// File-backed history store
pub struct HistoryStore {
    path: PathBuf,
    // serializes appends so concurrent terminal executions cannot interleave lines
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append one record
    pub async fn append(&self, record: &HistoryRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| FluxError::StoreUnavailable(format!("{:?}: {}", self.path, e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| FluxError::StoreUnavailable(format!("{:?}: {}", self.path, e)))?;
        file.flush()
            .await
            .map_err(|e| FluxError::StoreUnavailable(format!("{:?}: {}", self.path, e)))?;
        Ok(())
    }

    /// All records, oldest first. Unparseable lines are skipped with a warning.
    pub async fn all(&self) -> Result<Vec<HistoryRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(FluxError::StoreUnavailable(format!(
                    "{:?}: {}",
                    self.path, e
                )))
            }
        };

        let mut records = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<HistoryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping corrupt history line: {}", e),
            }
        }
        Ok(records)
    }

    /// Records whose specification hashed to the given fingerprint
    pub async fn by_fingerprint(&self, fingerprint: &str) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|r| r.fingerprint == fingerprint)
            .collect())
    }

    /// Case-insensitive term search over serialized records, newest first
    pub async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<HistoryRecord>> {
        let needles: Vec<String> = terms
            .iter()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut records = self.all().await?;
        records.reverse();

        if needles.is_empty() {
            records.truncate(limit);
            return Ok(records);
        }

        let matched = records
            .into_iter()
            .filter(|record| {
                let haystack = serde_json::to_string(record)
                    .unwrap_or_default()
                    .to_lowercase();
                needles.iter().any(|needle| haystack.contains(needle))
            })
            .take(limit)
            .collect();
        Ok(matched)
    }

    /// Find a single run result by its run id
    pub async fn find_run(&self, run_id: &str) -> Result<Option<RunResult>> {
        for record in self.all().await?.into_iter().rev() {
            match record.result {
                ExecutionResult::Run(run) if run.run_id == run_id => return Ok(Some(run)),
                ExecutionResult::Sweep(sweep) => {
                    if let Some(run) = sweep.runs.into_iter().find(|r| r.run_id == run_id) {
                        return Ok(Some(run));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }

    /// All run results in the log, newest first
    pub async fn runs(&self) -> Result<Vec<RunResult>> {
        let mut runs = Vec::new();
        for record in self.all().await?.into_iter().rev() {
            match record.result {
                ExecutionResult::Run(run) => runs.push(run),
                ExecutionResult::Sweep(sweep) => runs.extend(sweep.runs),
                _ => {}
            }
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flux_core::{RequestId, SpecialistKind};

    fn record(run_id: &str, fingerprint: &str) -> HistoryRecord {
        HistoryRecord {
            request_id: RequestId::new(),
            fingerprint: fingerprint.to_string(),
            specialist: SpecialistKind::SingleRun,
            result: ExecutionResult::Run(RunResult {
                run_id: run_id.to_string(),
                keff: 1.182,
                keff_std: 0.0002,
                particles: 10_000,
                batches: 100,
                runtime_ms: 40,
            }),
            created_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.jsonl"));

        store.append(&record("r-aaa111", "fp1")).await.unwrap();
        store.append(&record("r-bbb222", "fp2")).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].fingerprint, "fp1");
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nope.jsonl"));
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = HistoryStore::new(&path);
        store.append(&record("r-aaa111", "fp1")).await.unwrap();

        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"{not json}\n")
            .await
            .unwrap();
        store.append(&record("r-bbb222", "fp2")).await.unwrap();

        assert_eq!(store.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fingerprint_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.jsonl"));
        store.append(&record("r-aaa111", "fp1")).await.unwrap();
        store.append(&record("r-bbb222", "fp1")).await.unwrap();
        store.append(&record("r-ccc333", "fp2")).await.unwrap();

        assert_eq!(store.by_fingerprint("fp1").await.unwrap().len(), 2);
        assert_eq!(store.by_fingerprint("fp3").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_term_search_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.jsonl"));
        store.append(&record("r-aaa111", "fp1")).await.unwrap();
        store.append(&record("r-bbb222", "fp2")).await.unwrap();

        let hits = store.search(&["r-bbb222".to_string()], 10).await.unwrap();
        assert_eq!(hits.len(), 1);

        let recent = store.search(&[], 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        // newest first
        assert_eq!(recent[0].fingerprint, "fp2");
    }

    #[tokio::test]
    async fn test_find_run_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.jsonl"));
        store.append(&record("r-aaa111", "fp1")).await.unwrap();

        assert!(store.find_run("r-aaa111").await.unwrap().is_some());
        assert!(store.find_run("r-zzz999").await.unwrap().is_none());
    }
}
