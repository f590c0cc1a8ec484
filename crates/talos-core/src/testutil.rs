//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing test assertions on
//! recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;

use crate::checkpoint::CheckpointStore;
use crate::error::AppError;
use crate::schema::FilteredRecord;
use crate::traits::{Fetcher, OutputSink};
use crate::work::{CheckpointRecord, RawDocument, WorkStatus, WorkUnit};

/// Create a work unit for tests.
pub fn make_unit(domain: &str, product_id: &str) -> WorkUnit {
    WorkUnit::new(domain, product_id)
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with a queue of responses. Each call pops the first element;
/// an empty queue yields a minimal product document. Call instants are
/// recorded for pacing/backoff assertions.
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<Mutex<Vec<Result<RawDocument, AppError>>>>,
    calls: Arc<Mutex<Vec<(WorkUnit, Instant)>>>,
}

impl MockFetcher {
    pub fn new(document: RawDocument) -> Self {
        Self::with_responses(vec![Ok(document)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<RawDocument, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn fetched_units(&self) -> Vec<WorkUnit> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, unit: &WorkUnit) -> Result<RawDocument, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((unit.clone(), Instant::now()));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(serde_json::json!({"product_id": 0}))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory checkpoint store with the same transition semantics as the
/// SQLite repository. The single interior lock makes `claim` atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, CheckpointRecord>>>,
    fail_transitions: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store pre-seeded with records, e.g. a prior run's state.
    pub fn with_records(records: Vec<CheckpointRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.unit_id.clone(), r))
            .collect();
        Self {
            records: Arc::new(Mutex::new(map)),
            fail_transitions: Arc::new(Mutex::new(false)),
        }
    }

    /// Make every subsequent transition fail with a CheckpointError.
    pub fn poison(&self) {
        *self.fail_transitions.lock().unwrap() = true;
    }

    pub fn record(&self, unit_id: &str) -> Option<CheckpointRecord> {
        self.records.lock().unwrap().get(unit_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }

    fn check_poisoned(&self) -> Result<(), AppError> {
        if *self.fail_transitions.lock().unwrap() {
            Err(AppError::CheckpointError("store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl CheckpointStore for MemoryStore {
    async fn load(&self) -> Result<HashMap<String, CheckpointRecord>, AppError> {
        self.check_poisoned()?;
        Ok(self.records.lock().unwrap().clone())
    }

    async fn seed(&self, units: &[WorkUnit]) -> Result<(), AppError> {
        self.check_poisoned()?;
        let mut records = self.records.lock().unwrap();
        for unit in units {
            records
                .entry(unit.id())
                .or_insert_with(|| CheckpointRecord::pending(unit));
        }
        Ok(())
    }

    async fn claim(&self, unit: &WorkUnit) -> Result<bool, AppError> {
        self.check_poisoned()?;
        let mut records = self.records.lock().unwrap();
        let entry = records
            .entry(unit.id())
            .or_insert_with(|| CheckpointRecord::pending(unit));
        match entry.status {
            WorkStatus::InProgress | WorkStatus::Done => Ok(false),
            WorkStatus::Pending | WorkStatus::Failed => {
                entry.status = WorkStatus::InProgress;
                entry.attempt_count += 1;
                entry.last_error = None;
                entry.updated_at = Utc::now();
                Ok(true)
            }
        }
    }

    async fn mark_done(&self, unit_id: &str) -> Result<(), AppError> {
        self.check_poisoned()?;
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(unit_id) {
            if !record.status.is_terminal() {
                record.status = WorkStatus::Done;
                record.last_error = None;
                record.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, unit_id: &str, error: &str) -> Result<(), AppError> {
        self.check_poisoned()?;
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(unit_id) {
            if !record.status.is_terminal() {
                record.status = WorkStatus::Failed;
                record.last_error = Some(error.to_string());
                record.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn is_complete(&self) -> Result<bool, AppError> {
        self.check_poisoned()?;
        let records = self.records.lock().unwrap();
        Ok(!records
            .values()
            .any(|r| matches!(r.status, WorkStatus::Pending | WorkStatus::InProgress)))
    }

    async fn reset(&self) -> Result<(), AppError> {
        self.check_poisoned()?;
        self.records.lock().unwrap().clear();
        Ok(())
    }

    async fn recover_stale(&self) -> Result<u64, AppError> {
        self.check_poisoned()?;
        let mut records = self.records.lock().unwrap();
        let mut recovered = 0;
        for record in records.values_mut() {
            if record.status == WorkStatus::InProgress {
                record.status = WorkStatus::Pending;
                record.updated_at = Utc::now();
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn status_counts(&self) -> Result<Vec<(WorkStatus, i64)>, AppError> {
        self.check_poisoned()?;
        let records = self.records.lock().unwrap();
        let mut counts: HashMap<WorkStatus, i64> = HashMap::new();
        for record in records.values() {
            *counts.entry(record.status).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_by_key(|(status, _)| status.as_str());
        Ok(counts)
    }

    async fn failed_records(&self) -> Result<Vec<CheckpointRecord>, AppError> {
        self.check_poisoned()?;
        let records = self.records.lock().unwrap();
        let mut failed: Vec<_> = records
            .values()
            .filter(|r| r.status == WorkStatus::Failed)
            .cloned()
            .collect();
        failed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(failed)
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Sink that records every written record in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub written: Arc<Mutex<Vec<(WorkUnit, FilteredRecord)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written_ids(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(unit, _)| unit.id())
            .collect()
    }
}

impl OutputSink for MemorySink {
    async fn write(&self, unit: &WorkUnit, record: &FilteredRecord) -> Result<(), AppError> {
        self.written
            .lock()
            .unwrap()
            .push((unit.clone(), record.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Worker reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl crate::worker::WorkerReporter for MockReporter {
    fn report(&self, event: crate::worker::WorkerEvent<'_>) {
        let label = match &event {
            crate::worker::WorkerEvent::Started { .. } => "Started",
            crate::worker::WorkerEvent::UnitClaimed { .. } => "UnitClaimed",
            crate::worker::WorkerEvent::UnitSkipped { .. } => "UnitSkipped",
            crate::worker::WorkerEvent::UnitDone { .. } => "UnitDone",
            crate::worker::WorkerEvent::UnitFailed { .. } => "UnitFailed",
            crate::worker::WorkerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_claims_have_exactly_one_winner() {
        let store = MemoryStore::empty();
        let unit = make_unit("a.com", "1");
        store.seed(std::slice::from_ref(&unit)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let unit = unit.clone();
            handles.push(tokio::spawn(async move { store.claim(&unit).await }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_in_progress_recovers_as_claimable() {
        let store = MemoryStore::empty();
        let unit = make_unit("a.com", "1");

        // Claimed but never finished: a crashed worker.
        assert!(store.claim(&unit).await.unwrap());
        assert!(!store.claim(&unit).await.unwrap());

        assert_eq!(store.recover_stale().await.unwrap(), 1);
        assert_eq!(store.record(&unit.id()).unwrap().status, WorkStatus::Pending);
        assert!(store.claim(&unit).await.unwrap());
        assert_eq!(store.record(&unit.id()).unwrap().attempt_count, 2);
    }

    #[tokio::test]
    async fn test_terminal_marks_are_idempotent() {
        let store = MemoryStore::empty();
        let unit = make_unit("a.com", "1");

        store.claim(&unit).await.unwrap();
        store.mark_done(&unit.id()).await.unwrap();
        store.mark_done(&unit.id()).await.unwrap();
        store.mark_failed(&unit.id(), "late error").await.unwrap();

        let record = store.record(&unit.id()).unwrap();
        assert_eq!(record.status, WorkStatus::Done);
        assert!(record.last_error.is_none());
    }

    #[tokio::test]
    async fn test_is_complete_ignores_terminal_records() {
        let store = MemoryStore::empty();
        let first = make_unit("a.com", "1");
        let second = make_unit("a.com", "2");
        store.seed(&[first.clone(), second.clone()]).await.unwrap();
        assert!(!store.is_complete().await.unwrap());

        store.claim(&first).await.unwrap();
        store.mark_done(&first.id()).await.unwrap();
        store.claim(&second).await.unwrap();
        store.mark_failed(&second.id(), "not found").await.unwrap();

        assert!(store.is_complete().await.unwrap());
        store.reset().await.unwrap();
        assert!(store.is_empty());
    }
}
