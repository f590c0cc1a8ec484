use std::collections::HashMap;
use std::future::Future;

use crate::error::AppError;
use crate::work::{CheckpointRecord, WorkStatus, WorkUnit};

/// Durable per-unit progress store, shared by all workers in a run.
///
/// Implementations must make `claim` atomic with respect to concurrent
/// workers: at most one worker ever holds InProgress for a given unit id.
/// All transition operations are serialized by the store, not the callers.
pub trait CheckpointStore: Send + Sync + Clone {
    /// Reconstruct prior run state. An absent store yields an empty mapping.
    fn load(
        &self,
    ) -> impl Future<Output = Result<HashMap<String, CheckpointRecord>, AppError>> + Send;

    /// Create Pending records for units that have none yet.
    ///
    /// Called once per run, before any worker starts, so that
    /// `is_complete` reflects the whole plan rather than only the units
    /// already touched. Existing records are left untouched.
    fn seed(&self, units: &[WorkUnit]) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Atomically transition a unit to InProgress.
    ///
    /// Returns `false` if the unit is already InProgress or Done. A Failed
    /// record from a prior run is re-claimable, which makes a re-run the
    /// retry pass over past failures. Each claim counts one attempt.
    fn claim(&self, unit: &WorkUnit) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Terminal transition to Done. Re-marking a terminal record is a no-op.
    fn mark_done(&self, unit_id: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Terminal transition to Failed, recording the last observed error.
    /// Re-marking a terminal record is a no-op.
    fn mark_failed(
        &self,
        unit_id: &str,
        error: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// True iff no record remains Pending or InProgress.
    fn is_complete(&self) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Clear all records so the next invocation starts fresh.
    fn reset(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Reset InProgress records left behind by a crashed run to Pending.
    ///
    /// Returns the number of recovered records. Called once at startup,
    /// before any worker claims a unit.
    fn recover_stale(&self) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Per-status record counts, for progress reporting.
    fn status_counts(
        &self,
    ) -> impl Future<Output = Result<Vec<(WorkStatus, i64)>, AppError>> + Send;

    /// All Failed records, newest first, for the end-of-run enumeration.
    fn failed_records(
        &self,
    ) -> impl Future<Output = Result<Vec<CheckpointRecord>, AppError>> + Send;
}
