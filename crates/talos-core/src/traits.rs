use std::future::Future;

use crate::error::AppError;
use crate::schema::FilteredRecord;
use crate::work::{RawDocument, WorkUnit};

/// Fetches the raw product document for a work unit.
///
/// The core depends only on this contract, not on how documents are
/// retrieved or parsed. Implementations report failures through the typed
/// error taxonomy so the retry executor can classify them.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, unit: &WorkUnit)
    -> impl Future<Output = Result<RawDocument, AppError>> + Send;
}

/// Persists one filtered record per completed work unit.
///
/// Output names are unique by construction, so implementations need no
/// cross-worker coordination.
pub trait OutputSink: Send + Sync + Clone {
    fn write(
        &self,
        unit: &WorkUnit,
        record: &FilteredRecord,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op OutputSink for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullSink;

impl OutputSink for NullSink {
    async fn write(&self, _unit: &WorkUnit, _record: &FilteredRecord) -> Result<(), AppError> {
        Ok(())
    }
}
