use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::schema::FilteredRecord;
use crate::traits::OutputSink;
use crate::work::WorkUnit;

/// Writes one pretty-printed JSON file per completed unit into a directory.
///
/// Filenames follow `{domain}_{product_id}.json` and are unique by
/// construction, so concurrent workers never contend on a path.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    /// Create the sink, creating the output directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::SinkError(format!(
                "failed to create output directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, unit: &WorkUnit) -> PathBuf {
        self.dir.join(unit.output_filename())
    }
}

impl OutputSink for JsonDirSink {
    async fn write(&self, unit: &WorkUnit, record: &FilteredRecord) -> Result<(), AppError> {
        let path = self.path_for(unit);
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::SinkError(format!("failed to write {}: {e}", path.display())))?;
        tracing::debug!(unit = %unit, path = %path.display(), "Wrote record");
        Ok(())
    }
}
