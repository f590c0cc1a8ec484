use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque structured response from the fetch collaborator.
///
/// Consumed only by the field projector; never persisted.
pub type RawDocument = serde_json::Value;

/// One (domain, product_id) pair, representing a single page to fetch.
///
/// Immutable once generated. The identity string doubles as the checkpoint
/// key and the output filename stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    pub domain: String,
    pub product_id: String,
}

impl WorkUnit {
    pub fn new(domain: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            product_id: product_id.into(),
        }
    }

    /// Checkpoint key: `{domain}_{product_id}`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.domain, self.product_id)
    }

    /// Deterministic output filename for this unit.
    pub fn output_filename(&self) -> String {
        format!("{}.json", self.id())
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.product_id)
    }
}

/// Status of a work unit in the checkpoint store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Done => "done",
            WorkStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkStatus::Done | WorkStatus::Failed)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WorkStatus::Pending),
            "in_progress" => Ok(WorkStatus::InProgress),
            "done" => Ok(WorkStatus::Done),
            "failed" => Ok(WorkStatus::Failed),
            _ => Err(format!("Unknown work status: {}", s)),
        }
    }
}

/// Durable record of a work unit's completion status.
///
/// Owned exclusively by the checkpoint store; workers only request
/// transitions, never mutate storage directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub unit_id: String,
    pub domain: String,
    pub product_id: String,
    pub status: WorkStatus,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Fresh Pending record for a unit, as created at generation time.
    pub fn pending(unit: &WorkUnit) -> Self {
        Self {
            unit_id: unit.id(),
            domain: unit.domain.clone(),
            product_id: unit.product_id.clone(),
            status: WorkStatus::Pending,
            attempt_count: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}
