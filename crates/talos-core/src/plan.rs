use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::work::WorkUnit;

/// Deterministic expansion of domains × product ids into an ordered work
/// sequence.
///
/// The iteration order (domains outer, products inner) is stable across runs,
/// so checkpoint keys generated from it are reproducible. Empty input lists
/// produce an empty plan, not an error.
#[derive(Debug, Clone)]
pub struct WorkPlan {
    units: Vec<WorkUnit>,
}

impl WorkPlan {
    pub fn new(domains: &[String], product_ids: &[String]) -> Self {
        let mut units = Vec::with_capacity(domains.len() * product_ids.len());
        for domain in domains {
            for product_id in product_ids {
                units.push(WorkUnit::new(domain.clone(), product_id.clone()));
            }
        }
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// Shared cursor over the plan for concurrent workers.
    ///
    /// Each call to [`WorkFeed::next_unit`] hands out the next unit exactly
    /// once across all clones.
    pub fn feed(&self) -> WorkFeed {
        WorkFeed {
            units: Arc::new(self.units.clone()),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Cheap, cloneable pull handle over a [`WorkPlan`].
#[derive(Debug, Clone)]
pub struct WorkFeed {
    units: Arc<Vec<WorkUnit>>,
    next: Arc<AtomicUsize>,
}

impl WorkFeed {
    /// Take the next unit, or `None` when the sequence is exhausted.
    pub fn next_unit(&self) -> Option<WorkUnit> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.units.get(index).cloned()
    }

    /// Units not yet handed out.
    pub fn remaining(&self) -> usize {
        self.units
            .len()
            .saturating_sub(self.next.load(Ordering::Relaxed))
    }
}
