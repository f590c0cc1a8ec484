use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::config::RunConfig;
use crate::error::AppError;
use crate::plan::{WorkFeed, WorkPlan};
use crate::retry::{FetchExecutor, RetryPolicy};
use crate::schema::project;
use crate::traits::{Fetcher, OutputSink};
use crate::work::{WorkStatus, WorkUnit};

/// Events emitted by workers for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    UnitClaimed {
        unit: &'a WorkUnit,
    },
    /// Another worker (or a prior run) already holds or finished the unit.
    UnitSkipped {
        unit: &'a WorkUnit,
    },
    UnitDone {
        unit: &'a WorkUnit,
    },
    UnitFailed {
        unit: &'a WorkUnit,
        error: &'a str,
    },
    Stopped {
        worker_id: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::info!(%worker_id, "Worker started");
            }
            WorkerEvent::UnitClaimed { unit } => {
                tracing::info!(%unit, "Unit claimed");
            }
            WorkerEvent::UnitSkipped { unit } => {
                tracing::debug!(%unit, "Unit already claimed or done, skipping");
            }
            WorkerEvent::UnitDone { unit } => {
                tracing::info!(%unit, "Unit done");
            }
            WorkerEvent::UnitFailed { unit, error } => {
                tracing::error!(%unit, %error, "Unit failed");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// One worker: pulls units from the shared feed, claims them in the
/// checkpoint store, and runs fetch → project → write for each.
///
/// Unit failures are isolated and recorded; only checkpoint-store errors
/// abort the worker (and, via the shared cancellation token, the pool).
pub struct WorkerService<F, S, O>
where
    F: Fetcher,
    S: CheckpointStore,
    O: OutputSink,
{
    worker_id: String,
    feed: WorkFeed,
    executor: FetchExecutor<F>,
    store: S,
    sink: O,
}

impl<F, S, O> WorkerService<F, S, O>
where
    F: Fetcher,
    S: CheckpointStore,
    O: OutputSink,
{
    pub fn new(
        worker_id: impl Into<String>,
        feed: WorkFeed,
        fetcher: F,
        policy: RetryPolicy,
        store: S,
        sink: O,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            feed,
            executor: FetchExecutor::new(fetcher, policy),
            store,
            sink,
        }
    }

    /// Run until the feed is exhausted or the token is cancelled.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), AppError> {
        reporter.report(WorkerEvent::Started {
            worker_id: &self.worker_id,
        });

        while !cancel_token.is_cancelled() {
            let Some(unit) = self.feed.next_unit() else {
                break;
            };

            let claimed = match self.store.claim(&unit).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    cancel_token.cancel();
                    return Err(e);
                }
            };
            if !claimed {
                reporter.report(WorkerEvent::UnitSkipped { unit: &unit });
                continue;
            }
            reporter.report(WorkerEvent::UnitClaimed { unit: &unit });

            if let Err(e) = self.process_unit(&unit, reporter).await {
                cancel_token.cancel();
                return Err(e);
            }
        }

        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.worker_id,
        });
        Ok(())
    }

    /// Run the pipeline for one claimed unit and record the outcome.
    ///
    /// Returns `Err` only for checkpoint-store failures; pipeline errors are
    /// absorbed into the unit's Failed record.
    async fn process_unit<WR: WorkerReporter>(
        &self,
        unit: &WorkUnit,
        reporter: &WR,
    ) -> Result<(), AppError> {
        match self.run_pipeline(unit).await {
            Ok(()) => {
                self.store.mark_done(&unit.id()).await?;
                reporter.report(WorkerEvent::UnitDone { unit });
            }
            Err(e) => {
                let message = e.to_string();
                reporter.report(WorkerEvent::UnitFailed {
                    unit,
                    error: &message,
                });
                self.store.mark_failed(&unit.id(), &message).await?;
            }
        }
        Ok(())
    }

    async fn run_pipeline(&self, unit: &WorkUnit) -> Result<(), AppError> {
        let raw = self.executor.fetch_with_retry(unit).await?;
        let record = project(&raw)?;
        self.sink.write(unit, &record).await?;
        Ok(())
    }
}

/// Outcome of a pool run, built from the checkpoint store before any reset.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub done: i64,
    pub failed: i64,
    /// Failed unit ids with their last recorded error, newest first.
    pub failed_units: Vec<(String, Option<String>)>,
    /// Whether the store was cleared because the run fully completed.
    pub store_reset: bool,
}

/// Run a fixed-size worker pool over the plan.
///
/// Seeds Pending records for the whole plan, spawns `worker_count` workers
/// sharing the feed, store, and sink (each with its own executor so pacing
/// is per worker), waits for all of them, and summarizes the outcome. When
/// every unit has reached a terminal state the store is reset so the next
/// invocation starts fresh.
pub async fn run_pool<F, S, O, R>(
    plan: &WorkPlan,
    fetcher: F,
    store: S,
    sink: O,
    config: &RunConfig,
    cancel_token: CancellationToken,
    reporter: Arc<R>,
) -> Result<RunSummary, AppError>
where
    F: Fetcher + 'static,
    S: CheckpointStore + 'static,
    O: OutputSink + 'static,
    R: WorkerReporter + 'static,
{
    config.validate()?;
    store.seed(plan.units()).await?;

    tracing::info!(
        units = plan.len(),
        workers = config.worker_count,
        "Starting run"
    );

    let feed = plan.feed();
    let policy = RetryPolicy::from_run_config(config);

    let mut handles = Vec::with_capacity(config.worker_count);
    for _ in 0..config.worker_count {
        let worker_id = format!("worker-{}", &Uuid::new_v4().to_string()[..8]);
        let service = WorkerService::new(
            worker_id,
            feed.clone(),
            fetcher.clone(),
            policy.clone(),
            store.clone(),
            sink.clone(),
        );
        let token = cancel_token.clone();
        let reporter = Arc::clone(&reporter);
        handles.push(tokio::spawn(async move {
            service.run(token, reporter.as_ref()).await
        }));
    }

    let mut first_error: Option<AppError> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(AppError::Generic(format!("worker task failed: {e}")));
                }
            }
        }
    }
    if let Some(error) = first_error {
        return Err(error);
    }

    let counts = store.status_counts().await?;
    let done = counts
        .iter()
        .find(|(status, _)| *status == WorkStatus::Done)
        .map(|(_, n)| *n)
        .unwrap_or(0);

    let failed_list = store.failed_records().await?;
    let failed = failed_list.len() as i64;
    let failed_units: Vec<(String, Option<String>)> = failed_list
        .into_iter()
        .map(|r| (r.unit_id, r.last_error))
        .collect();

    let store_reset = store.is_complete().await?;
    if store_reset {
        tracing::info!(done, failed, "Run complete, clearing checkpoint store");
        store.reset().await?;
    } else {
        tracing::warn!(done, failed, "Run interrupted, checkpoint store kept for resume");
    }

    Ok(RunSummary {
        done,
        failed,
        failed_units,
        store_reset,
    })
}
