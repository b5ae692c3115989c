// src/process/orchestrate.rs

use futures::{stream::FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::{ArchiveUnitProcessor, ProcessSummary};
use crate::config::ExecutionMode;
use crate::error::{Error, Result};
use crate::model::ArchiveMember;

/// One unit of batch work. Implemented by the archive processor; the seam
/// lets the scheduling policy be exercised on its own.
pub trait UnitTask: Send + Sync + 'static {
    fn run(&self, member: &ArchiveMember) -> Result<ProcessSummary>;
}

impl UnitTask for ArchiveUnitProcessor {
    fn run(&self, member: &ArchiveMember) -> Result<ProcessSummary> {
        self.process(member)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub units_total: usize,
    pub units_completed: usize,
    pub units_failed: usize,
    /// Units that never started because an earlier unit failed.
    pub units_cancelled: usize,
    pub tables: ProcessSummary,
}

enum UnitOutcome {
    Ran(ArchiveMember, Result<ProcessSummary>),
    Skipped,
}

/// Runs one task per archive member on a bounded pool; the first failure
/// stops all unstarted work and is returned once in-flight units settle.
pub struct BatchOrchestrator<U> {
    unit: Arc<U>,
    workers: usize,
    mode: ExecutionMode,
    cancel: CancellationToken,
}

impl<U: UnitTask> BatchOrchestrator<U> {
    pub fn new(unit: U, workers: usize, mode: ExecutionMode) -> Self {
        Self {
            unit: Arc::new(unit),
            workers: workers.max(1),
            mode,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the batch from outside, e.g. on Ctrl-C.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[instrument(level = "info", skip(self, members), fields(units = members.len(), mode = ?self.mode))]
    pub async fn run(&self, members: Vec<ArchiveMember>) -> Result<BatchSummary> {
        let start = Instant::now();
        let result = match self.mode {
            ExecutionMode::Sequential => {
                let unit = Arc::clone(&self.unit);
                let cancel = self.cancel.clone();
                tokio::task::spawn_blocking(move || run_sequential(unit.as_ref(), &cancel, members))
                    .await
                    .map_err(|e| Error::Worker {
                        message: e.to_string(),
                    })?
            }
            ExecutionMode::Parallel => self.run_parallel(members).await,
        };
        info!(elapsed = ?start.elapsed(), ok = result.is_ok(), "batch finished");
        result
    }

    async fn run_parallel(&self, members: Vec<ArchiveMember>) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            units_total: members.len(),
            ..Default::default()
        };
        let mut first_error: Option<Error> = None;
        let mut queue = members.into_iter();
        let mut tasks = FuturesUnordered::new();

        loop {
            // top the pool up, unless a failure has been seen
            while tasks.len() < self.workers && !self.cancel.is_cancelled() {
                let Some(member) = queue.next() else { break };
                let unit = Arc::clone(&self.unit);
                let cancel = self.cancel.clone();
                tasks.push(tokio::task::spawn_blocking(move || {
                    if cancel.is_cancelled() {
                        return UnitOutcome::Skipped;
                    }
                    let result = unit.run(&member);
                    UnitOutcome::Ran(member, result)
                }));
            }

            let Some(joined) = tasks.next().await else {
                break;
            };

            let failure = match joined {
                Ok(UnitOutcome::Ran(member, Ok(unit_summary))) => {
                    debug!(%member, "unit completed");
                    summary.units_completed += 1;
                    summary.tables.add(unit_summary);
                    None
                }
                Ok(UnitOutcome::Ran(member, Err(e))) => {
                    error!(%member, error = %e, "unit failed");
                    Some(e)
                }
                Ok(UnitOutcome::Skipped) => {
                    summary.units_cancelled += 1;
                    None
                }
                Err(join_err) => {
                    error!(error = %join_err, "unit task aborted");
                    Some(Error::Worker {
                        message: join_err.to_string(),
                    })
                }
            };

            if let Some(e) = failure {
                summary.units_failed += 1;
                if first_error.is_none() {
                    self.cancel.cancel();
                    first_error = Some(e);
                }
            }
        }

        summary.units_cancelled += queue.len();
        report(&summary);
        match first_error {
            Some(e) => Err(e),
            None if self.cancel.is_cancelled() => Err(Error::Worker {
                message: "batch cancelled".into(),
            }),
            None => Ok(summary),
        }
    }
}

fn run_sequential<U: UnitTask>(
    unit: &U,
    cancel: &CancellationToken,
    members: Vec<ArchiveMember>,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary {
        units_total: members.len(),
        ..Default::default()
    };
    for (idx, member) in members.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.units_cancelled = members.len() - idx;
            report(&summary);
            return Err(Error::Worker {
                message: "batch cancelled".into(),
            });
        }
        match unit.run(member) {
            Ok(s) => {
                summary.units_completed += 1;
                summary.tables.add(s);
            }
            Err(e) => {
                error!(%member, error = %e, "unit failed");
                summary.units_failed += 1;
                summary.units_cancelled = members.len() - idx - 1;
                report(&summary);
                return Err(e);
            }
        }
    }
    report(&summary);
    Ok(summary)
}

fn report(summary: &BatchSummary) {
    info!(
        total = summary.units_total,
        completed = summary.units_completed,
        failed = summary.units_failed,
        cancelled = summary.units_cancelled,
        lines = summary.tables.lines,
        tables_written = summary.tables.tables_written,
        tables_present = summary.tables.tables_present,
        tables_missing_spec = summary.tables.tables_missing_spec,
        "batch summary"
    );
}
