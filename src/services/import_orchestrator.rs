//! Bulk lead import orchestrator
//!
//! Runs create-then-assign for every valid row with a fixed pool of workers:
//! - Workers share one atomic cursor into the candidate list
//! - Row-level failures are recorded and the run continues
//! - A no-assignee failure halts the run; in-flight rows drain, no new rows start
//! - Live progress is published on a `watch` channel
//!
//! All workers are polled on the caller's task, so remote calls overlap while
//! the shared accumulator is only ever locked between suspension points.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::defaults::HEADER_ROW_OFFSET;
use crate::services::column_mapper::check_mapping;
use crate::services::lead_api::{LeadApi, LeadApiError};
use crate::services::validator::classify_row;
use crate::types::{
    ColumnMap, FailureRecord, ImportProgress, ImportReport, ImportSummary, LeadInput, MappingIssue,
    RawRow, RowOutcome, RunState,
};

/// Reason recorded when the user stops a run
pub const CANCELLED_REASON: &str = "Import cancelled by user";

/// Error starting an import run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("an import is already running")]
    AlreadyRunning,
    #[error("column mapping is not usable: {}", format_issues(.0))]
    InvalidMapping(Vec<MappingIssue>),
}

fn format_issues(issues: &[MappingIssue]) -> String {
    issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}

/// Run-scoped accumulation, created fresh for every run
#[derive(Debug, Default)]
struct RunAccumulator {
    progress: ImportProgress,
    assignee_counts: BTreeMap<String, u32>,
    outcomes: BTreeMap<usize, RowOutcome>,
    failures: Vec<FailureRecord>,
    /// Spreadsheet row of the first fatal error
    halted_row: Option<usize>,
}

/// Immutable inputs plus shared mutable state of one run
struct RunContext<'a> {
    run_id: Uuid,
    rows: &'a [RawRow],
    column_map: ColumnMap,
    /// (original row index, payload) in file order
    candidates: Vec<(usize, LeadInput)>,
    cursor: AtomicUsize,
    halt: CancellationToken,
    acc: Mutex<RunAccumulator>,
}

/// Leaves `Running` on drop: to `final_state` once set, back to `Idle` if the
/// run future was dropped mid-way.
struct RunGuard<'a> {
    orchestrator: &'a ImportOrchestrator,
    final_state: RunState,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.orchestrator.state.lock() = self.final_state;
        *self.orchestrator.active.lock() = None;
    }
}

/// Bulk import orchestrator. One run at a time.
pub struct ImportOrchestrator {
    api: Arc<dyn LeadApi>,
    concurrency: usize,
    state: Mutex<RunState>,
    active: Mutex<Option<CancellationToken>>,
    halt_reason: Mutex<Option<String>>,
    progress: watch::Sender<ImportProgress>,
}

impl ImportOrchestrator {
    pub fn new(api: Arc<dyn LeadApi>, concurrency: usize) -> Self {
        let (progress, _) = watch::channel(ImportProgress::default());
        Self {
            api,
            concurrency: concurrency.max(1),
            state: Mutex::new(RunState::Idle),
            active: Mutex::new(None),
            halt_reason: Mutex::new(None),
            progress,
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Receive live progress of the current (or last) run
    pub fn subscribe(&self) -> watch::Receiver<ImportProgress> {
        self.progress.subscribe()
    }

    /// Stop claiming new rows in the current run. Returns false if nothing is running.
    pub fn cancel(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(token) => {
                self.halt_reason.lock().get_or_insert_with(|| CANCELLED_REASON.to_string());
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn begin(&self) -> Result<(RunGuard<'_>, CancellationToken), ImportError> {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            return Err(ImportError::AlreadyRunning);
        }
        *state = RunState::Running;

        let token = CancellationToken::new();
        *self.active.lock() = Some(token.clone());
        *self.halt_reason.lock() = None;
        Ok((RunGuard { orchestrator: self, final_state: RunState::Idle }, token))
    }

    /// Import every valid row of `rows` using a snapshot of `map`
    pub async fn run(&self, rows: &[RawRow], headers: &[String], map: &ColumnMap) -> Result<ImportReport, ImportError> {
        let issues = check_mapping(map, headers);
        if !issues.is_empty() {
            return Err(ImportError::InvalidMapping(issues));
        }

        let (mut guard, halt) = self.begin()?;
        let started = Instant::now();
        let column_map = map.clone();

        let mut acc = RunAccumulator::default();
        let mut candidates = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            match classify_row(row, &column_map) {
                Ok(lead) => candidates.push((idx, lead)),
                Err(rejection) => {
                    acc.outcomes.insert(idx, RowOutcome::Skipped { reason: rejection.to_string() });
                }
            }
        }
        acc.progress = ImportProgress {
            total: candidates.len() as u32,
            skipped: (rows.len() - candidates.len()) as u32,
            ..Default::default()
        };
        self.progress.send_replace(acc.progress.clone());

        let ctx = RunContext {
            run_id: Uuid::new_v4(),
            rows,
            column_map,
            candidates,
            cursor: AtomicUsize::new(0),
            halt,
            acc: Mutex::new(acc),
        };

        let workers = self.concurrency.min(ctx.candidates.len());
        info!(
            "Import run {} started: {} valid rows, {} skipped, {} workers via {}",
            ctx.run_id,
            ctx.candidates.len(),
            rows.len() - ctx.candidates.len(),
            workers,
            self.api.name()
        );

        join_all((0..workers).map(|worker_id| self.worker(worker_id, &ctx))).await;

        let report = self.fold(ctx, started);
        let final_state = report.state;
        guard.final_state = final_state;
        drop(guard);

        info!(
            "Import run {} finished ({:?}) in {}ms: {} success, {} failed, {} skipped, {} not attempted",
            report.run_id,
            final_state,
            report.summary.duration_ms,
            report.summary.success,
            report.summary.failed,
            report.summary.skipped,
            report.summary.not_attempted
        );
        Ok(report)
    }

    async fn worker(&self, worker_id: usize, ctx: &RunContext<'_>) {
        loop {
            if ctx.halt.is_cancelled() {
                break;
            }
            let slot = ctx.cursor.fetch_add(1, Ordering::SeqCst);
            let Some((idx, lead)) = ctx.candidates.get(slot) else {
                break;
            };
            let row_number = idx + HEADER_ROW_OFFSET;

            let result = self.submit(lead).await;

            let snapshot = {
                let mut acc = ctx.acc.lock();
                match result {
                    Ok(assignee) => {
                        debug!(
                            "Worker {}: row {} ({}) assigned to {}",
                            worker_id,
                            row_number,
                            lead.display_name(),
                            assignee
                        );
                        *acc.assignee_counts.entry(assignee.clone()).or_insert(0) += 1;
                        acc.outcomes.insert(*idx, RowOutcome::Success { assignee });
                        acc.progress.success += 1;
                        acc.progress.done += 1;
                    }
                    Err(e) if e.is_fatal() => {
                        let reason = e.to_string();
                        error!("Import run {} halted at row {}: {}", ctx.run_id, row_number, reason);
                        acc.outcomes.insert(*idx, RowOutcome::Halted { reason: reason.clone() });
                        acc.halted_row.get_or_insert(row_number);
                        self.halt_reason.lock().get_or_insert(reason);
                        ctx.halt.cancel();
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        warn!("Row {} failed: {}", row_number, reason);
                        acc.outcomes.insert(*idx, RowOutcome::Failed { reason: reason.clone() });
                        acc.failures.push(FailureRecord {
                            row_number,
                            reason,
                            raw: ctx.rows[*idx].clone(),
                        });
                        acc.progress.failed += 1;
                        acc.progress.done += 1;
                    }
                }
                if ctx.halt.is_cancelled() {
                    acc.progress.halted = true;
                    acc.progress.halt_reason = self.halt_reason.lock().clone();
                }
                acc.progress.clone()
            };
            self.progress.send_replace(snapshot);
        }
    }

    async fn submit(&self, lead: &LeadInput) -> Result<String, LeadApiError> {
        let lead_id = self.api.create_lead(lead).await?;
        self.api.assign_lead(&lead_id).await
    }

    fn fold(&self, ctx: RunContext<'_>, started: Instant) -> ImportReport {
        let halted = ctx.halt.is_cancelled();
        let halt_reason = if halted { self.halt_reason.lock().clone() } else { None };
        let mut acc = ctx.acc.into_inner();
        acc.failures.sort_by_key(|f| f.row_number);

        if halted {
            acc.progress.halted = true;
            acc.progress.halt_reason = halt_reason.clone();
            self.progress.send_replace(acc.progress.clone());
        }

        let progress = &acc.progress;
        let summary = ImportSummary {
            total: ctx.rows.len() as u32,
            success: progress.success,
            failed: progress.failed,
            skipped: progress.skipped,
            not_attempted: progress.total - progress.done,
            halted,
            halt_reason,
            halted_row: acc.halted_row,
            assignee_counts: acc.assignee_counts,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        ImportReport {
            run_id: ctx.run_id,
            finished_at: chrono::Utc::now(),
            state: if halted { RunState::Halted } else { RunState::Completed },
            summary,
            outcomes: acc.outcomes,
            failures: acc.failures,
            column_map: ctx.column_map,
        }
    }
}
