//! Priority scheduling into the durable evaluation queue, and the worker
//! that drains it.

use crate::db::{QueueState, Repository};
use crate::domain::{ContractId, TimeMs};
use crate::engine::{priority, PriorityPlan};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{ApprovalEvaluator, EvaluationOutcome, PaymentService, WorkflowError};

/// Entries claimed per tick.
const CLAIM_BATCH: i64 = 32;

/// Rank a newly pending contract and enqueue its evaluation at
/// `pending_at + delay`.
///
/// An existing entry keeps its not-before time.
pub async fn schedule_evaluation(
    repo: &Repository,
    contract_id: &ContractId,
    pending_at: TimeMs,
    now: TimeMs,
) -> Result<PriorityPlan, WorkflowError> {
    let target = repo
        .get_priority_input(contract_id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("contract {} not found", contract_id)))?;
    let pending = repo.list_pending_priority_inputs().await?;

    let plan = priority::plan(&target, &pending, pending_at);
    let not_before = pending_at.plus_ms(plan.delay_ms);
    let created = repo.enqueue_evaluation(contract_id, not_before, now).await?;

    info!(
        contract_id = %contract_id,
        score = %plan.score,
        higher_count = plan.higher_count,
        delay_ms = plan.delay_ms,
        not_before = not_before.as_ms(),
        created,
        "evaluation scheduled"
    );
    Ok(plan)
}

/// Counts from one worker pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub recovered: usize,
    pub released: u64,
    pub claimed: usize,
    pub approved: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
    pub overdue: u64,
}

#[derive(Clone)]
pub struct QueueWorker {
    repo: Arc<Repository>,
    evaluator: ApprovalEvaluator,
    payments: PaymentService,
    lease_ms: i64,
}

impl QueueWorker {
    pub fn new(
        repo: Arc<Repository>,
        evaluator: ApprovalEvaluator,
        payments: PaymentService,
        lease_ms: i64,
    ) -> Self {
        Self {
            repo,
            evaluator,
            payments,
            lease_ms,
        }
    }

    /// Schedule pending contracts that have no queue entry, e.g. after a
    /// crash or a failed enqueue between the consent write and the schedule.
    pub async fn recover(&self, now: TimeMs) -> Result<usize, WorkflowError> {
        let mut scheduled = 0;
        for (contract_id, pending_at) in self.repo.list_unscheduled_pending().await? {
            match schedule_evaluation(&self.repo, &contract_id, pending_at.unwrap_or(now), now).await {
                Ok(_) => scheduled += 1,
                Err(e) => warn!(contract_id = %contract_id, error = %e, "re-queue failed"),
            }
        }
        if scheduled > 0 {
            warn!(scheduled, "re-queued pending contracts without an evaluation entry");
        }
        Ok(scheduled)
    }

    /// Run one pass: re-queue orphaned pending contracts, release stale
    /// claims, evaluate everything due, then sweep overdue payments.
    pub async fn run_due(&self, now: TimeMs) -> Result<TickSummary, WorkflowError> {
        let mut summary = TickSummary {
            recovered: self.recover(now).await?,
            released: self.repo.release_stale_claims(now, self.lease_ms).await?,
            ..TickSummary::default()
        };
        if summary.released > 0 {
            warn!(released = summary.released, "released stale evaluation claims");
        }

        let claimed = self.repo.claim_due_evaluations(now, CLAIM_BATCH).await?;
        summary.claimed = claimed.len();

        let results = join_all(claimed.iter().map(|id| self.evaluator.evaluate(id, now))).await;
        for (contract_id, result) in claimed.iter().zip(results) {
            let (state, error_text) = match result {
                Ok(EvaluationOutcome::Approved { .. }) => {
                    summary.approved += 1;
                    (QueueState::Done, None)
                }
                Ok(EvaluationOutcome::Rejected { .. }) => {
                    summary.rejected += 1;
                    (QueueState::Done, None)
                }
                Ok(EvaluationOutcome::Skipped) => {
                    summary.skipped += 1;
                    (QueueState::Done, None)
                }
                Err(e) => {
                    error!(contract_id = %contract_id, error = %e, "evaluation failed");
                    summary.failed += 1;
                    (QueueState::Failed, Some(e.to_string()))
                }
            };
            self.repo
                .finish_evaluation(contract_id, state, error_text.as_deref(), now)
                .await?;
        }

        summary.overdue = self.payments.mark_overdue(now.date()).await?;
        Ok(summary)
    }

    /// Poll the queue every `poll` until `shutdown` flips to true.
    pub fn spawn(self, poll: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(poll_ms = poll.as_millis() as u64, "evaluation worker started");
            let mut interval = tokio::time::interval(poll);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("evaluation worker stopping");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match self.run_due(TimeMs::now()).await {
                            Ok(summary) if summary.claimed > 0 || summary.recovered > 0 => {
                                info!(?summary, "evaluation tick")
                            }
                            Ok(_) => {}
                            Err(e) => error!(error = %e, "evaluation tick failed"),
                        }
                    }
                }
            }
        })
    }
}
