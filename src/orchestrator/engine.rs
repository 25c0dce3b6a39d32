//! Invocation orchestration
//!
//! Runs one invocation end to end:
//! 1. Admits resolved targets as pending jobs, one per target, FIFO
//! 2. Dispatches jobs to a worker pool bounded by the requested concurrency
//! 3. Drains results, claiming loot as each job finishes
//! 4. Reduces per-target outcomes into one aggregate and writes the manifest
//!
//! Jobs are isolated: a failure or timeout on one target never disturbs its
//! siblings, and results always come back in the original target order. The
//! one exception is an unlaunchable backend, which aborts the whole
//! invocation instead of failing target by target.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    AggregateResult, CollectOptions, Job, JobResult, JobState, Target, TargetOutcome,
};
use crate::error::{HarvestrError, Result};
use crate::executor::JobExecutor;
use crate::loot::LootStore;
use crate::orchestrator::phase::Phase;

/// Worker pool driver for one invocation at a time
pub struct Orchestrator {
    executor: JobExecutor,
    store: Arc<LootStore>,
}

impl Orchestrator {
    pub fn new(executor: JobExecutor, store: Arc<LootStore>) -> Self {
        Self { executor, store }
    }

    pub fn store(&self) -> &Arc<LootStore> {
        &self.store
    }

    /// Run one invocation over an ordered, deduplicated target set
    ///
    /// Cancelling `cancel` stops dispatching and kills running jobs; work
    /// already completed keeps its loot and its outcome. Returns `Err` only
    /// for invocation-level failures, an unlaunchable backend above all.
    pub async fn run(
        &self,
        invocation_id: &str,
        targets: Vec<Target>,
        options: CollectOptions,
        cancel: CancellationToken,
    ) -> Result<AggregateResult> {
        let started_at = Utc::now();
        let mut phase = Phase::Accepting;

        tracing::info!(
            invocation_id = %invocation_id,
            targets = targets.len(),
            concurrency = options.concurrency,
            timeout_secs = options.timeout_seconds,
            phase = %phase,
            "invocation accepted"
        );

        if let Err(e) = self.executor.backend().preflight() {
            tracing::error!(invocation_id = %invocation_id, error = %e, "backend preflight failed");
            return Err(e);
        }

        let jobs: Vec<Job> = targets
            .iter()
            .enumerate()
            .map(|(index, target)| Job::new(invocation_id, index, target.clone()))
            .collect();

        phase.advance(Phase::Dispatching)?;
        tracing::debug!(invocation_id = %invocation_id, phase = %phase, "dispatching jobs");

        let semaphore = Arc::new(Semaphore::new(options.concurrency));
        let options = Arc::new(options);
        let deadline = options.deadline();
        let (tx, mut rx) = mpsc::channel::<(usize, Result<JobResult>)>(jobs.len().max(1));

        for job in &jobs {
            let mut job = job.clone();
            let executor = self.executor.clone();
            let semaphore = semaphore.clone();
            let options = options.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };

                let outcome = match permit {
                    Some(_permit) => {
                        job.mark_running();
                        tracing::debug!(job_id = %job.id, target = %job.target, "job running");
                        // A child token scopes deadline kills to this job
                        let result = executor
                            .run(&job.id, &job.target, &options, deadline, cancel.child_token())
                            .await;
                        if let Ok(ref r) = result {
                            job.mark_terminal(r.state);
                        }
                        result
                    }
                    None => Ok(cancelled_before_start(&job)),
                };

                let index = job.index;
                let _ = tx.send((index, outcome)).await;
            });
        }
        drop(tx);

        phase.advance(Phase::Draining)?;
        tracing::debug!(invocation_id = %invocation_id, phase = %phase, "draining results");

        let mut slots: Vec<Option<TargetOutcome>> = (0..jobs.len()).map(|_| None).collect();
        let mut fatal: Option<HarvestrError> = None;

        while let Some((index, outcome)) = rx.recv().await {
            match outcome {
                Ok(result) => {
                    slots[index] = Some(self.claim_result(invocation_id, &result).await);
                }
                Err(e) => {
                    tracing::error!(
                        invocation_id = %invocation_id,
                        error = %e,
                        "aborting invocation"
                    );
                    cancel.cancel();
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let results: Vec<TargetOutcome> = slots
            .into_iter()
            .zip(&targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| TargetOutcome {
                    target: target.clone(),
                    state: JobState::Failed,
                    loot_count: 0,
                    error: Some("job worker terminated abnormally".to_string()),
                })
            })
            .collect();

        phase.advance(Phase::Completed)?;

        let aggregate = AggregateResult::new(
            invocation_id,
            results,
            self.store.root().to_path_buf(),
            started_at,
        );

        // The response carries the outcomes either way; losing the manifest
        // only loses the on-disk history entry
        if let Err(e) = self.store.write_manifest(&aggregate).await {
            tracing::error!(invocation_id = %invocation_id, error = %e, "manifest write failed");
        }

        tracing::info!(
            invocation_id = %invocation_id,
            status = %aggregate.status,
            loot = aggregate.total_loot(),
            phase = %phase,
            "invocation completed"
        );

        Ok(aggregate)
    }

    /// Claim loot for one finished job and fold it into a target outcome
    async fn claim_result(&self, invocation_id: &str, result: &JobResult) -> TargetOutcome {
        let mut outcome = match self.store.claim(result).await {
            Ok(claim) => {
                tracing::info!(
                    invocation_id = %invocation_id,
                    job_id = %result.job_id,
                    target = %result.target,
                    state = %result.state,
                    loot = claim.loot_count(),
                    new = claim.written,
                    duration_ms = result.duration_ms,
                    "job finished"
                );
                if claim.loot_count() == 0 && !result.stdout.is_empty() {
                    tracing::debug!(
                        job_id = %result.job_id,
                        output = %result.output_summary(),
                        "no loot parsed from backend output"
                    );
                }
                TargetOutcome::from_result(result, claim.loot_count())
            }
            Err(e) => {
                tracing::error!(
                    invocation_id = %invocation_id,
                    job_id = %result.job_id,
                    target = %result.target,
                    error = %e,
                    "loot could not be persisted"
                );
                let mut outcome = TargetOutcome::from_result(result, 0);
                outcome.demote(format!("persist: {}", e));
                outcome
            }
        };

        if let Some(scratch) = &result.scratch_dir {
            self.store.discard_scratch(scratch).await;
        }

        // A job the executor already marked failed keeps its own error
        if outcome.state == JobState::Failed && outcome.error.is_none() {
            outcome.error = Some("extraction failed".to_string());
        }
        outcome
    }
}

/// Terminal result for a job cancelled before it acquired a worker slot
fn cancelled_before_start(job: &Job) -> JobResult {
    JobResult {
        job_id: job.id.clone(),
        target: job.target.clone(),
        state: JobState::Cancelled,
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        error: Some("cancelled".to_string()),
        duration_ms: 0,
        scratch_dir: None,
    }
}
