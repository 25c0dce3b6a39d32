//! Deadline-enforcing executor wrapper
//!
//! Races a backend run against the per-job deadline. On expiry the job-scoped
//! token is cancelled (backends react by killing their child) and the backend
//! gets a short kill grace to hand back partial output before an empty
//! TimedOut result is synthesized. The worker is never blocked past
//! deadline + grace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::domain::{CollectOptions, JobResult, JobState, Target};
use crate::error::Result;
use crate::executor::backend::{BackendRun, CollectionBackend};

/// Runs one job against the backend with deadline and cancellation handling
#[derive(Clone)]
pub struct JobExecutor {
    backend: Arc<dyn CollectionBackend>,
    kill_grace: Duration,
}

impl JobExecutor {
    pub fn new(backend: Arc<dyn CollectionBackend>, kill_grace: Duration) -> Self {
        Self { backend, kill_grace }
    }

    /// Access to the wrapped backend, for preflight
    pub fn backend(&self) -> &Arc<dyn CollectionBackend> {
        &self.backend
    }

    /// Run one job to a terminal JobResult
    ///
    /// `Err` is reserved for invocation-level failures (BackendUnavailable);
    /// every target-scoped failure comes back as a JobResult.
    pub async fn run(
        &self,
        job_id: &str,
        target: &Target,
        options: &CollectOptions,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<JobResult> {
        let started = Instant::now();

        let collect = self.backend.collect(target, options, cancel.clone());
        tokio::pin!(collect);

        let mut timed_out = false;
        let run = tokio::select! {
            run = &mut collect => run?,
            _ = tokio::time::sleep(deadline) => {
                // An already-cancelled token means the caller cancelled first
                timed_out = !cancel.is_cancelled();
                cancel.cancel();
                match tokio::time::timeout(self.kill_grace, &mut collect).await {
                    Ok(run) => run?,
                    Err(_) => {
                        tracing::warn!(
                            job_id = %job_id,
                            target = %target,
                            "backend ignored cancellation past the kill grace"
                        );
                        BackendRun::default()
                    }
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let (state, error) = if timed_out {
            (
                JobState::TimedOut,
                Some(format!("timed out after {:.1}s", deadline.as_secs_f64())),
            )
        } else if run.killed || cancel.is_cancelled() {
            (JobState::Cancelled, Some("cancelled".to_string()))
        } else {
            match run.exit_code {
                Some(0) => (JobState::Succeeded, None),
                Some(code) => (JobState::Failed, Some(classify_failure(code, &run.stderr))),
                None => (
                    JobState::Failed,
                    Some("extraction failed: terminated by signal".to_string()),
                ),
            }
        };

        Ok(JobResult {
            job_id: job_id.to_string(),
            target: target.clone(),
            state,
            exit_code: run.exit_code,
            stdout: run.stdout,
            stderr: run.stderr,
            error,
            duration_ms,
            scratch_dir: run.scratch_dir,
        })
    }
}

const UNREACHABLE_MARKERS: &[&str] = &[
    "unreachable",
    "connection refused",
    "no route to host",
    "connection error",
    "could not connect",
    "connection timed out",
];

/// Classify a non-zero exit into an error detail string
///
/// Unreachable targets are recognized best-effort from stderr markers; the
/// job state stays Failed either way.
fn classify_failure(exit_code: i32, stderr: &str) -> String {
    let hint = stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| crate::domain::job::truncate_string(line, 120));

    let lowered = stderr.to_ascii_lowercase();
    if UNREACHABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return format!(
            "unreachable: {}",
            hint.unwrap_or_else(|| format!("exit {}", exit_code))
        );
    }

    match hint {
        Some(hint) => format!("extraction failed: exit {}: {}", exit_code, hint),
        None => format!("extraction failed: exit {}", exit_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::executor::mock::{MockBackend, MockBehavior};

    fn target(s: &str) -> Target {
        Target::parse(s).unwrap()
    }

    fn options() -> CollectOptions {
        CollectOptions::from_defaults(&JobsConfig::default())
    }

    fn executor(mock: MockBackend) -> JobExecutor {
        JobExecutor::new(Arc::new(mock), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_run_success() {
        let exec = executor(MockBackend::new(MockBehavior::succeed("secret-line")));
        let result = exec
            .run(
                "job-1",
                &target("10.0.0.1"),
                &options(),
                Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.state, JobState::Succeeded);
        assert_eq!(result.stdout, "secret-line");
        assert_eq!(result.exit_code, Some(0));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_run_failure_preserves_output() {
        let mock = MockBackend::new(MockBehavior::Fail {
            stdout: "partial-loot".to_string(),
            stderr: "backend blew up".to_string(),
            exit_code: 2,
            delay_ms: 0,
        });
        let result = executor(mock)
            .run(
                "job-1",
                &target("10.0.0.1"),
                &options(),
                Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.state, JobState::Failed);
        assert_eq!(result.stdout, "partial-loot");
        let error = result.error.unwrap();
        assert!(error.contains("extraction failed: exit 2"));
        assert!(error.contains("backend blew up"));
    }

    #[tokio::test]
    async fn test_run_unreachable_classification() {
        let mock = MockBackend::new(MockBehavior::fail(1, "Connection refused by 10.0.0.1"));
        let result = executor(mock)
            .run(
                "job-1",
                &target("10.0.0.1"),
                &options(),
                Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.state, JobState::Failed);
        assert!(result.error.unwrap().starts_with("unreachable:"));
    }

    #[tokio::test]
    async fn test_run_deadline_yields_timed_out_with_partial() {
        let mock = MockBackend::new(MockBehavior::Hang {
            partial: "half-a-secret".to_string(),
        });
        let started = Instant::now();
        let result = executor(mock)
            .run(
                "job-1",
                &target("10.0.0.1"),
                &options(),
                Duration::from_millis(200),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.state, JobState::TimedOut);
        assert_eq!(result.stdout, "half-a-secret");
        assert!(result.error.unwrap().starts_with("timed out after"));
    }

    #[tokio::test]
    async fn test_run_kill_grace_bounds_stubborn_backend() {
        let exec = executor(MockBackend::new(MockBehavior::HangIgnoringCancel));
        let started = Instant::now();
        let result = exec
            .run(
                "job-1",
                &target("10.0.0.1"),
                &options(),
                Duration::from_millis(100),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        // deadline + kill grace, with scheduling slack
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.state, JobState::TimedOut);
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_run_external_cancel_mid_run() {
        let exec = executor(MockBackend::new(MockBehavior::succeed_after("late", 5_000)));
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = exec
            .run(
                "job-1",
                &target("10.0.0.1"),
                &options(),
                Duration::from_secs(30),
                cancel,
            )
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.state, JobState::Cancelled);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_run_backend_unavailable_propagates() {
        let exec = executor(MockBackend::new(MockBehavior::Unavailable));
        let err = exec
            .run(
                "job-1",
                &target("10.0.0.1"),
                &options(),
                Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::HarvestrError::BackendUnavailable(_)));
    }

    #[test]
    fn test_classify_failure_plain() {
        let msg = classify_failure(3, "");
        assert_eq!(msg, "extraction failed: exit 3");
    }

    #[test]
    fn test_classify_failure_with_hint() {
        let msg = classify_failure(1, "\nsmb login failed\n");
        assert_eq!(msg, "extraction failed: exit 1: smb login failed");
    }

    #[test]
    fn test_classify_failure_unreachable() {
        let msg = classify_failure(1, "error: No route to host (10.0.0.9)");
        assert!(msg.starts_with("unreachable: "));
        assert!(msg.contains("No route to host"));
    }
}
