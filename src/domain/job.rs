//! Job records tracking one unit of extraction work per target
//!
//! A Job is owned exclusively by the orchestrator for its lifetime and is
//! dropped once its result has been folded into the aggregate.

use serde::{Deserialize, Serialize};

use crate::domain::Target;
use crate::id::{generate_job_id, now_ms};

/// State of a job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for a worker
    Pending,
    /// Backend process running
    Running,
    /// Backend exited zero
    Succeeded,
    /// Backend exited non-zero, could not start, or loot could not be persisted
    Failed,
    /// Deadline fired and the backend was terminated
    TimedOut,
    /// Invocation cancelled before or during execution
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::TimedOut => "TimedOut",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Check if this state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    /// Check if this state represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Check if this state represents a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut | Self::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of work binding a Target to an invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job
    pub id: String,

    /// The invocation this job belongs to
    pub invocation_id: String,

    /// Position of the target in the resolved sequence
    pub index: usize,

    /// The extraction destination
    pub target: Target,

    /// Current state
    pub state: JobState,

    /// When this job was created (Unix ms)
    pub created_at: u64,

    /// When a worker claimed this job (Unix ms)
    pub started_at: Option<u64>,

    /// When this job reached a terminal state (Unix ms)
    pub completed_at: Option<u64>,
}

impl Job {
    /// Create a new pending job
    pub fn new(invocation_id: &str, index: usize, target: Target) -> Self {
        Self {
            id: generate_job_id(invocation_id, index),
            invocation_id: invocation_id.to_string(),
            index,
            target,
            state: JobState::Pending,
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark job as claimed by a worker
    pub fn mark_running(&mut self) {
        self.state = JobState::Running;
        self.started_at = Some(now_ms());
    }

    /// Mark job terminal with the given state
    pub fn mark_terminal(&mut self, state: JobState) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.completed_at = Some(now_ms());
    }
}

/// Terminal outcome of one job, as returned by the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// The job this result belongs to
    pub job_id: String,

    /// The extraction destination
    pub target: Target,

    /// Terminal state (never Pending or Running)
    pub state: JobState,

    /// Exit code if the backend process exited on its own
    pub exit_code: Option<i32>,

    /// Captured stdout, possibly partial on timeout or failure
    pub stdout: String,

    /// Captured stderr, possibly partial
    pub stderr: String,

    /// Error detail with a classification prefix, if any
    pub error: Option<String>,

    /// How long the execution took in milliseconds
    pub duration_ms: u64,

    /// Transient working area used by the backend, removed after claiming
    #[serde(skip)]
    pub scratch_dir: Option<std::path::PathBuf>,
}

impl JobResult {
    /// Truncated stdout for log lines
    pub fn output_summary(&self) -> String {
        truncate_string(&self.stdout, 200)
    }
}

/// Truncate a string to a maximum length, adding ellipsis if truncated
pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let cut = max_len.saturating_sub(3);
        let mut end = cut;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
