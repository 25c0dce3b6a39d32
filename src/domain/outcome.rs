//! Reduced invocation outcomes
//!
//! TargetOutcome summarizes one job for the caller; AggregateResult is the
//! single response for a whole invocation, constructed once at the end of
//! orchestration and never mutated. Serialized field names follow the
//! protocol's camelCase contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::{JobResult, JobState, Target};

/// Overall status of an invocation across all of its jobs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OverallStatus {
    /// Every job succeeded
    #[serde(rename = "All-Succeeded")]
    AllSucceeded,
    /// At least one success and at least one non-success
    Partial,
    /// Zero successes
    #[serde(rename = "All-Failed")]
    AllFailed,
}

impl OverallStatus {
    /// Reduce terminal job states into one overall status
    ///
    /// TimedOut and Cancelled count as failures. An empty slice reduces to
    /// AllFailed; orchestration rejects empty target sets before this point.
    pub fn reduce<I>(states: I) -> Self
    where
        I: IntoIterator<Item = JobState>,
    {
        let mut successes = 0usize;
        let mut total = 0usize;
        for state in states {
            total += 1;
            if state.is_success() {
                successes += 1;
            }
        }

        if total > 0 && successes == total {
            Self::AllSucceeded
        } else if successes == 0 {
            Self::AllFailed
        } else {
            Self::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllSucceeded => "All-Succeeded",
            Self::Partial => "Partial",
            Self::AllFailed => "All-Failed",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-target summary reported back to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetOutcome {
    pub target: Target,
    pub state: JobState,
    #[serde(rename = "lootCount")]
    pub loot_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetOutcome {
    /// Summarize a job result plus the number of loot records committed for it
    pub fn from_result(result: &JobResult, loot_count: usize) -> Self {
        Self {
            target: result.target.clone(),
            state: result.state,
            loot_count,
            error: result.error.clone(),
        }
    }

    /// Demote this outcome to Failed, recording why
    ///
    /// Used when the job's loot could not be persisted: the caller cannot
    /// rely on unpersisted loot, so reporting success would overstate it.
    pub fn demote(&mut self, error: String) {
        self.state = JobState::Failed;
        self.error = Some(error);
    }
}

/// The single reduced response for a whole invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(rename = "invocationId")]
    pub invocation_id: String,

    pub status: OverallStatus,

    /// Per-target outcomes in original resolution order
    pub results: Vec<TargetOutcome>,

    /// Loot store root holding this invocation's records
    #[serde(rename = "lootPath")]
    pub loot_path: PathBuf,

    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,

    #[serde(rename = "completedAt")]
    pub completed_at: DateTime<Utc>,
}

impl AggregateResult {
    /// Construct the final aggregate from ordered per-target outcomes
    pub fn new(
        invocation_id: &str,
        results: Vec<TargetOutcome>,
        loot_path: PathBuf,
        started_at: DateTime<Utc>,
    ) -> Self {
        let status = OverallStatus::reduce(results.iter().map(|r| r.state));
        Self {
            invocation_id: invocation_id.to_string(),
            status,
            results,
            loot_path,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Total loot records committed across all targets
    pub fn total_loot(&self) -> usize {
        self.results.iter().map(|r| r.loot_count).sum()
    }
}
