//! Invocation lifecycle phases

use serde::{Deserialize, Serialize};

use crate::error::{HarvestrError, Result};

/// Phase of one invocation inside the orchestrator
///
/// Phases only move forward: Accepting -> Dispatching -> Draining ->
/// Completed. Accepting covers admission of resolved targets as pending
/// jobs, Dispatching hands jobs to the worker pool, Draining collects and
/// claims results, Completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Accepting,
    Dispatching,
    Draining,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Accepting => "accepting",
            Phase::Dispatching => "dispatching",
            Phase::Draining => "draining",
            Phase::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed)
    }

    fn can_transition_to(&self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Accepting, Phase::Dispatching)
                | (Phase::Dispatching, Phase::Draining)
                | (Phase::Draining, Phase::Completed)
        )
    }

    /// Move to the next phase, refusing skips and reversals
    pub fn advance(&mut self, next: Phase) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(HarvestrError::InvalidState(format!(
                "cannot move from {} to {}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
