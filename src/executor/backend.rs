//! Collection backend capability trait

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{CollectOptions, Target};
use crate::error::Result;

/// Raw outcome of one backend run against one target
///
/// Output may be partial when the run was cut short; the caller decides what
/// that means (timeout vs cancel).
#[derive(Debug, Clone, Default)]
pub struct BackendRun {
    /// Captured stdout
    pub stdout: String,

    /// Captured stderr
    pub stderr: String,

    /// Exit code when the process exited on its own
    pub exit_code: Option<i32>,

    /// True when the run was terminated through the cancellation token
    pub killed: bool,

    /// Transient working area the backend wrote into, if any
    pub scratch_dir: Option<PathBuf>,
}

/// Black-box extraction capability
///
/// Implementations launch (or simulate) one collection run per target and
/// react to `cancel` by terminating promptly, returning whatever output was
/// captured up to that point. A non-zero exit is a normal `Ok` outcome;
/// `Err` is reserved for environment problems (backend missing, unlaunchable)
/// that fail the whole invocation.
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    /// Verify the backend can run at all; called once before dispatch
    fn preflight(&self) -> Result<()>;

    /// Run one collection against one target
    async fn collect(
        &self,
        target: &Target,
        options: &CollectOptions,
        cancel: CancellationToken,
    ) -> Result<BackendRun>;
}
