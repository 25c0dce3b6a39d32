//! Scripted collection backend for tests
//!
//! Behaviors are keyed per target with a default fallback, so a single mock
//! can simulate a mixed fleet (fast success, crash, hang) in one invocation.
//! The mock also tracks observed concurrency so pool bounds are assertable.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::{CollectOptions, Target};
use crate::error::{HarvestrError, Result};
use crate::executor::backend::{BackendRun, CollectionBackend};

/// Scripted behavior for one target
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Exit zero with this stdout after a delay
    Succeed { stdout: String, delay_ms: u64 },
    /// Exit non-zero with output after a delay
    Fail {
        stdout: String,
        stderr: String,
        exit_code: i32,
        delay_ms: u64,
    },
    /// Emit partial output, then wait for cancellation
    Hang { partial: String },
    /// Never return and ignore cancellation; exercises the kill grace
    HangIgnoringCancel,
    /// Report the backend as unlaunchable
    Unavailable,
}

/// Test double for the collection backend
pub struct MockBackend {
    default: MockBehavior,
    per_target: HashMap<String, MockBehavior>,
    preflight_error: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Mock where every target succeeds instantly with the given stdout
    pub fn new(default: MockBehavior) -> Self {
        Self {
            default,
            per_target: HashMap::new(),
            preflight_error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script a specific target
    pub fn with_target(mut self, target: &str, behavior: MockBehavior) -> Self {
        self.per_target.insert(target.to_string(), behavior);
        self
    }

    /// Make preflight fail with this message
    pub fn with_preflight_error(mut self, message: &str) -> Self {
        self.preflight_error = Some(message.to_string());
        self
    }

    /// Targets in the order collect() was entered
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Highest number of concurrent collect() calls observed
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, target: &Target) -> MockBehavior {
        self.per_target
            .get(target.as_str())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Decrements the active counter even when the future is dropped mid-run
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CollectionBackend for MockBackend {
    fn preflight(&self) -> Result<()> {
        match &self.preflight_error {
            Some(message) => Err(HarvestrError::BackendUnavailable(message.clone())),
            None => Ok(()),
        }
    }

    async fn collect(
        &self,
        target: &Target,
        _options: &CollectOptions,
        cancel: CancellationToken,
    ) -> Result<BackendRun> {
        self.calls.lock().await.push(target.as_str().to_string());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(self.active.clone());

        match self.behavior_for(target) {
            MockBehavior::Succeed { stdout, delay_ms } => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Ok(BackendRun {
                        stdout,
                        exit_code: Some(0),
                        ..Default::default()
                    }),
                    _ = cancel.cancelled() => Ok(BackendRun {
                        killed: true,
                        ..Default::default()
                    }),
                }
            }
            MockBehavior::Fail {
                stdout,
                stderr,
                exit_code,
                delay_ms,
            } => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Ok(BackendRun {
                        stdout,
                        stderr,
                        exit_code: Some(exit_code),
                        ..Default::default()
                    }),
                    _ = cancel.cancelled() => Ok(BackendRun {
                        killed: true,
                        ..Default::default()
                    }),
                }
            }
            MockBehavior::Hang { partial } => {
                cancel.cancelled().await;
                Ok(BackendRun {
                    stdout: partial,
                    killed: true,
                    ..Default::default()
                })
            }
            MockBehavior::HangIgnoringCancel => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(BackendRun::default())
            }
            MockBehavior::Unavailable => Err(HarvestrError::BackendUnavailable(
                "mock backend scripted unavailable".to_string(),
            )),
        }
    }
}

impl MockBehavior {
    /// Succeed instantly with the given stdout
    pub fn succeed(stdout: &str) -> Self {
        Self::Succeed {
            stdout: stdout.to_string(),
            delay_ms: 0,
        }
    }

    /// Succeed with the given stdout after a delay
    pub fn succeed_after(stdout: &str, delay_ms: u64) -> Self {
        Self::Succeed {
            stdout: stdout.to_string(),
            delay_ms,
        }
    }

    /// Fail with an exit code and stderr
    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self::Fail {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
            delay_ms: 0,
        }
    }
}
