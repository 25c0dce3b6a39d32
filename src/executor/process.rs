//! Process-based collection backend
//!
//! Spawns the configured extraction executable once per target with piped
//! stdio, reading output incrementally so a killed run still yields whatever
//! it printed. Argument contract per run:
//! `<subcommand> [-u user] [-p pass] [-d domain] [-H hashes] [-k]
//! [-c collectors] <extra args> -o <scratch-dir> -t <target>`

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rand::Rng;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;
use crate::domain::{CollectOptions, Target};
use crate::error::{HarvestrError, Result};
use crate::executor::backend::{BackendRun, CollectionBackend};

/// Backend that shells out to the configured extraction executable
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: String,
    subcommand: String,
    extra_args: Vec<String>,
    work_root: PathBuf,
}

impl ProcessBackend {
    pub fn new(config: &BackendConfig, work_root: &Path) -> Self {
        Self {
            program: config.program.clone(),
            subcommand: config.subcommand.clone(),
            extra_args: config.extra_args.clone(),
            work_root: work_root.to_path_buf(),
        }
    }

    /// Per-run argument vector
    fn build_args(&self, target: &Target, options: &CollectOptions, scratch: &Path) -> Vec<String> {
        let mut args = vec![self.subcommand.clone()];

        if let Some(username) = &options.username {
            args.push("-u".to_string());
            args.push(username.clone());
        }
        if let Some(password) = &options.password {
            args.push("-p".to_string());
            args.push(password.clone());
        }
        if let Some(domain) = &options.domain {
            args.push("-d".to_string());
            args.push(domain.clone());
        }
        if let Some(hashes) = &options.hashes {
            args.push("-H".to_string());
            args.push(hashes.clone());
        }
        if options.kerberos {
            args.push("-k".to_string());
        }
        if let Some(collectors) = &options.collectors {
            args.push("-c".to_string());
            args.push(collectors.clone());
        }
        args.extend(self.extra_args.iter().cloned());

        args.push("-o".to_string());
        args.push(scratch.display().to_string());
        args.push("-t".to_string());
        args.push(target.as_str().to_string());
        args
    }

    fn scratch_dir_for(&self, target: &Target) -> PathBuf {
        let suffix: u16 = rand::rng().random();
        self.work_root
            .join(format!("{}-{:04x}", target.fs_key(), suffix))
    }
}

#[async_trait]
impl CollectionBackend for ProcessBackend {
    fn preflight(&self) -> Result<()> {
        if resolve_program(&self.program).is_some() {
            Ok(())
        } else {
            Err(HarvestrError::BackendUnavailable(format!(
                "'{}' is not an executable on PATH",
                self.program
            )))
        }
    }

    async fn collect(
        &self,
        target: &Target,
        options: &CollectOptions,
        cancel: CancellationToken,
    ) -> Result<BackendRun> {
        let scratch = self.scratch_dir_for(target);
        tokio::fs::create_dir_all(&scratch).await.map_err(|e| {
            HarvestrError::BackendUnavailable(format!(
                "cannot create working area {}: {}",
                scratch.display(),
                e
            ))
        })?;

        let mut command = Command::new(&self.program);
        command
            .args(self.build_args(target, options, &scratch))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            HarvestrError::BackendUnavailable(format!("cannot launch '{}': {}", self.program, e))
        })?;

        // Drain pipes concurrently so a killed child still yields its output
        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let mut killed = false;
        let status = tokio::select! {
            status = child.wait() => Some(status?),
            _ = cancel.cancelled() => {
                killed = true;
                if let Err(e) = child.kill().await {
                    tracing::warn!(target = %target, "failed to kill backend process: {}", e);
                }
                None
            }
        };

        // Pipes hit EOF once the child is gone
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(BackendRun {
            stdout,
            stderr,
            exit_code: status.and_then(|s| s.code()),
            killed,
            scratch_dir: Some(scratch),
        })
    }
}

async fn read_stream<R>(stream: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

/// Resolve a program name to an executable path
fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
