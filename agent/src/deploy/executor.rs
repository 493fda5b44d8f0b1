//! Deployment command executor

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::settings::{Settings, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECS};
use crate::deploy::models::{DeploymentOutcome, DeploymentSpec, FailureReason};

const READ_CHUNK: usize = 8 * 1024;

// Roughly 30 years, used when the configured timeout does not fit an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Runs a deployment spec and reports what happened
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, project_id: &str, spec: &DeploymentSpec) -> DeploymentOutcome;
}

/// Executor settings
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Wall-clock limit for the whole spec
    pub timeout: Duration,

    /// Combined stdout/stderr capture limit
    pub max_output_bytes: usize,

    /// Shell invoked as `<shell> -c <command>` for each step
    pub shell: String,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            shell: "sh".to_string(),
        }
    }
}

impl From<&Settings> for ExecutorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            timeout: settings.deploy_timeout,
            max_output_bytes: settings.max_output_bytes,
            shell: settings.shell.clone(),
        }
    }
}

/// Output collected across all steps of one spec
struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    limit: usize,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            limit,
        }
    }

    fn remaining(&self) -> usize {
        self.limit
            .saturating_sub(self.stdout.len() + self.stderr.len())
    }

    /// Append a chunk; returns false once the limit has been exceeded
    fn push(&mut self, chunk: &[u8], is_stderr: bool) -> bool {
        let keep = chunk.len().min(self.remaining());
        let target = if is_stderr {
            &mut self.stderr
        } else {
            &mut self.stdout
        };
        target.extend_from_slice(&chunk[..keep]);
        keep == chunk.len()
    }
}

/// Runs each command through the shell as a separate process
///
/// Commands run in order and the first one that fails ends the deployment.
/// A step is finished once its shell exits and both output pipes close, so a
/// command that starts a background job must redirect the job's output
/// (`server > app.log 2>&1 &`) or the step runs until the timeout.
pub struct ProcessExecutor {
    options: ExecutorOptions,
}

impl ProcessExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    async fn run_steps(
        &self,
        project_id: &str,
        spec: &DeploymentSpec,
        capture: &mut Capture,
    ) -> Result<Option<i32>, FailureReason> {
        let deadline = deadline_after(self.options.timeout);
        let mut last_code = None;
        let mut ran_any = false;

        for (index, command) in spec.commands.iter().enumerate() {
            if command.trim().is_empty() {
                debug!(project = project_id, step = index, "Skipping empty command");
                continue;
            }

            info!(project = project_id, step = index, command = %command, "Running command");
            last_code = self
                .run_step(command, &spec.working_directory, deadline, capture)
                .await?;
            ran_any = true;
        }

        if !ran_any {
            return Err(FailureReason::NoCommands);
        }
        Ok(last_code)
    }

    async fn run_step(
        &self,
        command: &str,
        working_directory: &Path,
        deadline: Instant,
        capture: &mut Capture,
    ) -> Result<Option<i32>, FailureReason> {
        let mut cmd = Command::new(&self.options.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| FailureReason::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        let streamed = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => stream_output(stdout, stderr, deadline, capture).await,
            _ => Ok(()),
        };

        let waited = match streamed {
            Ok(()) => match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(Ok(status)) => Ok(status),
                Ok(Err(e)) => Err(FailureReason::Spawn {
                    command: command.to_string(),
                    message: e.to_string(),
                }),
                Err(_) => Err(self.timeout_reason()),
            },
            Err(StreamError::Timeout) => Err(self.timeout_reason()),
            Err(StreamError::Overflow) => Err(FailureReason::OutputLimitExceeded {
                limit: capture.limit,
            }),
        };

        let status = match waited {
            Ok(status) => status,
            Err(reason) => {
                warn!(command = %command, reason = %reason, "Terminating command");
                terminate(&mut child).await;
                return Err(reason);
            }
        };

        if status.success() {
            return Ok(status.code());
        }

        match status.code() {
            Some(code) => Err(FailureReason::Exit {
                command: command.to_string(),
                code,
            }),
            None => Err(FailureReason::Signal {
                command: command.to_string(),
                signal: exit_signal(&status).unwrap_or(-1),
            }),
        }
    }

    fn timeout_reason(&self) -> FailureReason {
        FailureReason::Timeout {
            after: self.options.timeout,
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(ExecutorOptions::default())
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, project_id: &str, spec: &DeploymentSpec) -> DeploymentOutcome {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut capture = Capture::new(self.options.max_output_bytes);

        let result = self.run_steps(project_id, spec, &mut capture).await;

        let (succeeded, failure, exit_code) = match result {
            Ok(code) => (true, None, code),
            Err(reason) => {
                let code = match &reason {
                    FailureReason::Exit { code, .. } => Some(*code),
                    _ => None,
                };
                (false, Some(reason), code)
            }
        };

        DeploymentOutcome {
            project_id: project_id.to_string(),
            succeeded,
            stdout: String::from_utf8_lossy(&capture.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&capture.stderr).into_owned(),
            failure,
            exit_code,
            started_at,
            duration: started.elapsed(),
        }
    }
}

enum StreamError {
    Timeout,
    Overflow,
}

/// Read both pipes until they close, the deadline passes, or the cap is hit
async fn stream_output<O, E>(
    mut stdout: O,
    mut stderr: E,
    deadline: Instant,
    capture: &mut Capture,
) -> Result<(), StreamError>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = vec![0u8; READ_CHUNK];
    let mut err_buf = vec![0u8; READ_CHUNK];
    let mut out_open = true;
    let mut err_open = true;

    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(n) => {
                    if !capture.push(&out_buf[..n], false) {
                        return Err(StreamError::Overflow);
                    }
                }
            },
            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(n) => {
                    if !capture.push(&err_buf[..n], true) {
                        return Err(StreamError::Overflow);
                    }
                }
            },
            _ = &mut sleep => return Err(StreamError::Timeout),
        }
    }

    Ok(())
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}

/// Kill the step's whole process group and reap the child
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        // The child leads its own process group, see `process_group(0)`.
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            warn!(pid, error = %e, "Failed to kill process group");
        }
    }

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Child already exited");
    }
    let _ = child.wait().await;
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
