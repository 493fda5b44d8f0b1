//! Deployment models

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hook_api::OutcomeBody;
use thiserror::Error;
use uuid::Uuid;

/// One project's deployment recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec {
    /// Directory every command starts in
    pub working_directory: PathBuf,

    /// Commands in execution order; empty entries are no-op steps
    pub commands: Vec<String>,
}

impl DeploymentSpec {
    /// Commands that will actually be run
    pub fn runnable_commands(&self) -> impl Iterator<Item = &str> {
        self.commands
            .iter()
            .map(String::as_str)
            .filter(|command| !command.trim().is_empty())
    }
}

/// Why a deployment did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("configuration not found")]
    ConfigurationNotFound,

    #[error("working directory not found: {}", .0.display())]
    WorkingDirectoryNotFound(PathBuf),

    #[error("no commands configured")]
    NoCommands,

    #[error("deployment already in progress")]
    AlreadyInFlight,

    #[error("command `{command}` exited with status {code}")]
    Exit { command: String, code: i32 },

    #[error("command `{command}` was terminated by signal {signal}")]
    Signal { command: String, signal: i32 },

    #[error("timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("output exceeded {limit} bytes")]
    OutputLimitExceeded { limit: usize },

    #[error("failed to start `{command}`: {message}")]
    Spawn { command: String, message: String },
}

/// Result of one deployment attempt
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub project_id: String,
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub failure: Option<FailureReason>,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl DeploymentOutcome {
    /// An outcome for a deployment that never reached the executor
    pub fn rejected(project_id: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            project_id: project_id.into(),
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            failure: Some(reason),
            exit_code: None,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn failure_message(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

impl From<&DeploymentOutcome> for OutcomeBody {
    fn from(outcome: &DeploymentOutcome) -> Self {
        OutcomeBody {
            success: outcome.succeeded,
            project: outcome.project_id.clone(),
            stdout: outcome.stdout.clone(),
            stderr: outcome.stderr.clone(),
            error: outcome.failure_message(),
            exit_code: outcome.exit_code,
            duration_ms: outcome.duration.as_millis() as u64,
        }
    }
}

/// Aggregate result of one chain run
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub run_id: Uuid,
    pub chain_key: String,
    pub members: Vec<String>,
    pub outcomes: Vec<DeploymentOutcome>,
    pub all_succeeded: bool,
    pub generated_at: DateTime<Utc>,
}

impl ChainReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    /// Members that were never attempted because the chain stopped early
    pub fn skipped(&self) -> &[String] {
        let attempted = self.outcomes.len().min(self.members.len());
        &self.members[attempted..]
    }
}
