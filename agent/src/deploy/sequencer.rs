//! Chain sequencer
//!
//! Drives the resolver and executor over the members of a chain, one at a
//! time, and folds the outcomes into a [`ChainReport`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::settings::Settings;
use crate::deploy::discovery::directory_exists;
use crate::deploy::executor::Executor;
use crate::deploy::gate::{ConcurrencyLimit, DeployGate};
use crate::deploy::models::{ChainReport, DeploymentOutcome, FailureReason};
use crate::deploy::resolver::Resolver;
use crate::errors::HookError;

/// What to do after a chain member fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed member
    #[default]
    StopOnFirstFailure,

    /// Attempt every member regardless of earlier failures
    ContinueOnError,
}

/// Sequences deployments for chains and single projects
pub struct ChainSequencer {
    resolver: Resolver,
    executor: Arc<dyn Executor>,
    policy: FailurePolicy,
    gate: Option<Arc<DeployGate>>,
    limit: Option<ConcurrencyLimit>,
}

impl ChainSequencer {
    pub fn new(resolver: Resolver, executor: Arc<dyn Executor>) -> Self {
        Self {
            resolver,
            executor,
            policy: FailurePolicy::default(),
            gate: None,
            limit: None,
        }
    }

    /// Build a sequencer configured from service settings
    pub fn from_settings(
        resolver: Resolver,
        executor: Arc<dyn Executor>,
        settings: &Settings,
    ) -> Self {
        let policy = if settings.continue_on_error {
            FailurePolicy::ContinueOnError
        } else {
            FailurePolicy::StopOnFirstFailure
        };

        let mut sequencer = Self::new(resolver.with_chain_fallback(settings.chain_fallback), executor)
            .with_policy(policy);
        if settings.exclusive_projects {
            sequencer = sequencer.with_gate(Arc::new(DeployGate::new()));
        }
        if let Some(max) = settings.max_concurrent {
            sequencer = sequencer.with_limit(ConcurrencyLimit::new(max));
        }
        sequencer
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_gate(mut self, gate: Arc<DeployGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_limit(mut self, limit: ConcurrencyLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Deploy one project: resolve, check the directory, execute
    pub async fn deploy_project(&self, project_id: &str) -> DeploymentOutcome {
        let Some(spec) = self.resolver.resolve_project(project_id) else {
            warn!(project = project_id, "Project not found in configuration");
            return DeploymentOutcome::rejected(project_id, FailureReason::ConfigurationNotFound);
        };

        if !directory_exists(&spec.working_directory).await {
            warn!(
                project = project_id,
                path = %spec.working_directory.display(),
                "Working directory not found"
            );
            return DeploymentOutcome::rejected(
                project_id,
                FailureReason::WorkingDirectoryNotFound(spec.working_directory),
            );
        }

        let _guard = match &self.gate {
            Some(gate) => match gate.try_acquire(project_id) {
                Some(guard) => Some(guard),
                None => {
                    warn!(project = project_id, "Deployment already in progress, rejecting");
                    return DeploymentOutcome::rejected(project_id, FailureReason::AlreadyInFlight);
                }
            },
            None => None,
        };

        let _permit = match &self.limit {
            Some(limit) => limit.acquire().await,
            None => None,
        };

        info!(
            project = project_id,
            path = %spec.working_directory.display(),
            commands = spec.commands.len(),
            "Starting deployment"
        );
        let outcome = self.executor.execute(project_id, &spec).await;

        match &outcome.failure {
            None => info!(
                project = project_id,
                duration_ms = outcome.duration.as_millis() as u64,
                "Deployment succeeded"
            ),
            Some(reason) => error!(
                project = project_id,
                reason = %reason,
                stderr = %outcome.stderr,
                "Deployment failed"
            ),
        }

        outcome
    }

    /// Run every member of a chain in order
    ///
    /// Fails only when the chain itself cannot be resolved. Member failures
    /// are recorded in the report.
    pub async fn run_chain(&self, chain_key: &str) -> Result<ChainReport, HookError> {
        let members = self
            .resolver
            .resolve_chain(chain_key)
            .ok_or_else(|| HookError::ChainNotFound(chain_key.to_string()))?;

        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            chain = chain_key,
            members = %members.join(" -> "),
            "Starting deployment chain"
        );

        let mut outcomes = Vec::with_capacity(members.len());
        let mut stopped = false;

        for member in &members {
            let outcome = self.deploy_project(member).await;
            let failed = !outcome.succeeded;
            outcomes.push(outcome);

            if failed && self.policy == FailurePolicy::StopOnFirstFailure {
                warn!(run_id = %run_id, project = %member, "Stopping chain after failed member");
                stopped = true;
                break;
            }
        }

        let all_succeeded = !stopped && outcomes.iter().all(|outcome| outcome.succeeded);
        let report = ChainReport {
            run_id,
            chain_key: chain_key.to_string(),
            members,
            outcomes,
            all_succeeded,
            generated_at: Utc::now(),
        };

        info!(
            run_id = %run_id,
            chain = chain_key,
            succeeded = report.success_count(),
            attempted = report.outcomes.len(),
            total = report.members.len(),
            "Deployment chain finished"
        );

        Ok(report)
    }
}
