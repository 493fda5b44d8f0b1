//! Shared test fixtures

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deployhook::config::store::MemoryStore;
use deployhook::deploy::executor::Executor;
use deployhook::deploy::models::{DeploymentOutcome, DeploymentSpec, FailureReason};

/// Executor that records calls instead of spawning processes
#[derive(Default)]
pub struct ScriptedExecutor {
    failing: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, project_id: &str) -> Self {
        self.failing.insert(project_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, project_id: &str, spec: &DeploymentSpec) -> DeploymentOutcome {
        self.calls.lock().unwrap().push(project_id.to_string());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let failed = self.failing.contains(project_id);
        DeploymentOutcome {
            project_id: project_id.to_string(),
            succeeded: !failed,
            stdout: spec.commands.join("\n"),
            stderr: String::new(),
            failure: failed.then(|| FailureReason::Exit {
                command: spec.commands.first().cloned().unwrap_or_default(),
                code: 1,
            }),
            exit_code: Some(if failed { 1 } else { 0 }),
            started_at: Utc::now(),
            duration: self.delay,
        }
    }
}

/// Register a project in the store, pointing at `dir`
pub fn add_project(store: &MemoryStore, project_id: &str, dir: &Path, commands: &str) {
    let prefix = project_id.replace('-', "_").to_uppercase();
    store.set(format!("{}_PATH", prefix), dir.display().to_string());
    store.set(format!("{}_COMMANDS", prefix), commands);
}

pub fn shared_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}
