//! Chain sequencer tests

use std::sync::Arc;
use std::time::Duration;

use deployhook::config::store::MemoryStore;
use deployhook::deploy::executor::Executor;
use deployhook::deploy::gate::{ConcurrencyLimit, DeployGate};
use deployhook::deploy::models::FailureReason;
use deployhook::deploy::resolver::{chain_key, Resolver, DEFAULT_CHAIN_KEY};
use deployhook::deploy::sequencer::{ChainSequencer, FailurePolicy};
use deployhook::errors::HookError;
use tempfile::TempDir;

use crate::common::{add_project, shared_store, ScriptedExecutor};

struct Fixture {
    store: Arc<MemoryStore>,
    dir: TempDir,
}

impl Fixture {
    fn new(projects: &[&str]) -> Self {
        let store = shared_store();
        let dir = tempfile::tempdir().unwrap();
        for project in projects {
            let project_dir = dir.path().join(project);
            std::fs::create_dir(&project_dir).unwrap();
            add_project(&store, project, &project_dir, &format!("deploy {}", project));
        }
        Self { store, dir }
    }

    fn chain(self, key: &str, members: &str) -> Self {
        self.store.set(key, members);
        self
    }

    fn sequencer(&self, executor: Arc<dyn Executor>) -> ChainSequencer {
        ChainSequencer::new(Resolver::new(self.store.clone()), executor)
    }
}

#[tokio::test]
async fn test_chain_stops_at_first_failure() {
    let fixture = Fixture::new(&["a", "b", "c"]).chain(DEFAULT_CHAIN_KEY, "a,b,c");
    let executor = Arc::new(ScriptedExecutor::new().failing("b"));
    let sequencer = fixture.sequencer(executor.clone());

    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert_eq!(executor.calls(), vec!["a", "b"]);
    assert_eq!(report.members, vec!["a", "b", "c"]);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[0].succeeded);
    assert!(!report.outcomes[1].succeeded);
    assert_eq!(report.skipped(), &["c".to_string()]);
    assert_eq!(report.success_count(), 1);
    assert!(!report.all_succeeded);
}

#[tokio::test]
async fn test_chain_all_members_succeed() {
    let fixture = Fixture::new(&["a", "b"]).chain(DEFAULT_CHAIN_KEY, "a, b");
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert_eq!(executor.calls(), vec!["a", "b"]);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.all_succeeded);
    assert!(report.skipped().is_empty());
    assert_eq!(report.chain_key, DEFAULT_CHAIN_KEY);
}

#[tokio::test]
async fn test_chain_members_run_one_at_a_time() {
    let fixture = Fixture::new(&["a", "b", "c"]).chain(DEFAULT_CHAIN_KEY, "a,b,c");
    let executor = Arc::new(ScriptedExecutor::new().with_delay(Duration::from_millis(20)));
    let sequencer = fixture.sequencer(executor.clone());

    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert!(report.all_succeeded);
    assert_eq!(executor.max_running(), 1);
}

#[tokio::test]
async fn test_chain_stops_on_unconfigured_member() {
    let fixture = Fixture::new(&["a", "c"]).chain(DEFAULT_CHAIN_KEY, "a,ghost,c");
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert_eq!(executor.calls(), vec!["a"]);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(
        report.outcomes[1].failure,
        Some(FailureReason::ConfigurationNotFound)
    );
    assert!(!report.all_succeeded);
}

#[tokio::test]
async fn test_chain_stops_on_missing_directory() {
    let fixture = Fixture::new(&["a", "b"]).chain(DEFAULT_CHAIN_KEY, "a,b");
    let missing = fixture.dir.path().join("a");
    std::fs::remove_dir(&missing).unwrap();
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert!(executor.calls().is_empty());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(
        report.outcomes[0].failure,
        Some(FailureReason::WorkingDirectoryNotFound(missing))
    );
}

#[tokio::test]
async fn test_continue_on_error_attempts_every_member() {
    let fixture = Fixture::new(&["a", "b", "c"]).chain(DEFAULT_CHAIN_KEY, "a,b,c");
    let executor = Arc::new(ScriptedExecutor::new().failing("b"));
    let sequencer = fixture
        .sequencer(executor.clone())
        .with_policy(FailurePolicy::ContinueOnError);

    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert_eq!(executor.calls(), vec!["a", "b", "c"]);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.success_count(), 2);
    assert!(!report.all_succeeded);
}

#[tokio::test]
async fn test_duplicate_members_run_twice() {
    let fixture = Fixture::new(&["a"]).chain(DEFAULT_CHAIN_KEY, "a,a");
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert_eq!(executor.calls(), vec!["a", "a"]);
    assert!(report.all_succeeded);
}

#[tokio::test]
async fn test_named_chain() {
    let fixture = Fixture::new(&["a", "b"])
        .chain(DEFAULT_CHAIN_KEY, "a")
        .chain("DEPLOYMENT_CHAIN_BACKEND", "b");
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let report = sequencer.run_chain(&chain_key(Some("backend"))).await.unwrap();

    assert_eq!(executor.calls(), vec!["b"]);
    assert_eq!(report.members, vec!["b"]);
}

#[tokio::test]
async fn test_unknown_chain_is_an_error() {
    let fixture = Fixture::new(&["a"]).chain(DEFAULT_CHAIN_KEY, "a");
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let result = sequencer.run_chain(&chain_key(Some("missing"))).await;

    assert!(matches!(result, Err(HookError::ChainNotFound(_))));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_chain_falls_back_when_enabled() {
    let fixture = Fixture::new(&["a"]).chain(DEFAULT_CHAIN_KEY, "a");
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = ChainSequencer::new(
        Resolver::new(fixture.store.clone()).with_chain_fallback(true),
        executor.clone(),
    );

    let report = sequencer.run_chain(&chain_key(Some("missing"))).await.unwrap();

    assert_eq!(executor.calls(), vec!["a"]);
    assert!(report.all_succeeded);
}

#[tokio::test]
async fn test_empty_default_chain_is_an_error() {
    let fixture = Fixture::new(&["a"]).chain(DEFAULT_CHAIN_KEY, " , ");
    let sequencer = fixture.sequencer(Arc::new(ScriptedExecutor::new()));

    let result = sequencer.run_chain(DEFAULT_CHAIN_KEY).await;

    assert!(matches!(result, Err(HookError::ChainNotFound(_))));
}

#[tokio::test]
async fn test_configuration_changes_apply_to_next_call() {
    let fixture = Fixture::new(&["a"]);
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let outcome = sequencer.deploy_project("late").await;
    assert_eq!(outcome.failure, Some(FailureReason::ConfigurationNotFound));

    let late_dir = fixture.dir.path().join("late");
    std::fs::create_dir(&late_dir).unwrap();
    add_project(&fixture.store, "late", &late_dir, "echo late");

    let outcome = sequencer.deploy_project("late").await;
    assert!(outcome.succeeded);
    assert_eq!(outcome.stdout, "echo late");
}

#[tokio::test]
async fn test_project_identifier_is_normalized() {
    let fixture = Fixture::new(&["api_server"]);
    let executor = Arc::new(ScriptedExecutor::new());
    let sequencer = fixture.sequencer(executor.clone());

    let outcome = sequencer.deploy_project("api-server").await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.project_id, "api-server");
}

#[tokio::test]
async fn test_gate_rejects_overlapping_deployments() {
    let fixture = Fixture::new(&["a"]);
    let executor = Arc::new(ScriptedExecutor::new().with_delay(Duration::from_millis(100)));
    let sequencer = fixture
        .sequencer(executor.clone())
        .with_gate(Arc::new(DeployGate::new()));

    let (first, second) = tokio::join!(sequencer.deploy_project("a"), sequencer.deploy_project("a"));

    let rejected = [&first, &second]
        .iter()
        .filter(|o| o.failure == Some(FailureReason::AlreadyInFlight))
        .count();
    assert_eq!(rejected, 1);
    assert_eq!(executor.calls().len(), 1);

    // Released once the first run finished
    assert!(sequencer.deploy_project("a").await.succeeded);
}

#[tokio::test]
async fn test_ungated_deployments_may_overlap() {
    let fixture = Fixture::new(&["a"]);
    let executor = Arc::new(ScriptedExecutor::new().with_delay(Duration::from_millis(100)));
    let sequencer = fixture.sequencer(executor.clone());

    let (first, second) = tokio::join!(sequencer.deploy_project("a"), sequencer.deploy_project("a"));

    assert!(first.succeeded);
    assert!(second.succeeded);
    assert_eq!(executor.max_running(), 2);
}

#[tokio::test]
async fn test_concurrency_limit_serializes_projects() {
    let fixture = Fixture::new(&["a", "b"]);
    let executor = Arc::new(ScriptedExecutor::new().with_delay(Duration::from_millis(50)));
    let sequencer = fixture
        .sequencer(executor.clone())
        .with_limit(ConcurrencyLimit::new(1));

    let (first, second) = tokio::join!(sequencer.deploy_project("a"), sequencer.deploy_project("b"));

    assert!(first.succeeded);
    assert!(second.succeeded);
    assert_eq!(executor.max_running(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_chain_with_process_executor() {
    use deployhook::deploy::executor::ProcessExecutor;

    let fixture = Fixture::new(&[]).chain(DEFAULT_CHAIN_KEY, "first,broken,last");
    for project in ["first", "broken", "last"] {
        std::fs::create_dir(fixture.dir.path().join(project)).unwrap();
    }
    let root = fixture.dir.path();
    add_project(&fixture.store, "first", &root.join("first"), "echo one > out.txt");
    add_project(&fixture.store, "broken", &root.join("broken"), "exit 7");
    add_project(&fixture.store, "last", &root.join("last"), "touch ran");

    let sequencer = fixture.sequencer(Arc::new(ProcessExecutor::default()));
    let report = sequencer.run_chain(DEFAULT_CHAIN_KEY).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(
        std::fs::read_to_string(root.join("first/out.txt")).unwrap(),
        "one\n"
    );
    assert_eq!(report.outcomes[1].exit_code, Some(7));
    assert!(!root.join("last/ran").exists());
    assert!(!report.all_succeeded);
}

#[test]
fn test_chain_runs_from_sync_context() {
    let fixture = Fixture::new(&["a"]).chain(DEFAULT_CHAIN_KEY, "a");
    let sequencer = fixture.sequencer(Arc::new(ScriptedExecutor::new()));

    let report = tokio_test::block_on(sequencer.run_chain(DEFAULT_CHAIN_KEY)).unwrap();

    assert!(report.all_succeeded);
}
