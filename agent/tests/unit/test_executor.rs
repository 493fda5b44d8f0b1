//! Process executor tests

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use deployhook::deploy::executor::{Executor, ExecutorOptions, ProcessExecutor};
use deployhook::deploy::models::{DeploymentSpec, FailureReason};

fn spec(dir: &Path, commands: &[&str]) -> DeploymentSpec {
    DeploymentSpec {
        working_directory: dir.to_path_buf(),
        commands: commands.iter().map(|c| c.to_string()).collect(),
    }
}

fn executor_with(timeout: Duration, max_output_bytes: usize) -> ProcessExecutor {
    ProcessExecutor::new(ExecutorOptions {
        timeout,
        max_output_bytes,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_captures_stdout_and_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    let outcome = executor
        .execute("api", &spec(dir.path(), &["echo hello", "echo oops >&2"]))
        .await;

    assert!(outcome.succeeded);
    assert!(outcome.failure.is_none());
    assert_eq!(outcome.project_id, "api");
    assert_eq!(outcome.stdout, "hello\n");
    assert_eq!(outcome.stderr, "oops\n");
    assert_eq!(outcome.exit_code, Some(0));
}

#[tokio::test]
async fn test_runs_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    let outcome = executor.execute("api", &spec(dir.path(), &["pwd -P"])).await;

    assert!(outcome.succeeded);
    let reported = PathBuf::from(outcome.stdout.trim());
    assert_eq!(reported, dir.path().canonicalize().unwrap());
}

#[tokio::test]
async fn test_failing_command_stops_remaining_commands() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    let outcome = executor
        .execute(
            "api",
            &spec(dir.path(), &["true", "false", "touch third-ran"]),
        )
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(
        outcome.failure,
        Some(FailureReason::Exit {
            command: "false".to_string(),
            code: 1
        })
    );
    assert_eq!(outcome.exit_code, Some(1));
    assert!(!dir.path().join("third-ran").exists());
}

#[tokio::test]
async fn test_commands_are_not_concatenated_into_one_shell() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    // Each step gets its own shell, so state like `cd` does not leak
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let outcome = executor
        .execute("api", &spec(dir.path(), &["cd sub", "touch marker"]))
        .await;

    assert!(outcome.succeeded);
    assert!(dir.path().join("marker").exists());
    assert!(!dir.path().join("sub/marker").exists());
}

#[tokio::test]
async fn test_empty_commands_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    let outcome = executor
        .execute("api", &spec(dir.path(), &["echo a", "", "echo b"]))
        .await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.stdout, "a\nb\n");
}

#[tokio::test]
async fn test_spec_without_commands_fails() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    let outcome = executor.execute("api", &spec(dir.path(), &["", "  "])).await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.failure, Some(FailureReason::NoCommands));
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor_with(Duration::from_millis(300), 1024);

    let started = Instant::now();
    let outcome = executor
        .execute(
            "slow",
            &spec(dir.path(), &["echo started; sleep 2; touch finished"]),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!outcome.succeeded);
    assert_eq!(
        outcome.failure,
        Some(FailureReason::Timeout {
            after: Duration::from_millis(300)
        })
    );
    assert_eq!(outcome.stdout, "started\n");

    // The killed shell must never reach its last command
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!dir.path().join("finished").exists());
}

#[tokio::test]
async fn test_timeout_spans_all_commands() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor_with(Duration::from_millis(500), 1024);

    let outcome = executor
        .execute(
            "slow",
            &spec(dir.path(), &["sleep 0.3", "sleep 0.3", "touch done"]),
        )
        .await;

    assert!(matches!(outcome.failure, Some(FailureReason::Timeout { .. })));
    assert!(!dir.path().join("done").exists());
}

#[tokio::test]
async fn test_oversized_timeout_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor_with(Duration::from_secs(u64::MAX), 1024);

    let outcome = executor.execute("api", &spec(dir.path(), &["echo ok"])).await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.stdout, "ok\n");
}

#[tokio::test]
async fn test_output_limit_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor_with(Duration::from_secs(10), 100);

    let outcome = executor
        .execute("noisy", &spec(dir.path(), &["yes deploy | head -c 100000"]))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(
        outcome.failure,
        Some(FailureReason::OutputLimitExceeded { limit: 100 })
    );
    assert_eq!(outcome.stdout.len() + outcome.stderr.len(), 100);
}

#[tokio::test]
async fn test_output_exactly_at_limit_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor_with(Duration::from_secs(10), 6);

    let outcome = executor.execute("api", &spec(dir.path(), &["printf abcdef"])).await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.stdout, "abcdef");
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::new(ExecutorOptions {
        shell: "/nonexistent/shell".to_string(),
        ..Default::default()
    });

    let outcome = executor.execute("api", &spec(dir.path(), &["true"])).await;

    assert!(!outcome.succeeded);
    assert!(matches!(outcome.failure, Some(FailureReason::Spawn { .. })));
}

#[tokio::test]
async fn test_partial_output_kept_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    let outcome = executor
        .execute(
            "api",
            &spec(dir.path(), &["echo building", "echo broken >&2; exit 3"]),
        )
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.stdout, "building\n");
    assert_eq!(outcome.stderr, "broken\n");
    assert_eq!(outcome.exit_code, Some(3));
}

#[tokio::test]
async fn test_signal_termination_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::default();

    let outcome = executor.execute("api", &spec(dir.path(), &["kill -9 $$"])).await;

    assert!(!outcome.succeeded);
    assert!(matches!(
        outcome.failure,
        Some(FailureReason::Signal { signal: 9, .. })
    ));
}

#[tokio::test]
async fn test_background_command_with_redirected_output() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor_with(Duration::from_secs(2), 1024);

    // Pipes are released once the background job stops writing to them
    let started = Instant::now();
    let outcome = executor
        .execute("svc", &spec(dir.path(), &["sleep 5 > /dev/null 2>&1 &"]))
        .await;

    assert!(outcome.succeeded);
    assert!(started.elapsed() < Duration::from_secs(2));
}
