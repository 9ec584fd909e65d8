//! Subprocess executor tests: exit status reporting, timeout handling,
//! output capping, and spawn-failure behavior.

use std::time::Duration;

use mcp_devtools_server::exec::{run_command, TIMEOUT_EXIT_STATUS};

const CAP: usize = 8 * 1024 * 1024;

#[tokio::test]
async fn captures_stdout_and_zero_status() {
    let tmp = tempfile::tempdir().unwrap();
    let result = run_command(
        "echo",
        &["hello"],
        tmp.path(),
        Duration::from_secs(5),
        CAP,
    )
    .await;

    assert_eq!(result.status, 0);
    assert_eq!(result.stdout, "hello\n");
    assert!(result.stderr.is_empty());
}

#[tokio::test]
async fn reports_nonzero_exit_without_erroring() {
    let tmp = tempfile::tempdir().unwrap();
    let result = run_command(
        "sh",
        &["-c", "echo oops >&2; exit 3"],
        tmp.path(),
        Duration::from_secs(5),
        CAP,
    )
    .await;

    assert_eq!(result.status, 3);
    assert_eq!(result.stderr, "oops\n");
}

#[tokio::test]
async fn timeout_kills_and_reports_124() {
    let tmp = tempfile::tempdir().unwrap();
    let started = std::time::Instant::now();
    let result = run_command(
        "sleep",
        &["30"],
        tmp.path(),
        Duration::from_millis(200),
        CAP,
    )
    .await;

    assert_eq!(result.status, TIMEOUT_EXIT_STATUS);
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "timeout must not hang the server"
    );
}

#[tokio::test]
async fn spawn_failure_is_status_one_with_description() {
    let tmp = tempfile::tempdir().unwrap();
    let result = run_command(
        "definitely-not-a-real-program-xyz",
        &[],
        tmp.path(),
        Duration::from_secs(5),
        CAP,
    )
    .await;

    assert_eq!(result.status, 1);
    assert!(result.stderr.starts_with("failed to spawn "));
    assert!(result.is_spawn_failure());
}

#[tokio::test]
async fn output_is_capped_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let long = "a".repeat(4096);
    let result = run_command(
        "echo",
        &[long.as_str()],
        tmp.path(),
        Duration::from_secs(5),
        100,
    )
    .await;

    assert_eq!(result.status, 0, "exceeding the cap is not a failure");
    assert_eq!(result.stdout.len(), 100);
}

#[tokio::test]
async fn arguments_are_not_shell_interpreted() {
    let tmp = tempfile::tempdir().unwrap();
    let result = run_command(
        "echo",
        &["$(touch pwned)", ";", "ls"],
        tmp.path(),
        Duration::from_secs(5),
        CAP,
    )
    .await;

    assert_eq!(result.status, 0);
    assert_eq!(result.stdout, "$(touch pwned) ; ls\n");
    assert!(!tmp.path().join("pwned").exists());
}
