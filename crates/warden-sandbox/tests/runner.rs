//! Process runner tests against real child processes.
#![allow(clippy::unwrap_used)]
#![cfg(unix)]

use std::time::{Duration, Instant};
use warden_core::{CommandRunner, GuardError};
use warden_sandbox::{ProcessRunner, RunLimits};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

fn runner(workspace: &std::path::Path) -> ProcessRunner {
    ProcessRunner::new(
        workspace,
        RunLimits {
            max_output_size: 64 * 1024,
            timeout: Duration::from_secs(10),
        },
    )
}

#[tokio::test]
async fn echo_returns_stdout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = runner(dir.path())
        .run("echo", &args(&["hello"]))
        .await
        .expect("echo should succeed");
    assert_eq!(out, "hello\n");
}

#[tokio::test]
async fn runs_in_workspace_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = dir.path().canonicalize().unwrap();
    let out = runner(&workspace).run("pwd", &[]).await.unwrap();
    assert_eq!(out.trim(), workspace.display().to_string());
}

#[tokio::test]
async fn environment_is_fixed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = runner(dir.path()).run("env", &[]).await.unwrap();
    let vars: Vec<&str> = out.lines().collect();
    assert!(vars.contains(&"TERM=dumb"));
    assert!(vars.contains(&"NO_COLOR=1"));
    assert!(vars.contains(&"LANG=C.UTF-8"));
    assert!(vars.iter().any(|v| v.starts_with("PATH=")));
    assert!(!vars.iter().any(|v| v.starts_with("CARGO_PKG_NAME=")));
}

#[tokio::test]
async fn stdin_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = runner(dir.path()).run("cat", &[]).await.unwrap();
    assert_eq!(out, "");
}

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = runner(dir.path())
        .run("sh", &args(&["-c", "echo oops >&2; exit 3"]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, GuardError::NonZeroExit { code: 3, ref stderr } if stderr == "oops"),
        "{err:?}"
    );
}

#[tokio::test]
async fn silent_failure_gets_placeholder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = runner(dir.path())
        .run("sh", &args(&["-c", "exit 1"]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, GuardError::NonZeroExit { code: 1, ref stderr } if stderr == "(no stderr)"),
        "{err:?}"
    );
}

#[tokio::test]
async fn killed_by_signal_reports_minus_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = runner(dir.path())
        .run("sh", &args(&["-c", "kill -9 $$"]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, GuardError::NonZeroExit { code: -1, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = runner(dir.path())
        .run("warden-no-such-program", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::Spawn { .. }), "{err:?}");
    assert_eq!(err.kind(), "execution");
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ProcessRunner::new(
        dir.path(),
        RunLimits {
            max_output_size: 1024,
            timeout: Duration::from_millis(200),
        },
    );
    let started = Instant::now();
    let err = runner.run("sleep", &args(&["5"])).await.unwrap_err();
    assert!(matches!(err, GuardError::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn output_cap_kills_the_process() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ProcessRunner::new(
        dir.path(),
        RunLimits {
            max_output_size: 1024,
            timeout: Duration::from_secs(10),
        },
    );
    let started = Instant::now();
    let err = runner.run("yes", &[]).await.unwrap_err();
    assert!(
        matches!(err, GuardError::OutputLimit { limit: 1024 }),
        "{err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn output_at_the_cap_is_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ProcessRunner::new(
        dir.path(),
        RunLimits {
            max_output_size: 4,
            timeout: Duration::from_secs(10),
        },
    );
    let out = runner.run("printf", &args(&["abcd"])).await.unwrap();
    assert_eq!(out, "abcd");
}
