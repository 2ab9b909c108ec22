//! Tests for running the helper process to completion.

#![cfg(unix)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

use impacket_runner::helper::SpawnOptions;
use impacket_runner::runner::{NullSink, OutputStream, ProcessRunner, RunError};
use tokio_test::{assert_err, assert_ok};

use crate::support::fake_helper;

fn runner() -> ProcessRunner {
    ProcessRunner::new(fake_helper(), SpawnOptions::default())
}

fn args(command: &str) -> Vec<String> {
    vec!["-no-pass".to_string(), "D/U@H".to_string(), command.to_string()]
}

#[tokio::test]
async fn success_captures_both_streams() {
    let outcome = assert_ok!(runner().execute(&args("ok"), None, &NullSink).await);

    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout, "line one\nline two\n");
    assert_eq!(outcome.stderr, "warning\n");
}

#[tokio::test]
async fn lines_are_delivered_in_stream_order() {
    let seen = Mutex::new(Vec::new());
    let sink = |stream: OutputStream, line: &str| {
        seen.lock().unwrap().push((stream, line.to_string()));
    };

    runner().execute(&args("ok"), None, &sink).await.unwrap();

    let seen = seen.into_inner().unwrap();
    let stdout: Vec<_> = seen
        .iter()
        .filter(|(s, _)| *s == OutputStream::Stdout)
        .map(|(_, l)| l.as_str())
        .collect();
    let stderr: Vec<_> = seen
        .iter()
        .filter(|(s, _)| *s == OutputStream::Stderr)
        .map(|(_, l)| l.as_str())
        .collect();
    assert_eq!(stdout, ["line one", "line two"]);
    assert_eq!(stderr, ["warning"]);
}

#[tokio::test]
async fn crlf_lines_are_stripped() {
    let outcome = runner()
        .execute(&args("crlf"), None, &NullSink)
        .await
        .unwrap();
    assert_eq!(outcome.stdout, "Host Name\n\nOS Version\n");
}

#[tokio::test]
async fn non_zero_exit_keeps_output() {
    let err = assert_err!(runner().execute(&args("fail"), None, &NullSink).await);

    let message = err.to_string();
    assert!(message.contains('3'), "message: {message}");
    assert!(message.contains("access denied"), "message: {message}");
    assert_eq!(message, "Exit code: 3. access denied");

    assert_eq!(err.exit_code(), Some(3));
    let outcome = err.outcome().unwrap();
    assert_eq!(outcome.stdout, "partial\n");
    assert_eq!(outcome.stderr, "  access denied  \n");
}

#[tokio::test]
async fn arguments_reach_helper_unsplit() {
    let outcome = runner()
        .execute(
            &[
                "--system".to_string(),
                "CORP/admin:p w@H".to_string(),
                "echo-args".to_string(),
            ],
            None,
            &NullSink,
        )
        .await
        .unwrap();
    assert_eq!(outcome.stdout, "--system\nCORP/admin:p w@H\necho-args\n");
}

#[tokio::test]
async fn timeout_kills_hung_helper() {
    let started = Instant::now();
    let err = runner()
        .execute(&args("hang"), Some(Duration::from_millis(200)), &NullSink)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, RunError::NonZeroExit { .. }));
    assert_eq!(err.exit_code(), None);
    assert!(err.to_string().starts_with("Exit code: null."));
}

#[tokio::test]
async fn timeout_kills_helper_descendants() {
    let started = Instant::now();
    let err = runner()
        .execute(
            &args("hang-child"),
            Some(Duration::from_millis(200)),
            &NullSink,
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    let outcome = err.outcome().unwrap();
    assert_eq!(outcome.stdout, "started\n");
}

#[tokio::test]
async fn timeout_not_reached() {
    let outcome = runner()
        .execute(&args("ok"), Some(Duration::from_secs(30)), &NullSink)
        .await
        .unwrap();
    assert!(outcome.success());
}

#[tokio::test]
async fn missing_helper_is_spawn_error() {
    let runner = ProcessRunner::new("/nonexistent/psexec/psexec.py", SpawnOptions::default());
    let err = runner
        .execute(&args("ok"), None, &NullSink)
        .await
        .unwrap_err();

    assert!(err.is_spawn_error());
    assert!(err.outcome().is_none());
    assert_eq!(err.exit_code(), None);
}

#[tokio::test]
async fn shell_routing_preserves_arguments() {
    let runner = ProcessRunner::new(fake_helper(), SpawnOptions::default().shell(true));
    let outcome = runner
        .execute(
            &[
                "-no-pass".to_string(),
                "D/U@H".to_string(),
                "echo-args".to_string(),
            ],
            None,
            &NullSink,
        )
        .await
        .unwrap();
    assert_eq!(outcome.stdout, "-no-pass\nD/U@H\necho-args\n");
}

#[tokio::test]
async fn working_dir_is_applied() {
    let dir = tempfile::TempDir::new().unwrap();
    let runner = ProcessRunner::new(fake_helper(), SpawnOptions::default().working_dir(dir.path()));
    let outcome = runner.execute(&args("ok"), None, &NullSink).await.unwrap();
    assert!(outcome.success());
}
