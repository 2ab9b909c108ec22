//! Tests for the client facade running against a fake helper.

#![cfg(unix)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use impacket_runner::client::{Client, ClientEvent};
use impacket_runner::config::{ConnectionConfig, HelperConfig, RunOptions};
use impacket_runner::runner::RunError;

use crate::support::fake_helper;

fn client(config: ConnectionConfig) -> Client {
    Client::with_helper(config, HelperConfig::default().with_path(fake_helper()))
}

fn record(client: &Client) -> Arc<Mutex<Vec<ClientEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.on(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

#[tokio::test]
async fn run_streams_events_and_returns_output() {
    let client = client(ConnectionConfig::new("H", "admin"));
    let events = record(&client);

    let outcome = client.run("ok").await.unwrap();
    assert_eq!(outcome.stdout, "line one\nline two\n");
    assert_eq!(outcome.stderr, "warning\n");

    let events = events.lock().unwrap();
    let stdout: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ClientEvent::Stdout { .. }))
        .filter_map(ClientEvent::output_line)
        .collect();
    assert_eq!(stdout, ["line one", "line two"]);
    assert!(events
        .iter()
        .any(|e| matches!(e, ClientEvent::Stderr { line, .. } if line == "warning")));
}

#[tokio::test]
async fn run_with_options_replaces_flags() {
    let config = ConnectionConfig::new("H", "domain\\login").with_options(RunOptions {
        reinstall: true,
        ..Default::default()
    });
    let client = client(config);

    let outcome = client
        .run_with_options(
            "echo-args",
            RunOptions {
                system: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.stdout, "-no-pass\n--system\ndomain/login@H\necho-args\n");

    let outcome = client.run("echo-args").await.unwrap();
    assert_eq!(
        outcome.stdout,
        "-no-pass\n--reinstall\ndomain/login@H\necho-args\n"
    );
}

#[tokio::test]
async fn password_is_passed_in_target() {
    let client = client(ConnectionConfig::new("10.0.0.5", "login@domain.name").with_password("p"));
    let outcome = client.run("echo-args").await.unwrap();
    assert_eq!(outcome.stdout, "domain.name/login:p@10.0.0.5\necho-args\n");
}

#[tokio::test]
async fn non_zero_exit_reports_output() {
    let client = client(ConnectionConfig::new("H", "admin"));
    let err = client.run("fail").await.unwrap_err();

    assert_eq!(err.to_string(), "Exit code: 3. access denied");
    assert_eq!(err.outcome().unwrap().stdout, "partial\n");
}

#[tokio::test]
async fn spawn_failure_emits_one_error_event() {
    let client = Client::with_helper(
        ConnectionConfig::new("H", "admin"),
        HelperConfig::default().with_path("/nonexistent/psexec/psexec.py"),
    );
    let events = record(&client);

    let request = client.request("whoami", None);
    let run_id = request.id;
    let err = client.execute(request).await.unwrap_err();
    assert!(matches!(err, RunError::Spawn(_)));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ClientEvent::Error { run_id: id, .. } if *id == run_id));
}

#[tokio::test]
async fn timeout_from_config_kills_helper() {
    let client = client(ConnectionConfig::new("H", "admin").with_timeout(200));
    let started = Instant::now();

    let err = client.run("hang").await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, RunError::NonZeroExit { .. }));
}

#[tokio::test]
async fn overlapping_runs_are_isolated() {
    let client = Arc::new(client(ConnectionConfig::new("H", "admin")));
    let events = record(&client);

    let reinstall = RunOptions {
        reinstall: true,
        ..Default::default()
    };
    let system = RunOptions {
        system: true,
        ..Default::default()
    };
    let first = client.request("echo-args", Some(reinstall));
    let second = client.request("echo-args", Some(system));
    let (first_id, second_id) = (first.id, second.id);

    let (a, b) = tokio::join!(client.execute(first), client.execute(second));
    assert_eq!(a.unwrap().stdout, "-no-pass\n--reinstall\nadmin@H\necho-args\n");
    assert_eq!(b.unwrap().stdout, "-no-pass\n--system\nadmin@H\necho-args\n");

    let events = events.lock().unwrap();
    let lines_for = |id: uuid::Uuid| -> Vec<String> {
        events
            .iter()
            .filter(|e| e.run_id() == id)
            .filter_map(|e| e.output_line().map(str::to_string))
            .collect()
    };
    assert_eq!(lines_for(first_id), ["-no-pass", "--reinstall", "admin@H", "echo-args"]);
    assert_eq!(lines_for(second_id), ["-no-pass", "--system", "admin@H", "echo-args"]);
}

#[tokio::test]
async fn subscribers_receive_lines() {
    let client = client(ConnectionConfig::new("H", "admin"));
    let mut rx = client.subscribe();

    client.run("ok").await.unwrap();

    let mut lines = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Some(line) = event.output_line() {
            lines.push(line.to_string());
        }
    }
    assert_eq!(lines.len(), 3);
    assert!(lines.contains(&"line one".to_string()));
    assert!(lines.contains(&"warning".to_string()));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn run_span_carries_only_run_id_and_logs_no_password() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let client = client(ConnectionConfig::new("10.9.8.7", "admin").with_password("hunter2"));
    let request = client.request("ok", None);
    let run_id = request.id;
    client.execute(request).await.unwrap();

    let text = logs.text();
    assert!(text.contains(&format!("run{{run_id={run_id}}}")), "logs: {text}");
    assert!(text.contains("admin:***@10.9.8.7"), "logs: {text}");
    assert!(!text.contains("hunter2"), "logs: {text}");
}
