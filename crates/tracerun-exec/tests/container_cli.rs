#![cfg(unix)]

//! Drives `ContainerEngine` against a shell script standing in for the CLI.
//! The script dispatches on the first subcommand (`version`, `run`, `ps`, `rm`).

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracerun_core::{ConnectionGuard, EngineError};
use tracerun_exec::{ContainerEngine, ContainerEngineConfig};

fn fake_cli(script: &str) -> ContainerEngine {
    let cfg = ContainerEngineConfig {
        program: "sh".into(),
        global_args: vec!["-c".into(), script.into(), "fake-cli".into()],
        connect_timeout_ms: 2_000,
        release_timeout_ms: 2_000,
        kill_grace_ms: 200,
        log_output: false,
        ..Default::default()
    };
    ContainerEngine::new(cfg).unwrap()
}

#[tokio::test]
async fn successful_run_captures_stdout() {
    let engine = fake_cli(
        r#"case "$1" in
             version) echo 27.0 ;;
             run) shift; while [ "$1" != "alpine:latest" ]; do shift; done; shift; echo "$@" ;;
             ps) ;;
           esac"#,
    );
    let cancel = CancellationToken::new();
    let guard = ConnectionGuard::connect(&engine, &cancel).await.unwrap();

    let out = guard
        .new_task("alpine:latest")
        .with_command(["echo", "Hello from Dagger!"])
        .run(&cancel)
        .await
        .unwrap();

    assert_eq!(out.exit_code, 0);
    assert_eq!(out.stdout, "echo Hello from Dagger!\n");
    guard.release().await.unwrap();
}

#[tokio::test]
async fn failing_version_check_is_connection_error() {
    let engine = fake_cli(r#"echo "Cannot connect to the Docker daemon" >&2; exit 1"#);
    let cancel = CancellationToken::new();

    match ConnectionGuard::connect(&engine, &cancel).await {
        Err(EngineError::Connection(msg)) => assert!(msg.contains("Cannot connect")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("connect should fail"),
    }
}

#[tokio::test]
async fn non_zero_exit_carries_code_and_stderr() {
    let engine = fake_cli(
        r#"case "$1" in
             version) echo 27.0 ;;
             run) echo "sh: nope: not found" >&2; exit 127 ;;
           esac"#,
    );
    let cancel = CancellationToken::new();
    let guard = ConnectionGuard::connect(&engine, &cancel).await.unwrap();

    let err = guard
        .new_task("alpine:latest")
        .with_command(["nope"])
        .run(&cancel)
        .await
        .unwrap_err();

    match err {
        EngineError::Execution { exit_code, stderr } => {
            assert_eq!(exit_code, 127);
            assert!(stderr.contains("not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
    guard.release().await.unwrap();
}

#[tokio::test]
async fn cancel_stops_a_long_run() {
    let engine = fake_cli(
        r#"case "$1" in
             version) echo 27.0 ;;
             run) exec sleep 30 ;;
           esac"#,
    );
    let cancel = CancellationToken::new();
    let guard = ConnectionGuard::connect(&engine, &cancel).await.unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let res = tokio::time::timeout(
        Duration::from_secs(5),
        guard.new_task("alpine:latest").with_command(["sleep", "30"]).run(&cancel),
    )
    .await
    .expect("run must return promptly after cancel");

    assert_eq!(res.unwrap_err(), EngineError::Cancelled);
    guard.release().await.unwrap();
}

#[tokio::test]
async fn release_removes_labelled_leftovers_once() {
    let marker = std::env::temp_dir().join(format!("tracerun-rm-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);
    let script = format!(
        r#"case "$1" in
             version) echo 27.0 ;;
             ps) echo abc123 ;;
             rm) echo "$@" >> '{}' ;;
           esac"#,
        marker.display()
    );
    let engine = fake_cli(&script);
    let cancel = CancellationToken::new();
    let guard = ConnectionGuard::connect(&engine, &cancel).await.unwrap();

    guard.release().await.unwrap();

    let log = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(log.trim(), "rm -f abc123");
    let _ = std::fs::remove_file(&marker);
}

#[tokio::test]
async fn binary_output_does_not_fail_a_successful_run() {
    // More than a pipe buffer of output after an invalid UTF-8 line.
    let engine = fake_cli(
        r#"case "$1" in
             version) echo 27.0 ;;
             run) printf '\377\376\n'; head -c 300000 /dev/zero | tr '\0' 'a'; exit 0 ;;
           esac"#,
    );
    let cancel = CancellationToken::new();
    let guard = ConnectionGuard::connect(&engine, &cancel).await.unwrap();

    let out = tokio::time::timeout(
        Duration::from_secs(10),
        guard.new_task("alpine:latest").with_command(["cat", "/bin/sh"]).run(&cancel),
    )
    .await
    .expect("run must finish")
    .unwrap();

    assert_eq!(out.exit_code, 0);
    assert_eq!(out.stdout.len(), engine.config().max_capture_bytes);
    assert!(out.stdout.bytes().all(|b| b == b'a'));
    guard.release().await.unwrap();
}
