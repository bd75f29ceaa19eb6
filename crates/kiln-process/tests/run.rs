use kiln_process::{run_command, CommandRunner, DefaultCommandRunner, RunOptions};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

fn helper() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kiln_process_test_helper"))
}

#[test]
fn truncates_large_stdout() {
    let opts = RunOptions {
        timeout: Some(Duration::from_secs(2)),
        max_bytes: 1024,
        ..RunOptions::default()
    };

    let result = run_command(
        Path::new("."),
        &helper(),
        &["--stdout-bytes".into(), "1048576".into()],
        opts,
    )
    .unwrap();

    assert!(result.status.success());
    assert!(!result.timed_out);
    assert!(result.output.truncated);
    assert_eq!(result.output.stdout.len(), 1024);
}

#[test]
fn nonzero_exit_is_not_an_error() {
    let result = run_command(
        Path::new("."),
        &helper(),
        &["--exit-code".into(), "3".into()],
        RunOptions::default(),
    )
    .unwrap();

    assert!(!result.success());
    assert_eq!(result.status.code(), Some(3));
}

#[test]
fn combined_joins_stdout_and_stderr() {
    let result = run_command(
        Path::new("."),
        &helper(),
        &[
            "--echo-line".into(),
            "out".into(),
            "--stderr-bytes".into(),
            "4".into(),
        ],
        RunOptions::default(),
    )
    .unwrap();

    assert_eq!(result.output.combined(), "out\nbbbb");
}

#[test]
fn timeout_kills_child() {
    let opts = RunOptions {
        timeout: Some(Duration::from_millis(50)),
        max_bytes: 1024,
        ..RunOptions::default()
    };

    let result = run_command(
        Path::new("."),
        &helper(),
        &["--sleep-ms".into(), "5000".into()],
        opts,
    )
    .unwrap();

    assert!(result.timed_out);
    assert!(!result.success());
}

#[test]
fn timeout_kills_process_tree() {
    let opts = RunOptions {
        timeout: Some(Duration::from_millis(50)),
        max_bytes: 1024,
        ..RunOptions::default()
    };

    let start = Instant::now();
    let result = run_command(
        Path::new("."),
        &helper(),
        &[
            "--spawn-child-sleep-ms".into(),
            "5000".into(),
            "--sleep-ms".into(),
            "5000".into(),
        ],
        opts,
    )
    .unwrap();

    assert!(result.timed_out);
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "expected timeout kill to return promptly, took {:?}",
        start.elapsed()
    );
}

#[test]
fn default_runner_runs_real_commands() {
    let runner = DefaultCommandRunner::default();
    let result = runner
        .run(
            Path::new("."),
            &helper(),
            &["--echo-line".into(), "hello".into()],
        )
        .unwrap();

    assert!(result.success());
    assert_eq!(result.output.stdout, "hello\n");
}
