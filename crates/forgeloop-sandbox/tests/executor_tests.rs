use std::time::{Duration, Instant};

use forgeloop_sandbox::{ExecStatus, ExecutionFault, SandboxConfig, SandboxExecutor};

/// Executor with namespace isolation off: CI containers often forbid
/// unprivileged user namespaces.
fn executor() -> SandboxExecutor {
    SandboxExecutor::new(SandboxConfig::default().with_network_isolation(false))
}

#[tokio::test]
async fn test_print_ok_works() {
    let report = executor().run(r#"print("ok")"#).await;

    assert_eq!(report.status, ExecStatus::Works);
    assert_eq!(report.exit_code, Some(0));
    assert!(report.result.contains("ok"));
    assert!(report.fault.is_none());
}

#[tokio::test]
async fn test_unhandled_exception_is_error_with_description() {
    let report = executor().run("x = 1 / 0").await;

    assert_eq!(report.status, ExecStatus::Error);
    assert_eq!(report.exit_code, Some(1));
    assert!(report.result.contains("ZeroDivisionError"));
}

#[tokio::test]
async fn test_syntax_error_is_error() {
    let report = executor().run("def broken(:\n    pass").await;

    assert_eq!(report.status, ExecStatus::Error);
    assert!(report.result.contains("SyntaxError"));
}

#[tokio::test]
async fn test_explicit_exit_code_is_reported() {
    let report = executor().run("import sys\nsys.exit(3)").await;

    assert_eq!(report.status, ExecStatus::Error);
    assert_eq!(report.exit_code, Some(3));
    assert!(report.result.starts_with("Exit code: 3"));
}

#[tokio::test]
async fn test_streams_are_captured_separately_and_labelled() {
    let code = "import sys\nprint('to out')\nprint('to err', file=sys.stderr)";
    let report = executor().run(code).await;

    assert_eq!(report.stdout.trim(), "to out");
    assert_eq!(report.stderr.trim(), "to err");
    let out_at = report.result.find("--- stdout ---\nto out").unwrap();
    let err_at = report.result.find("--- stderr ---\nto err").unwrap();
    assert!(out_at < err_at);
}

#[tokio::test]
async fn test_unbounded_loop_times_out() {
    let executor = SandboxExecutor::new(
        SandboxConfig::default()
            .with_network_isolation(false)
            .with_timeout(Duration::from_secs(1)),
    );

    let start = Instant::now();
    let report = executor.run("while True:\n    pass").await;
    let elapsed = start.elapsed();

    assert_eq!(report.status, ExecStatus::Error);
    assert_eq!(
        report.fault,
        Some(ExecutionFault::TimedOut(Duration::from_secs(1)))
    );
    assert!(report.result.contains("timed out"));
    assert!(elapsed < Duration::from_secs(6), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_timeout_kills_background_children() {
    let executor = SandboxExecutor::new(
        SandboxConfig::default()
            .with_network_isolation(false)
            .with_timeout(Duration::from_secs(1)),
    );
    let code = "import subprocess, time\nsubprocess.Popen(['sleep', '30'])\ntime.sleep(30)";

    let start = Instant::now();
    let report = executor.run(code).await;

    assert_eq!(report.status, ExecStatus::Error);
    assert!(start.elapsed() < Duration::from_secs(6));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_normal_exit_kills_leftover_children() {
    let code = "import subprocess\n\
p = subprocess.Popen(['sleep', '30'], stdout=subprocess.DEVNULL, stderr=subprocess.DEVNULL)\n\
print(p.pid)";

    let report = executor().run(code).await;
    assert_eq!(report.status, ExecStatus::Works);
    let pid: u32 = report.stdout.trim().parse().unwrap();

    // Gone, or a zombie waiting on its new parent
    let alive = || match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat.rsplit(')').next().unwrap_or("").trim_start().starts_with('Z'),
        Err(_) => false,
    };
    let deadline = Instant::now() + Duration::from_secs(2);
    while alive() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!alive(), "background child {} survived the run", pid);
}

#[tokio::test]
async fn test_missing_interpreter_is_launch_fault() {
    let executor = SandboxExecutor::new(
        SandboxConfig::default()
            .with_network_isolation(false)
            .with_interpreter("/nonexistent/forgeloop-python"),
    );

    let report = executor.run("print('never')").await;

    assert_eq!(report.status, ExecStatus::Error);
    assert!(matches!(report.fault, Some(ExecutionFault::LaunchFailed(_))));
    assert!(report.result.starts_with("Failed to launch sandboxed process"));
}

#[tokio::test]
async fn test_output_is_bounded() {
    let executor = SandboxExecutor::new(
        SandboxConfig::default()
            .with_network_isolation(false)
            .with_output_limit(100),
    );

    let report = executor.run("print('x' * 5000)").await;

    assert_eq!(report.status, ExecStatus::Works);
    assert!(report.stdout.starts_with(&"x".repeat(100)));
    assert!(report.stdout.contains("[stdout truncated"));
}

#[tokio::test]
async fn test_runs_in_private_directory_that_is_removed() {
    let report = executor().run("import os\nprint(os.getcwd())").await;

    assert_eq!(report.status, ExecStatus::Works);
    let cwd = std::path::PathBuf::from(report.stdout.trim());
    assert!(cwd
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("forgeloop-sandbox-"));
    assert!(!cwd.exists());
}

#[tokio::test]
async fn test_code_is_not_written_to_a_file() {
    let report = executor()
        .run("import sys\nprint(sys.argv[0] == '-' or sys.argv[0] == '')")
        .await;

    assert_eq!(report.stdout.trim(), "True");
}

#[cfg(unix)]
#[tokio::test]
async fn test_memory_limit_is_enforced() {
    let executor = SandboxExecutor::new(
        SandboxConfig::default()
            .with_network_isolation(false)
            .with_memory_limit(Some(512 * 1024 * 1024)),
    );

    let report = executor.run("blob = bytearray(2 * 1024 * 1024 * 1024)").await;

    assert_eq!(report.status, ExecStatus::Error);
    assert!(report.result.contains("MemoryError"));
}

#[tokio::test]
async fn test_calls_do_not_share_state() {
    let executor = executor();
    let first = executor
        .run("open('marker.txt', 'w').write('x')\nprint('wrote')")
        .await;
    let second = executor
        .run("import os\nprint(os.path.exists('marker.txt'))")
        .await;

    assert_eq!(first.status, ExecStatus::Works);
    assert_eq!(second.stdout.trim(), "False");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_default_executor_has_no_network() {
    let code = r#"
import socket
print("interfaces:", sorted(name for _, name in socket.if_nameindex()))
try:
    socket.create_connection(("1.1.1.1", 53), timeout=2).close()
    print("CONNECTED")
except OSError as e:
    print("BLOCKED", e)
"#;

    let report = SandboxExecutor::default().run(code).await;

    if let Some(ExecutionFault::LaunchFailed(reason)) = &report.fault {
        // Isolation was refused, and the run must not have happened without it
        assert_eq!(report.status, ExecStatus::Error);
        assert!(report.stdout.is_empty());
        eprintln!("skipping: user namespaces unavailable ({})", reason);
        return;
    }

    assert_eq!(report.status, ExecStatus::Works, "{}", report.result);
    assert!(report.stdout.contains("interfaces: ['lo']"), "{}", report.stdout);
    assert!(report.stdout.contains("BLOCKED"), "{}", report.stdout);
}
