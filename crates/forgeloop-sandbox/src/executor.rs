use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::report::{ExecutionFault, ExecutionReport};

/// Default wall-clock budget for one execution
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// How long to wait for pipe readers after the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);
/// Environment variables passed through to the sandboxed process
const PASSTHROUGH_ENV: &[&str] = &["PATH", "LANG", "LC_ALL", "SYSTEMROOT"];

/// OS-level limits applied to the sandboxed process (unix only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// CPU seconds (None = timeout rounded up, plus one)
    pub cpu_secs: Option<u64>,
    /// Address space in bytes
    pub memory_bytes: Option<u64>,
    /// Largest file the process may write, in bytes
    pub file_size_bytes: Option<u64>,
    /// Run in fresh user and network namespaces (Linux only)
    pub isolate_network: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_secs: None,
            memory_bytes: Some(512 * 1024 * 1024),
            file_size_bytes: Some(16 * 1024 * 1024),
            isolate_network: true,
        }
    }
}

/// Configuration for the sandboxed executor
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter binary
    pub interpreter: PathBuf,
    /// Arguments making the interpreter read the program from stdin
    pub interpreter_args: Vec<String>,
    /// Wall-clock timeout
    pub timeout: Duration,
    /// Bytes kept per stream; the rest is drained and discarded
    pub output_limit_bytes: usize,
    pub limits: ResourceLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            // -I: isolated mode (no user site, no PYTHON* env), -: program on stdin
            interpreter_args: vec!["-I".to_string(), "-".to_string()],
            timeout: DEFAULT_TIMEOUT,
            output_limit_bytes: 64 * 1024,
            limits: ResourceLimits::default(),
        }
    }
}

impl SandboxConfig {
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    pub fn with_memory_limit(mut self, bytes: Option<u64>) -> Self {
        self.limits.memory_bytes = bytes;
        self
    }

    pub fn with_network_isolation(mut self, isolate: bool) -> Self {
        self.limits.isolate_network = isolate;
        self
    }
}

type StreamTask = JoinHandle<std::io::Result<(Vec<u8>, usize)>>;

/// Runs untrusted code in a fresh interpreter process.
///
/// One process per call, own process group, cleared environment, private
/// temporary working directory. Nothing is retained between calls.
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Execute `code` and report the outcome. Never returns an error: launch
    /// faults and timeouts are folded into an `ERROR` report.
    pub async fn run(&self, code: &str) -> ExecutionReport {
        let start = Instant::now();
        let report = self.run_inner(code, start).await.unwrap_or_else(|fault| {
            warn!(fault = %fault, "Sandboxed launch failed");
            ExecutionReport::faulted(fault, String::new(), String::new(), start.elapsed())
        });

        debug!(
            status = %report.status,
            exit_code = ?report.exit_code,
            duration_ms = report.duration.as_millis() as u64,
            "Sandboxed execution finished"
        );
        report
    }

    async fn run_inner(
        &self,
        code: &str,
        start: Instant,
    ) -> Result<ExecutionReport, ExecutionFault> {
        let workdir = tempfile::Builder::new()
            .prefix("forgeloop-sandbox-")
            .tempdir()
            .map_err(|e| {
                ExecutionFault::LaunchFailed(format!("could not create working directory: {}", e))
            })?;

        let mut cmd = Command::new(&self.config.interpreter);
        cmd.args(&self.config.interpreter_args)
            .current_dir(workdir.path())
            .env_clear()
            .env("HOME", workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in PASSTHROUGH_ENV {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }

        #[cfg(unix)]
        {
            cmd.process_group(0);
            crate::limits::install(&mut cmd, &self.config.limits, self.config.timeout);
        }

        debug!(
            interpreter = %self.config.interpreter.display(),
            code_len = code.len(),
            timeout_secs = self.config.timeout.as_secs_f64(),
            "Spawning sandboxed process"
        );

        let mut child = cmd.spawn().map_err(|e| {
            ExecutionFault::LaunchFailed(format!(
                "{}: {}",
                self.config.interpreter.display(),
                e
            ))
        })?;
        let pid = child.id();

        let (mut stdin, stdout, stderr) =
            match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
                (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
                _ => {
                    let _ = child.kill().await;
                    return Err(ExecutionFault::LaunchFailed(
                        "standard streams were not piped".to_string(),
                    ));
                }
            };

        // The program travels over stdin; closing it signals end of source.
        let payload = code.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&payload).await;
            drop(stdin);
            result
        });

        let limit = self.config.output_limit_bytes;
        let stdout_task: StreamTask = tokio::spawn(read_limited(stdout, limit));
        let stderr_task: StreamTask = tokio::spawn(read_limited(stderr, limit));

        let waited = tokio::time::timeout(self.config.timeout, wait_unreaped(&mut child)).await;

        // Kill anything the program left behind in its group. The group id is
        // only safe to signal while the leader is still unreaped.
        if waited.is_err() || cfg!(target_os = "linux") {
            kill_group(pid);
        }

        let exit = match waited {
            Ok(()) => child.wait().await.map_err(|e| {
                ExecutionFault::LaunchFailed(format!("failed waiting for process: {}", e))
            }),
            Err(_) => {
                warn!(
                    timeout_secs = self.config.timeout.as_secs_f64(),
                    "Sandboxed process timed out, killing"
                );
                let _ = child.kill().await;
                Err(ExecutionFault::TimedOut(self.config.timeout))
            }
        };

        match writer.await {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                debug!(error = %e, "Failed writing program to stdin");
            }
            _ => {}
        }

        let stdout = collect_stream(stdout_task, "stdout").await;
        let stderr = collect_stream(stderr_task, "stderr").await;
        let duration = start.elapsed();

        Ok(match exit {
            Ok(status) => ExecutionReport::completed(status.code(), stdout, stderr, duration),
            Err(fault) => ExecutionReport::faulted(fault, stdout, stderr, duration),
        })
    }
}

/// Read a stream to the end, keeping at most `limit` bytes.
async fn read_limited<R>(mut reader: R, limit: usize) -> std::io::Result<(Vec<u8>, usize)>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        let take = room.min(n);
        kept.extend_from_slice(&buf[..take]);
        dropped += n - take;
    }
    Ok((kept, dropped))
}

async fn collect_stream(task: StreamTask, label: &str) -> String {
    let (bytes, dropped) = match tokio::time::timeout(READER_GRACE, task).await {
        Ok(Ok(Ok(output))) => output,
        Ok(Ok(Err(e))) => {
            debug!(stream = label, error = %e, "Failed reading stream");
            (Vec::new(), 0)
        }
        Ok(Err(e)) => {
            debug!(stream = label, error = %e, "Stream reader task failed");
            (Vec::new(), 0)
        }
        Err(_) => {
            warn!(stream = label, "Stream still open after process exit, giving up");
            (Vec::new(), 0)
        }
    };

    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if dropped > 0 {
        text.push_str(&format!("\n[{} truncated {} bytes]", label, dropped));
    }
    text
}

/// Wait for the leader to exit while leaving it as a zombie, so its pid
/// keeps naming the process group.
#[cfg(target_os = "linux")]
async fn wait_unreaped(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::wait::{waitid, Id, WaitPidFlag};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let pid = Pid::from_raw(pid as i32);
    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT;
    let waiter = tokio::task::spawn_blocking(move || loop {
        // ECHILD means it was reaped elsewhere; nothing left to wait for.
        if !matches!(waitid(Id::Pid(pid), flags), Err(Errno::EINTR)) {
            break;
        }
    });
    let _ = waiter.await;
}

#[cfg(not(target_os = "linux"))]
async fn wait_unreaped(child: &mut Child) {
    let _ = child.wait().await;
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        // ESRCH just means the group is already gone.
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
