//! Bounded external tool execution.
//!
//! Every tool is launched from an explicit argument vector, never through a
//! shell, so tags and paths cannot inject commands. Output is captured and
//! the child, with every process it started, is killed when its time budget
//! expires.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How a tool invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Process exited with a status code.
    Exited(i32),
    /// Process was terminated by a signal.
    Signaled,
    /// Time budget expired; the process group was killed.
    TimedOut,
    /// Process could not be started at all.
    LaunchFailed(String),
}

impl Termination {
    /// Whether the tool actually ran to completion (any exit code).
    pub fn ran(&self) -> bool {
        matches!(self, Termination::Exited(_))
    }
}

/// A fully specified tool invocation.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Tool name used in logs.
    pub name: String,
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// Zero means unbounded.
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, program: impl AsRef<OsStr>) -> Self {
        Self {
            name: name.into(),
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            cwd: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Printable command line, for logs only.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of one invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub tool: String,
    pub command_line: String,
    pub termination: Termination,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcessOutcome {
    /// Exited with status 0.
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(code) => Some(code),
            _ => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    /// One-line description of how the process ended.
    pub fn describe(&self) -> String {
        match &self.termination {
            Termination::Exited(code) => format!("{} exited with code {}", self.tool, code),
            Termination::Signaled => format!("{} was terminated by a signal", self.tool),
            Termination::TimedOut => {
                format!("{} timed out after {} ms", self.tool, self.duration_ms)
            }
            Termination::LaunchFailed(e) => format!("{} could not be launched: {}", self.tool, e),
        }
    }

    /// Log file contents: command, termination, then both streams.
    pub fn render_log(&self) -> String {
        let mut log = format!("$ {}\n# {}\n", self.command_line, self.describe());
        if !self.stdout.is_empty() {
            log.push_str("\n--- stdout ---\n");
            log.push_str(&self.stdout);
        }
        if !self.stderr.is_empty() {
            log.push_str("\n--- stderr ---\n");
            log.push_str(&self.stderr);
        }
        log
    }

    /// Persist the captured output to `path`.
    pub fn write_log(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render_log())
    }
}

/// How long to keep draining pipes once the process itself is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Output collected from one pipe, readable while the reader is still running.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn spawn_reader<R>(&self, reader: Option<R>) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = self.0.clone();
        tokio::spawn(async move {
            let Some(mut reader) = reader else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .extend_from_slice(&chunk[..n]),
                }
            }
        })
    }

    fn text(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Kill the child and everything it started.
///
/// On unix the child leads its own process group, so wrapper scripts take
/// their JVMs down with them.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: killpg only sends a signal to the group led by our child.
            unsafe {
                libc::killpg(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill().await;
}

/// Execute a tool, capturing output and enforcing its timeout.
///
/// Never fails: spawn errors, signals and timeouts are all reported through
/// [`Termination`]. Output written before a timeout is kept.
pub async fn execute(invocation: &ToolInvocation) -> ProcessOutcome {
    let start = Instant::now();
    let command_line = invocation.command_line();
    debug!(tool = %invocation.name, command = %command_line, "Launching tool");

    let outcome = |termination, stdout: String, stderr: String| ProcessOutcome {
        tool: invocation.name.clone(),
        command_line: command_line.clone(),
        termination,
        stdout,
        stderr,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return outcome(Termination::LaunchFailed(e.to_string()), String::new(), String::new()),
    };

    let stdout = Capture::default();
    let stderr = Capture::default();
    let mut readers = [
        stdout.spawn_reader(child.stdout.take()),
        stderr.spawn_reader(child.stderr.take()),
    ];

    let status = if invocation.timeout > Duration::ZERO {
        match tokio::time::timeout(invocation.timeout, child.wait()).await {
            Ok(status) => Some(status),
            Err(_) => {
                warn!(tool = %invocation.name, timeout = ?invocation.timeout, "Tool timed out, killing process group");
                terminate(&mut child).await;
                None
            }
        }
    } else {
        Some(child.wait().await)
    };

    // A detached grandchild may hold the pipes open; stop reading after the grace period.
    let _ = tokio::time::timeout(DRAIN_GRACE, async {
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
    })
    .await;
    for reader in &readers {
        reader.abort();
    }

    let termination = match status {
        None => Termination::TimedOut,
        Some(Ok(status)) => match status.code() {
            Some(code) => Termination::Exited(code),
            None => Termination::Signaled,
        },
        Some(Err(e)) => Termination::LaunchFailed(e.to_string()),
    };
    outcome(termination, stdout.text(), stderr.text())
}
