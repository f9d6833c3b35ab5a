// src/engine/instance.rs

use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::TaskSettings;
use crate::output::{Line, Stream, TaskOutput};

/// How a child process (or the attempt to wait on it) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitResult {
    /// Process exited on its own with the given status code.
    Exited(i32),
    /// Process was terminated by the given signal.
    Signaled(i32),
    /// The supervisor failed to wait on the process.
    Error(String),
}

impl ExitResult {
    pub fn from_status(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match status.code() {
            Some(code) => ExitResult::Exited(code),
            None => ExitResult::Signaled(status.signal().unwrap_or(0)),
        }
    }

    /// Whether the process ended of its own accord with status 0.
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitResult::Exited(0))
    }
}

impl fmt::Display for ExitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitResult::Exited(code) => write!(f, "exited with status {code}"),
            ExitResult::Signaled(sig) => write!(f, "killed by signal {sig}"),
            ExitResult::Error(err) => write!(f, "wait failed: {err}"),
        }
    }
}

/// One spawn attempt of a task's binary.
///
/// Everything here except `output` is immutable after construction. The
/// output buffer has its own lock and is written by the tailing workers
/// concurrently with admin-UI reads.
#[derive(Debug)]
pub struct TaskInstance {
    name: Arc<str>,
    settings: Arc<TaskSettings>,
    pid: u32,
    started_at: DateTime<Utc>,
    start: Instant,
    output: TaskOutput,
}

impl TaskInstance {
    pub(crate) fn new(name: Arc<str>, settings: Arc<TaskSettings>, pid: u32) -> Self {
        Self {
            name,
            settings,
            pid,
            started_at: Utc::now(),
            start: Instant::now(),
            output: TaskOutput::new(),
        }
    }

    /// Unique-enough ID for correlating log lines: task name, start time,
    /// process id.
    pub fn id(&self) -> String {
        format!(
            "{:?}/{}-pid{}",
            self.name,
            self.started_at.timestamp(),
            self.pid
        )
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    /// Snapshot of the captured output tail, oldest first.
    pub fn output_lines(&self) -> Vec<Line> {
        self.output.snapshot()
    }

    pub(crate) fn append_output(&self, stream: Stream, text: String, truncated: bool) {
        self.output.push(Line {
            at: Utc::now(),
            stream,
            text,
            truncated,
        });
    }

    /// Record a supervisor-side message about this instance: goes to both the
    /// instance's output buffer (as a `system` line) and the global log.
    pub(crate) fn system_line(&self, msg: &str) {
        let msg = format!("task {}: {}", self.id(), msg);
        info!("{msg}");
        self.append_output(Stream::System, msg, false);
    }

    /// Forcefully terminate the process. Asynchronous: the exit report
    /// arrives later through the control loop.
    pub(crate) fn kill(&self) {
        if self.pid == 0 {
            return;
        }
        unsafe {
            libc::kill(self.pid as libc::pid_t, libc::SIGKILL);
        }
    }
}
